//! Logging setup for colfam binaries.
//!
//! Library crates only emit `tracing` events. Binaries call [`init_logging`]
//! once at startup to route them to stderr and, optionally, to a size-rotated
//! log file under `~/.colfam/logs`.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "colfam=info,colfam_db=info,colfam_schema=info,colfam_mutation=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
    /// Also write to `logs_dir()/<app_name>.log`
    pub log_to_file: bool,
    pub rotation: RotationPolicy,
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        filter()
    } else {
        EnvFilter::new("warn")
    };
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file = if config.log_to_file {
        let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
        let writer = LogFileWriter::open(&log_dir, config.app_name, config.rotation)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter()),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    tracing::debug!(app = config.app_name, file = config.log_to_file, "logging initialized");
    Ok(())
}

/// Colfam home directory: `$COLFAM_HOME`, else `~/.colfam`.
///
/// Falls back to the working directory when no home directory is known.
pub fn colfam_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("COLFAM_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".colfam")
}

pub fn logs_dir() -> PathBuf {
    colfam_home().join("logs")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Size-based retention for the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Files kept on disk, including the live one
    pub keep: usize,
    pub max_bytes: u64,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            keep: MAX_LOG_FILES,
            max_bytes: MAX_LOG_FILE_SIZE,
        }
    }
}

/// `<stem>.log` plus its numbered generations `<stem>.log.1` (newest) and up.
struct RotatingLog {
    dir: PathBuf,
    stem: String,
    policy: RotationPolicy,
    handle: Option<File>,
    written: u64,
}

impl RotatingLog {
    fn open(dir: &Path, app_name: &str, policy: RotationPolicy) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            stem: file_stem(app_name),
            policy: RotationPolicy {
                keep: policy.keep.max(1),
                ..policy
            },
            handle: None,
            written: 0,
        };
        log.attach()?;
        if log.written > log.policy.max_bytes {
            log.roll()?;
        }
        Ok(log)
    }

    fn generation(&self, n: usize) -> PathBuf {
        match n {
            0 => self.dir.join(format!("{}.log", self.stem)),
            n => self.dir.join(format!("{}.log.{}", self.stem, n)),
        }
    }

    /// Open the live file for appending and pick up its size.
    fn attach(&mut self) -> io::Result<()> {
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.generation(0))?;
        self.written = handle.metadata()?.len();
        self.handle = Some(handle);
        Ok(())
    }

    fn roll(&mut self) -> io::Result<()> {
        if let Some(mut handle) = self.handle.take() {
            let _ = handle.flush();
        }

        let last = self.policy.keep - 1;
        let expired = self.generation(last);
        if expired.exists() {
            fs::remove_file(&expired)?;
        }
        for n in (0..last).rev() {
            let from = self.generation(n);
            if from.exists() {
                fs::rename(&from, self.generation(n + 1))?;
            }
        }
        self.attach()
    }

    fn would_overflow(&self, len: usize) -> bool {
        self.written > 0 && self.written + len as u64 > self.policy.max_bytes
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.would_overflow(buf.len()) {
            self.roll()?;
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "log file is not open"));
        };
        let n = handle.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.as_mut().map_or(Ok(()), |handle| handle.flush())
    }
}

/// `MakeWriter` over one [`RotatingLog`] shared by every event.
#[derive(Clone)]
struct LogFileWriter(Arc<Mutex<RotatingLog>>);

impl LogFileWriter {
    fn open(dir: &Path, app_name: &str, policy: RotationPolicy) -> Result<Self> {
        let log = RotatingLog::open(dir, app_name, policy)
            .with_context(|| format!("Failed to open {}/{}.log", dir.display(), file_stem(app_name)))?;
        Ok(Self(Arc::new(Mutex::new(log))))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A panic mid-write leaves the file usable.
        let mut log = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut log = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.flush()
    }
}

fn file_stem(app_name: &str) -> String {
    let stem: String = app_name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if stem.is_empty() {
        "colfam".to_string()
    } else {
        stem
    }
}
