//! User configuration: `$COLFAM_HOME/config.toml`.

use anyhow::{Context, Result};
use colfam_logging::colfam_home;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_KEYSPACE: &str = "colfam";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColfamConfig {
    /// Keyspace for model files that name none
    pub default_keyspace: String,

    /// Server release to compile for, e.g. "2.0.12"
    pub server_version: Option<String>,
}

impl Default for ColfamConfig {
    fn default() -> Self {
        Self {
            default_keyspace: DEFAULT_KEYSPACE.to_string(),
            server_version: None,
        }
    }
}

impl ColfamConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

pub fn default_config_path() -> PathBuf {
    colfam_home().join("config.toml")
}

pub struct ConfigArgs {
    pub json: bool,
}

pub fn run(args: ConfigArgs, path: &Path, config: &ColfamConfig) -> Result<()> {
    if args.json {
        let out = serde_json::json!({
            "home": colfam_home().to_string_lossy(),
            "config_file": {
                "path": path.to_string_lossy(),
                "exists": path.exists(),
            },
            "default_keyspace": config.default_keyspace,
            "server_version": config.server_version,
            "logs": colfam_logging::logs_dir().to_string_lossy(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("home:             {}", colfam_home().display());
    println!(
        "config file:      {}{}",
        path.display(),
        if path.exists() { "" } else { " (not found, using defaults)" }
    );
    println!("default keyspace: {}", config.default_keyspace);
    println!(
        "server version:   {}",
        config.server_version.as_deref().unwrap_or("(latest)")
    );
    println!("logs:             {}", colfam_logging::logs_dir().display());
    Ok(())
}
