//! Server version detection and the behaviors that depend on it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid server version '{0}'")]
pub struct VersionParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl FromStr for ServerVersion {
    type Err = VersionParseError;

    /// Accepts `3`, `3.11`, `2.0.13` and suffixed forms like `4.0.1-SNAPSHOT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s.trim().split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.').map(|p| p.parse::<u32>());
        let mut next = |required: bool| -> Result<u32, VersionParseError> {
            match parts.next() {
                Some(Ok(n)) => Ok(n),
                None if !required => Ok(0),
                _ => Err(VersionParseError(s.to_string())),
            }
        };
        let version = ServerVersion::new(next(true)?, next(false)?, next(false)?);
        Ok(version)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// First release that applies a multi-element prepend in call order.
pub const PREPEND_ORDER_FIXED: ServerVersion = ServerVersion::new(2, 0, 13);

/// Server behaviors the compiler has to account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The server reverses the elements of a multi-element prepend
    pub prepend_reversed: bool,
}

impl Capabilities {
    pub const CURRENT: Capabilities = Capabilities {
        prepend_reversed: false,
    };

    pub fn from_server_version(version: ServerVersion) -> Self {
        Self {
            prepend_reversed: version < PREPEND_ORDER_FIXED,
        }
    }

    pub fn is_prepend_reversed(&self) -> bool {
        self.prepend_reversed
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::CURRENT
    }
}
