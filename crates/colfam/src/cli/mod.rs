//! CLI module for colfam
//!
//! Every command reads model files from disk and prints to stdout. Nothing
//! here opens a connection to a cluster.

pub mod compile;
pub mod config;
pub mod ddl;
pub mod error;
pub mod plan;

use anyhow::{Context, Result};
use colfam_model::{TableDescriptor, TableSpec};
use std::path::Path;

use crate::cli::config::ColfamConfig;
use crate::cli::error::HelpfulError;

/// Read a TOML table file.
pub fn read_spec(path: &Path) -> Result<TableSpec> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&raw).map_err(|e| HelpfulError::invalid_model(path, &e.to_string()).into())
}

/// Read a model file and build its validated descriptor.
pub fn load_model(path: &Path, config: &ColfamConfig) -> Result<TableDescriptor> {
    let spec = read_spec(path)?;
    spec.into_descriptor(&config.default_keyspace)
        .map_err(|e| HelpfulError::invalid_declaration(path, &e.to_string()).into())
}
