//! Configuration loading
//!
//! A policy file holds exactly one [`PolicyConfig`] as JSON. Both entry
//! points parse and validate; neither builds an engine.

use std::io;
use std::path::Path;

use tracing::{debug, info};

use super::types::PolicyConfig;
use crate::error::ConfigError;

/// Load configuration from a JSON file
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if nothing exists at `path`,
/// `ConfigError::IoError` for any other read failure, and parse or
/// validation errors otherwise.
pub fn load_config(path: impl AsRef<Path>) -> Result<PolicyConfig, ConfigError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading policy configuration");

    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::IoError(e),
    })?;

    let config = parse(&contents)
        .map_err(|e| ConfigError::ParseError(format!("{e} in {}", path.display())))?;
    config.validate()?;

    info!(
        path = %path.display(),
        matchers = config.matchers.len(),
        sources = config.source_count(),
        reload_secs = config.reload_secs,
        reverse = config.reverse,
        "Policy configuration loaded"
    );
    Ok(config)
}

/// Load configuration from a JSON string
///
/// # Errors
///
/// Returns `ConfigError` if parsing or validation fails.
pub fn load_config_str(json: &str) -> Result<PolicyConfig, ConfigError> {
    let config = parse(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn parse(json: &str) -> serde_json::Result<PolicyConfig> {
    serde_json::from_str(json)
}
