//! Scheduler configuration loading
//!
//! Configuration files are RON (`.ron`) or JSON (`.json`); any other
//! extension is read as RON. Missing fields take their defaults.
//!
//! # Usage
//!
//! ```no_run
//! use framecoro::util::config::load_config;
//!
//! let config = load_config("framecoro.ron").unwrap();
//! ```

use std::fs;
use std::path::Path;

use crate::runtime::scheduler::SchedulerConfig;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    RonError(#[from] ron::error::SpannedError),
    #[error("Config parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Load a scheduler configuration file.
///
/// Returns the default config if the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(SchedulerConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json(&content)
    } else {
        parse_ron(&content)
    }
}

/// Parse a RON configuration.
pub fn parse_ron(content: &str) -> Result<SchedulerConfig, ConfigError> {
    Ok(ron::from_str(content)?)
}

/// Parse a JSON configuration.
pub fn parse_json(content: &str) -> Result<SchedulerConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}
