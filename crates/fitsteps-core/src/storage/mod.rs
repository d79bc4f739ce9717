mod config;
pub mod database;
pub mod migrations;
pub mod watermark;

pub use config::{Config, GoogleConfig, IngestConfig};
pub use database::{Database, InsertOutcome, StepBucket, StepSummary};
pub use watermark::{Watermark, LAST_FETCH_KEY};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/fitsteps[-dev]/` based on FITSTEPS_ENV.
///
/// Set FITSTEPS_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FITSTEPS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("fitsteps-dev")
    } else {
        base_dir.join("fitsteps")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
