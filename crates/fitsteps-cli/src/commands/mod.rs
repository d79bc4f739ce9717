pub mod config;
pub mod history;
pub mod ingest;
pub mod predict;
pub mod status;

use fitsteps_core::{Config, Database};

/// Load the configuration and open the step database it points at.
pub fn open_store() -> Result<(Config, Database), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let path = config.database_path()?;
    tracing::debug!(path = %path.display(), "opening database");
    let db = Database::open(&path)?;
    Ok((config, db))
}
