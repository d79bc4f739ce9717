//! TOML-based application configuration.
//!
//! Stores non-secret settings:
//! - Google endpoints and the aggregated data type
//! - Ingestion tunables (window size, bucket size, first-run lookback)
//! - Where the SQLite database lives
//!
//! Configuration is stored at `~/.config/fitsteps/config.toml`. OAuth client
//! credentials and the refresh token are read from the environment instead.

use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Base of the Fitness REST API; the aggregate path is appended.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_data_type_name")]
    pub data_type_name: String,
}

/// Ingestion tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Length of one request window.
    #[serde(default = "default_chunk_days")]
    pub chunk_days: u32,
    /// Bucket width requested from the API.
    #[serde(default = "default_bucket_millis")]
    pub bucket_millis: i64,
    /// How far back the first run starts when no watermark exists.
    #[serde(default = "default_initial_lookback_days")]
    pub initial_lookback_days: u32,
    /// Stop the watermark at the first failed window instead of the range end.
    #[serde(default)]
    pub hold_watermark_on_failure: bool,
    /// Offset used for calendar dates (backfill bounds, daily grouping).
    #[serde(default)]
    pub utc_offset_hours: i32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/fitsteps/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Overrides the default database location. `FITSTEPS_DB` wins over this.
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".into()
}
fn default_api_base_url() -> String {
    "https://www.googleapis.com/fitness/v1".into()
}
fn default_data_type_name() -> String {
    "com.google.step_count.delta".into()
}
fn default_chunk_days() -> u32 {
    30
}
fn default_bucket_millis() -> i64 {
    86_400_000
}
/// A century; anything longer predates any step data.
const MAX_LOOKBACK_DAYS: u32 = 36_500;

fn default_initial_lookback_days() -> u32 {
    365 * 5
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            data_type_name: default_data_type_name(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_days: default_chunk_days(),
            bucket_millis: default_bucket_millis(),
            initial_lookback_days: default_initial_lookback_days(),
            hold_watermark_on_failure: false,
            utc_offset_hours: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google: GoogleConfig::default(),
            ingest: IngestConfig::default(),
            database_path: None,
        }
    }
}

impl IngestConfig {
    pub fn chunk(&self) -> Duration {
        Duration::days(i64::from(self.chunk_days))
    }

    pub fn initial_lookback(&self) -> Duration {
        Duration::days(i64::from(self.initial_lookback_days))
    }

    /// Offset for calendar-date computations. Falls back to UTC if out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default path, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the ingestion routine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.chunk_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ingest.chunk_days".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.ingest.initial_lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::InvalidValue {
                key: "ingest.initial_lookback_days".into(),
                message: format!("must be at most {MAX_LOOKBACK_DAYS}"),
            });
        }
        if self.ingest.bucket_millis <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "ingest.bucket_millis".into(),
                message: "must be positive".into(),
            });
        }
        if !(-12..=14).contains(&self.ingest.utc_offset_hours) {
            return Err(ConfigError::InvalidValue {
                key: "ingest.utc_offset_hours".into(),
                message: "must be between -12 and 14".into(),
            });
        }
        Ok(())
    }

    /// Resolve the database file: `FITSTEPS_DB`, then `database_path`, then the data dir.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("FITSTEPS_DB") {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        if let Some(path) = &self.database_path {
            return Ok(PathBuf::from(path));
        }
        Ok(data_dir()?.join("fitsteps.db"))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }
}
