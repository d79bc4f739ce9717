//! Ingestion watermark stored in the `meta` table.
//!
//! The watermark is the epoch-millis timestamp up to which data has been
//! fetched. It only ever moves forward.

use chrono::{DateTime, Duration, Utc};

use super::Database;
use crate::error::{DatabaseError, Result, ValidationError};

/// Key of the watermark row in the `meta` table.
pub const LAST_FETCH_KEY: &str = "last_fetch";

/// Handle over the persisted `last_fetch` value.
pub struct Watermark<'a> {
    db: &'a Database,
}

impl<'a> Watermark<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Read the stored watermark, if any.
    ///
    /// # Errors
    /// Returns `CorruptValue` if the stored text is not an integer.
    pub fn get(&self) -> Result<Option<i64>, DatabaseError> {
        match self.db.kv_get(LAST_FETCH_KEY)? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| DatabaseError::CorruptValue {
                    key: LAST_FETCH_KEY.to_string(),
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    /// Return the stored watermark, creating it at `now - lookback` on first run.
    ///
    /// # Errors
    /// Returns a validation error if `now - lookback` is not a representable time.
    pub fn load_or_init(&self, now: DateTime<Utc>, lookback: Duration) -> Result<i64> {
        if let Some(value) = self.get()? {
            return Ok(value);
        }
        let initial = now
            .checked_sub_signed(lookback)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "initial_lookback".into(),
                message: format!("{} days before {now} is out of range", lookback.num_days()),
            })?
            .timestamp_millis();
        self.db.kv_set(LAST_FETCH_KEY, &initial.to_string())?;
        tracing::info!(watermark = initial, "watermark initialized");
        Ok(initial)
    }

    /// Move the watermark forward to `value`.
    ///
    /// A value older than the stored one is ignored. Returns the watermark
    /// in effect after the call.
    pub fn advance(&self, value: i64) -> Result<i64, DatabaseError> {
        match self.get()? {
            Some(current) if current >= value => {
                if current > value {
                    tracing::debug!(current, requested = value, "watermark not moved backwards");
                }
                Ok(current)
            }
            _ => {
                self.db.kv_set(LAST_FETCH_KEY, &value.to_string())?;
                Ok(value)
            }
        }
    }
}
