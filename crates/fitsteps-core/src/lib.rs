//! # Fitsteps Core Library
//!
//! Collects daily step counts from the Google Fit aggregate API into a local
//! SQLite store and forecasts the next day's total. The `fitsteps` CLI is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Ingest**: one routine for incremental and backfill runs, driven by a
//!   persisted watermark and split into fixed request windows
//! - **Storage**: SQLite bucket table with idempotent inserts, plus TOML
//!   configuration
//! - **Integrations**: OAuth refresh-token exchange and the aggregate client
//! - **Forecast**: least-squares model on day index and a weekend flag
//!
//! ## Key Components
//!
//! - [`Ingestor`]: runs one ingestion cycle
//! - [`Database`]: step bucket persistence
//! - [`Config`]: application configuration management
//! - [`predict_next_day`]: next-day step estimate

pub mod error;
pub mod forecast;
pub mod ingest;
pub mod integrations;
pub mod storage;

pub use error::{CoreError, ConfigError, DatabaseError, FetchError, OAuthError, ValidationError};
pub use forecast::{forecast_next_day, predict_next_day, DailySteps, Forecast, StepModel};
pub use ingest::{IngestPlan, IngestReport, Ingestor, RangeEnd, TimeWindow};
pub use integrations::Credentials;
pub use storage::{Config, Database, StepBucket, Watermark};
