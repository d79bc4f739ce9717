//! Incremental ingestion of step buckets.
//!
//! One parameterized routine covers both the daily incremental run (from the
//! watermark to now) and explicit backfills. Requests are split into fixed
//! windows to stay under the API's per-request span limit.

mod routine;
mod window;


pub use routine::{format_millis, FailedWindow, IngestPlan, IngestReport, Ingestor, RangeEnd};
pub use window::{split_windows, TimeWindow};
