//! The ingestion cycle: watermark, windows, fetch, upsert, watermark.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::window::{split_windows, TimeWindow};
use crate::error::{Result, ValidationError};
use crate::integrations::oauth::{self, Credentials};
use crate::integrations::FitClient;
use crate::storage::{Config, Database, InsertOutcome, Watermark};

/// Where a range ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    /// The moment the run starts.
    Now,
    /// Start of the current local day, excluding today's partial data.
    TodayMidnight,
    /// Start of the given local day.
    Date(NaiveDate),
}

/// Which span one ingestion cycle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPlan {
    /// From the stored watermark (initialized on first run) to now.
    Incremental,
    /// From the start of `from` (local midnight) to `until`.
    Backfill { from: NaiveDate, until: RangeEnd },
}

/// One window that could not be fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedWindow {
    pub window: TimeWindow,
    pub error: String,
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub range: Option<TimeWindow>,
    pub windows: usize,
    pub windows_fetched: usize,
    pub failed: Vec<FailedWindow>,
    pub buckets_received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub empty_buckets: usize,
    pub previous_watermark: Option<i64>,
    pub watermark: Option<i64>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn local_midnight_ms(date: NaiveDate, offset: FixedOffset) -> Result<i64> {
    offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "date".into(),
                message: format!("{date} has no midnight at {offset}"),
            }
            .into()
        })
}

impl RangeEnd {
    fn resolve(self, now: DateTime<Utc>, offset: FixedOffset) -> Result<i64> {
        match self {
            RangeEnd::Now => Ok(now.timestamp_millis()),
            RangeEnd::TodayMidnight => {
                local_midnight_ms(now.with_timezone(&offset).date_naive(), offset)
            }
            RangeEnd::Date(date) => local_midnight_ms(date, offset),
        }
    }
}

/// Render epoch millis as RFC 3339, falling back to the raw number.
pub fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

/// Runs ingestion cycles against one database with one configuration.
pub struct Ingestor<'a> {
    db: &'a Database,
    config: &'a Config,
    http: Client,
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a Database, config: &'a Config) -> Self {
        Self {
            db,
            config,
            http: Client::new(),
        }
    }

    /// Compute `[start, end)` for `plan`, initializing the watermark if needed.
    ///
    /// Returns the range and the watermark as it was before this cycle.
    pub fn resolve_range(
        &self,
        plan: IngestPlan,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64, Option<i64>)> {
        let offset = self.config.ingest.utc_offset();
        let watermark = Watermark::new(self.db);
        let previous = watermark.get()?;

        match plan {
            IngestPlan::Incremental => {
                let start = watermark.load_or_init(now, self.config.ingest.initial_lookback())?;
                Ok((start, now.timestamp_millis(), previous))
            }
            IngestPlan::Backfill { from, until } => {
                let start = local_midnight_ms(from, offset)?;
                let end = until.resolve(now, offset)?;
                if end < start {
                    return Err(ValidationError::InvalidTimeRange { start, end }.into());
                }
                Ok((start, end, previous))
            }
        }
    }

    /// Run one cycle ending at the current time.
    ///
    /// # Errors
    /// Token refresh and database failures abort the cycle. Window fetch
    /// failures do not; they are logged and listed in the report.
    pub async fn run(&self, plan: IngestPlan, credentials: &Credentials) -> Result<IngestReport> {
        self.run_at(plan, credentials, Utc::now()).await
    }

    pub async fn run_at(
        &self,
        plan: IngestPlan,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<IngestReport> {
        let token =
            oauth::refresh_access_token(&self.http, &self.config.google.token_url, credentials)
                .await?;

        let (start, end, previous) = self.resolve_range(plan, now)?;
        tracing::info!(from = %format_millis(start), to = %format_millis(end), "fetching step data");

        let fit = FitClient::new(
            self.http.clone(),
            &self.config.google,
            self.config.ingest.bucket_millis,
        )?;
        let chunk_ms = self.config.ingest.chunk().num_milliseconds();
        let windows = split_windows(start, end, chunk_ms)?;

        let mut report = IngestReport {
            range: Some(TimeWindow {
                start_ms: start,
                end_ms: end,
            }),
            windows: windows.len(),
            previous_watermark: previous,
            ..IngestReport::default()
        };

        for window in windows {
            tracing::info!(
                from = %format_millis(window.start_ms),
                to = %format_millis(window.end_ms),
                "fetching window"
            );
            let fetched = fit
                .aggregate(&token, window)
                .await
                .and_then(|response| {
                    let (rows, empty) = response.step_buckets()?;
                    Ok((response.bucket.len(), rows, empty))
                });
            let (received, rows, empty) = match fetched {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(
                        from = %format_millis(window.start_ms),
                        to = %format_millis(window.end_ms),
                        error = %e,
                        "window fetch failed, skipping"
                    );
                    report.failed.push(FailedWindow {
                        window,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            report.windows_fetched += 1;
            report.buckets_received += received;
            report.empty_buckets += empty;
            for row in &rows {
                match self.db.insert_bucket(row)? {
                    InsertOutcome::Inserted => report.inserted += 1,
                    InsertOutcome::Duplicate => report.duplicates += 1,
                }
            }
        }

        let target = match report.failed.first() {
            Some(first) if self.config.ingest.hold_watermark_on_failure => first.window.start_ms,
            _ => end,
        };
        let new_watermark = Watermark::new(self.db).advance(target)?;
        report.watermark = Some(new_watermark);

        if report.is_complete() {
            tracing::info!(
                inserted = report.inserted,
                duplicates = report.duplicates,
                watermark = %format_millis(new_watermark),
                "step data updated"
            );
        } else {
            tracing::warn!(
                failed = report.failed.len(),
                inserted = report.inserted,
                watermark = %format_millis(new_watermark),
                "step data updated with missing windows"
            );
        }
        Ok(report)
    }
}
