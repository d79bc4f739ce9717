//! Google Fit aggregation API.
//!
//! Requests step totals for one time window, bucketed by a fixed duration,
//! and turns the nested `bucket/dataset/point/value` response into
//! [`StepBucket`]s.

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::error::FetchError;
use crate::ingest::TimeWindow;
use crate::storage::{GoogleConfig, StepBucket};

/// Thin client over `POST {base}/users/me/dataset:aggregate`.
pub struct FitClient {
    http: Client,
    endpoint: url::Url,
    data_type_name: String,
    bucket_millis: i64,
}

impl FitClient {
    pub fn new(http: Client, google: &GoogleConfig, bucket_millis: i64) -> Result<Self, FetchError> {
        let base = google.api_base_url.trim_end_matches('/');
        let endpoint = url::Url::parse(&format!("{base}/users/me/dataset:aggregate"))?;
        Ok(Self {
            http,
            endpoint,
            data_type_name: google.data_type_name.clone(),
            bucket_millis,
        })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// Request body for one window.
    pub fn request_body(&self, window: TimeWindow) -> serde_json::Value {
        json!({
            "aggregateBy": [{ "dataTypeName": self.data_type_name }],
            "bucketByTime": { "durationMillis": self.bucket_millis },
            "startTimeMillis": window.start_ms,
            "endTimeMillis": window.end_ms,
        })
    }

    /// Fetch and decode the aggregate response for `window`.
    pub async fn aggregate(
        &self,
        access_token: &str,
        window: TimeWindow,
    ) -> Result<AggregateResponse, FetchError> {
        let body = self.request_body(window);
        tracing::debug!(%body, "aggregate request");

        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&text, 300),
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateResponse {
    #[serde(default)]
    pub bucket: Vec<AggregateBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    #[serde(deserialize_with = "millis_from_string_or_number")]
    pub start_time_millis: i64,
    #[serde(deserialize_with = "millis_from_string_or_number")]
    pub end_time_millis: i64,
    #[serde(default)]
    pub dataset: Vec<Dataset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub point: Vec<DataPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(default)]
    pub value: Vec<PointValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValue {
    #[serde(default)]
    pub int_val: Option<i64>,
}

/// The API encodes int64 fields as JSON strings; accept plain numbers too.
fn millis_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(i64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Number(n) => Ok(n),
        Millis::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl AggregateBucket {
    /// Sum of every `intVal` across all datasets and points.
    ///
    /// Returns `None` if the sum does not fit in an `i64`.
    pub fn total_steps(&self) -> Option<i64> {
        self.dataset
            .iter()
            .flat_map(|ds| &ds.point)
            .flat_map(|p| &p.value)
            .filter_map(|v| v.int_val)
            .try_fold(0i64, i64::checked_add)
    }
}

impl AggregateResponse {
    /// Buckets with a positive step total, as storable rows.
    ///
    /// Returns the rows and how many buckets were dropped for having no steps.
    ///
    /// # Errors
    /// A bucket whose total overflows makes the whole response `Malformed`.
    pub fn step_buckets(&self) -> Result<(Vec<StepBucket>, usize), FetchError> {
        let mut rows = Vec::with_capacity(self.bucket.len());
        let mut empty = 0;
        for b in &self.bucket {
            let total = b.total_steps().ok_or_else(|| {
                FetchError::Malformed(format!(
                    "step total overflows for bucket starting at {}",
                    b.start_time_millis
                ))
            })?;
            if total > 0 {
                rows.push(StepBucket {
                    start_time: b.start_time_millis,
                    end_time: b.end_time_millis,
                    steps: total as u64,
                });
            } else {
                empty += 1;
            }
        }
        Ok((rows, empty))
    }
}
