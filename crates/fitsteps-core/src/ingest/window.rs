//! Fixed-size request windows over an epoch-millis range.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Half-open span `[start_ms, end_ms)` in epoch millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn len_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Split `[start_ms, end_ms)` into contiguous windows of `chunk_ms`.
///
/// The last window is shorter when the range is not a multiple of the chunk.
/// An empty or inverted range yields no windows.
///
/// # Errors
/// Returns an error if `chunk_ms` is not positive.
pub fn split_windows(
    start_ms: i64,
    end_ms: i64,
    chunk_ms: i64,
) -> Result<Vec<TimeWindow>, ValidationError> {
    if chunk_ms <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "chunk_ms".into(),
            message: format!("must be positive, got {chunk_ms}"),
        });
    }

    let mut windows = Vec::new();
    let mut current = start_ms;
    while current < end_ms {
        let next = current.saturating_add(chunk_ms).min(end_ms);
        windows.push(TimeWindow {
            start_ms: current,
            end_ms: next,
        });
        current = next;
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400_000;

    #[test]
    fn test_exact_multiple() {
        let w = split_windows(0, 60 * DAY, 30 * DAY).unwrap();
        assert_eq!(
            w,
            vec![
                TimeWindow { start_ms: 0, end_ms: 30 * DAY },
                TimeWindow { start_ms: 30 * DAY, end_ms: 60 * DAY },
            ]
        );
    }

    #[test]
    fn test_short_final_window() {
        let w = split_windows(5, 5 + 45 * DAY, 30 * DAY).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w[1].len_ms(), 15 * DAY);
        assert_eq!(w[1].end_ms, 5 + 45 * DAY);
    }

    #[test]
    fn test_range_shorter_than_chunk() {
        let w = split_windows(100, 200, 30 * DAY).unwrap();
        assert_eq!(w, vec![TimeWindow { start_ms: 100, end_ms: 200 }]);
    }

    #[test]
    fn test_empty_and_inverted_ranges() {
        assert!(split_windows(100, 100, DAY).unwrap().is_empty());
        assert!(split_windows(200, 100, DAY).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_positive_chunk() {
        assert!(split_windows(0, 10, 0).is_err());
        assert!(split_windows(0, 10, -5).is_err());
    }
}
