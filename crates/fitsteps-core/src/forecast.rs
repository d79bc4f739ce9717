//! Next-day step forecast.
//!
//! Fits ordinary least squares over two features, the day offset from the
//! earliest date and a weekend indicator, and extrapolates one day forward.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Total steps for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySteps {
    pub date: NaiveDate,
    pub steps: i64,
}

/// Fitted model `steps = intercept + day_coef * day + weekend_coef * weekend`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepModel {
    pub intercept: f64,
    pub day_coef: f64,
    pub weekend_coef: f64,
    /// Earliest date in the training history; day offsets count from here.
    pub origin: NaiveDate,
}

/// A prediction together with the model that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub date: NaiveDate,
    pub steps: i64,
    pub model: Option<StepModel>,
    pub history_days: usize,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl StepModel {
    /// Fit the model. Returns `None` with fewer than two points.
    ///
    /// Rank-deficient designs (no weekend in history, weekend flag collinear
    /// with the day offset) resolve to the minimum-norm least-squares solution.
    pub fn fit(history: &[DailySteps]) -> Option<Self> {
        if history.len() < 2 {
            return None;
        }
        let origin = history.iter().map(|d| d.date).min()?;

        let n = history.len() as f64;
        let rows: Vec<(f64, f64, f64)> = history
            .iter()
            .map(|d| {
                let day = (d.date - origin).num_days() as f64;
                let weekend = if is_weekend(d.date) { 1.0 } else { 0.0 };
                (day, weekend, d.steps as f64)
            })
            .collect();

        let mean_day = rows.iter().map(|r| r.0).sum::<f64>() / n;
        let mean_weekend = rows.iter().map(|r| r.1).sum::<f64>() / n;
        let mean_steps = rows.iter().map(|r| r.2).sum::<f64>() / n;

        // Centered normal equations: A * beta = b.
        let (mut s11, mut s12, mut s22, mut b1, mut b2) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(day, weekend, steps) in &rows {
            let x1 = day - mean_day;
            let x2 = weekend - mean_weekend;
            let y = steps - mean_steps;
            s11 += x1 * x1;
            s12 += x1 * x2;
            s22 += x2 * x2;
            b1 += x1 * y;
            b2 += x2 * y;
        }

        let (day_coef, weekend_coef) = solve_symmetric_pinv(s11, s12, s22, b1, b2);
        let intercept = mean_steps - day_coef * mean_day - weekend_coef * mean_weekend;

        Some(Self {
            intercept,
            day_coef,
            weekend_coef,
            origin,
        })
    }

    pub fn predict(&self, date: NaiveDate) -> f64 {
        let day = (date - self.origin).num_days() as f64;
        let weekend = if is_weekend(date) { 1.0 } else { 0.0 };
        self.intercept + self.day_coef * day + self.weekend_coef * weekend
    }
}

/// Solve `[[a, b], [b, c]] * x = r` using the Moore-Penrose pseudo-inverse.
fn solve_symmetric_pinv(a: f64, b: f64, c: f64, r1: f64, r2: f64) -> (f64, f64) {
    let half_trace = (a + c) / 2.0;
    let spread = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let l1 = half_trace + spread;
    let l2 = half_trace - spread;

    let tol = l1.abs().max(1.0) * 1e-10;
    if l1 <= tol {
        return (0.0, 0.0);
    }
    if l2 > tol {
        let det = a * c - b * b;
        return ((c * r1 - b * r2) / det, (a * r2 - b * r1) / det);
    }

    // Rank one: pinv = v v^T / (l1 |v|^2) for the dominant eigenvector v.
    let (vx, vy) = if b.abs() > f64::EPSILON {
        (l1 - c, b)
    } else if a >= c {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };
    let scale = (vx * r1 + vy * r2) / (l1 * (vx * vx + vy * vy));
    (vx * scale, vy * scale)
}

/// Predict steps for the day after the latest date in `history`.
///
/// Returns 0 when fewer than two points exist. The prediction is truncated
/// toward zero.
pub fn predict_next_day(history: &[DailySteps]) -> i64 {
    forecast_next_day(history).map_or(0, |f| f.steps)
}

/// Like [`predict_next_day`] but keeps the target date and fitted model.
pub fn forecast_next_day(history: &[DailySteps]) -> Option<Forecast> {
    let latest = history.iter().map(|d| d.date).max()?;
    let next = latest + Duration::days(1);
    let model = StepModel::fit(history);
    let steps = model.map_or(0, |m| m.predict(next) as i64);
    Some(Forecast {
        date: next,
        steps,
        model,
        history_days: history.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32, steps: i64) -> DailySteps {
        DailySteps {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            steps,
        }
    }

    #[test]
    fn test_empty_history_predicts_zero() {
        assert_eq!(predict_next_day(&[]), 0);
        assert!(forecast_next_day(&[]).is_none());
    }

    #[test]
    fn test_single_point_predicts_zero() {
        assert_eq!(predict_next_day(&[day(2024, 3, 4, 8000)]), 0);
        let f = forecast_next_day(&[day(2024, 3, 4, 8000)]).unwrap();
        assert_eq!(f.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert!(f.model.is_none());
    }

    #[test]
    fn test_two_weekdays_follow_trend_line() {
        // Monday and Tuesday; Wednesday continues the line.
        let history = [day(2024, 3, 4, 1000), day(2024, 3, 5, 2000)];
        assert_eq!(predict_next_day(&history), 3000);
    }

    #[test]
    fn test_order_of_history_does_not_matter() {
        let history = [day(2024, 3, 5, 2000), day(2024, 3, 4, 1000)];
        assert_eq!(predict_next_day(&history), 3000);
    }

    #[test]
    fn test_exact_linear_weekday_series() {
        // Mon..Fri, 500 more each day; Saturday has no weekend samples to learn from.
        let history: Vec<_> = (0..5)
            .map(|i| day(2024, 3, 4 + i, 4000 + 500 * i as i64))
            .collect();
        let model = StepModel::fit(&history).unwrap();
        assert!((model.day_coef - 500.0).abs() < 1e-6);
        assert!(model.weekend_coef.abs() < 1e-6);
        assert_eq!(predict_next_day(&history), 6500);
    }

    #[test]
    fn test_weekend_effect_is_learned() {
        // Two full weeks, flat 10k on weekdays and 4k on weekends.
        let history: Vec<_> = (0..14)
            .map(|i| {
                let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Duration::days(i);
                let steps = if is_weekend(date) { 4000 } else { 10_000 };
                DailySteps { date, steps }
            })
            .collect();
        let model = StepModel::fit(&history).unwrap();
        assert!(model.day_coef.abs() < 1e-6);
        assert!((model.weekend_coef + 6000.0).abs() < 1e-6);
        // Last day is Sunday the 17th; Monday is a weekday.
        let forecast = forecast_next_day(&history).unwrap();
        assert_eq!(forecast.date, NaiveDate::from_ymd_opt(2024, 3, 18).unwrap());
        assert!((model.predict(forecast.date) - 10_000.0).abs() < 1e-6);
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 23).unwrap();
        assert!((model.predict(saturday) - 4000.0).abs() < 1e-6);
    }

    #[test]
    fn test_collinear_weekend_uses_min_norm_solution() {
        // Friday then Saturday: day offset and weekend flag move together.
        let history = [day(2024, 3, 8, 1000), day(2024, 3, 9, 2000)];
        let model = StepModel::fit(&history).unwrap();
        assert!((model.day_coef - 500.0).abs() < 1e-6);
        assert!((model.weekend_coef - 500.0).abs() < 1e-6);
        // Sunday: 1000 + 500 * 2 + 500 * 1.
        assert_eq!(predict_next_day(&history), 2500);
    }

    #[test]
    fn test_prediction_truncates_toward_zero() {
        let history = [
            day(2024, 3, 4, 1),
            day(2024, 3, 5, 0),
            day(2024, 3, 6, 0),
        ];
        // Slope -0.5, intercept 5/6: Thursday is ~ -0.667, truncated to 0 rather than -1.
        assert_eq!(predict_next_day(&history), 0);
    }

    #[test]
    fn test_weekend_detection() {
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()));
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()));
    }
}
