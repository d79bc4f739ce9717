use chrono::Duration;
use fitsteps_core::DailySteps;

/// Keep the last `days` calendar days ending at the latest stored date.
///
/// Days without data still count toward the span. `None` keeps everything.
fn tail(daily: Vec<DailySteps>, days: Option<usize>) -> Vec<DailySteps> {
    let (Some(n), Some(latest)) = (days, daily.iter().map(|d| d.date).max()) else {
        return daily;
    };
    if n == 0 {
        return Vec::new();
    }
    let span = i64::try_from(n - 1).unwrap_or(i64::MAX);
    match latest.checked_sub_signed(Duration::try_days(span).unwrap_or(Duration::MAX)) {
        Some(cutoff) => daily.into_iter().filter(|d| d.date >= cutoff).collect(),
        None => daily,
    }
}

pub fn run(days: Option<usize>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (config, db) = super::open_store()?;
    let daily = tail(db.daily_totals(config.ingest.utc_offset())?, days);

    if json {
        println!("{}", serde_json::to_string_pretty(&daily)?);
        return Ok(());
    }

    if daily.is_empty() {
        println!("No step data stored yet. Run `fitsteps ingest` first.");
        return Ok(());
    }

    println!("{:<12} {:>10}", "Date", "Steps");
    for d in &daily {
        println!("{:<12} {:>10}", d.date.format("%Y-%m-%d"), d.steps);
    }
    Ok(())
}
