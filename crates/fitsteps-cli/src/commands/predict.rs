use fitsteps_core::forecast_next_day;
use serde_json::json;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (config, db) = super::open_store()?;
    let daily = db.daily_totals(config.ingest.utc_offset())?;
    let forecast = forecast_next_day(&daily);

    if json {
        let value = match &forecast {
            Some(f) => serde_json::to_value(f)?,
            None => json!({ "date": null, "steps": 0, "model": null, "history_days": 0 }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match forecast {
        Some(f) if f.model.is_some() => {
            println!("Predicted steps for {}: {}", f.date.format("%Y-%m-%d"), f.steps);
            println!("Based on {} days of history", f.history_days);
        }
        Some(f) => {
            println!("Predicted steps for {}: 0", f.date.format("%Y-%m-%d"));
            println!("Not enough history to fit a model (need at least 2 days)");
        }
        None => {
            println!("Predicted steps: 0");
            println!("No step data stored yet");
        }
    }
    Ok(())
}
