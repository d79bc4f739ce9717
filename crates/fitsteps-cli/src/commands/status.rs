use fitsteps_core::ingest::format_millis;
use fitsteps_core::Watermark;
use serde_json::json;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (config, db) = super::open_store()?;
    let db_path = config.database_path()?;
    let watermark = Watermark::new(&db).get()?;
    let summary = db.summary()?;

    if json {
        let value = json!({
            "database": db_path.display().to_string(),
            "watermark": watermark,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Database:   {}", db_path.display());
    match watermark {
        Some(ms) => println!("Last fetch: {}", format_millis(ms)),
        None => println!("Last fetch: never"),
    }
    println!("Buckets:    {}", summary.bucket_count);
    println!("Steps:      {}", summary.total_steps);
    if let (Some(first), Some(last)) = (summary.first_bucket, summary.last_bucket) {
        println!("Span:       {} -> {}", first.to_rfc3339(), last.to_rfc3339());
    }
    Ok(())
}
