use chrono::NaiveDate;
use clap::Args;
use fitsteps_core::ingest::format_millis;
use fitsteps_core::{Credentials, IngestPlan, IngestReport, Ingestor, RangeEnd};

#[derive(Args, Debug, Default)]
pub struct IngestArgs {
    /// Backfill from this day (YYYY-MM or YYYY-MM-DD) instead of the watermark
    #[arg(long)]
    pub from: Option<String>,
    /// End the backfill at the start of this day (YYYY-MM-DD)
    #[arg(long, requires = "from", conflicts_with = "until_midnight")]
    pub until: Option<String>,
    /// End the backfill at the start of today
    #[arg(long, requires = "from")]
    pub until_midnight: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Accepts `YYYY-MM-DD`, or `YYYY-MM` meaning the first of that month.
fn parse_day(input: &str) -> Result<NaiveDate, String> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d"))
        .map_err(|_| format!("invalid date '{input}', expected YYYY-MM or YYYY-MM-DD"))
}

fn plan_from(args: &IngestArgs) -> Result<IngestPlan, String> {
    let Some(from) = &args.from else {
        return Ok(IngestPlan::Incremental);
    };
    let until = match (&args.until, args.until_midnight) {
        (Some(day), _) => RangeEnd::Date(parse_day(day)?),
        (None, true) => RangeEnd::TodayMidnight,
        (None, false) => RangeEnd::Now,
    };
    Ok(IngestPlan::Backfill {
        from: parse_day(from)?,
        until,
    })
}

fn print_report(report: &IngestReport) {
    match report.range {
        Some(range) => println!(
            "Range:      {} -> {}",
            format_millis(range.start_ms),
            format_millis(range.end_ms)
        ),
        None => println!("Range:      (empty)"),
    }
    println!(
        "Windows:    {} fetched / {} total",
        report.windows_fetched, report.windows
    );
    println!(
        "Buckets:    {} inserted, {} already stored, {} empty",
        report.inserted, report.duplicates, report.empty_buckets
    );
    if let Some(wm) = report.watermark {
        println!("Watermark:  {}", format_millis(wm));
    }
    for failed in &report.failed {
        println!(
            "Failed:     {} -> {}: {}",
            format_millis(failed.window.start_ms),
            format_millis(failed.window.end_ms),
            failed.error
        );
    }
}

pub fn run(args: IngestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let plan = plan_from(&args)?;
    let credentials = Credentials::from_env()?;
    let (config, db) = super::open_store()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(Ingestor::new(&db, &config).run(plan, &credentials))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_month_and_day() {
        assert_eq!(
            parse_day("2024-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert_eq!(
            parse_day("2024-05-17").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
        );
        assert!(parse_day("May 2024").is_err());
        assert!(parse_day("2024-13").is_err());
    }

    #[test]
    fn test_no_from_is_incremental() {
        assert_eq!(plan_from(&IngestArgs::default()).unwrap(), IngestPlan::Incremental);
    }

    #[test]
    fn test_backfill_end_variants() {
        let mut args = IngestArgs {
            from: Some("2024-01".into()),
            ..IngestArgs::default()
        };
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            plan_from(&args).unwrap(),
            IngestPlan::Backfill { from, until: RangeEnd::Now }
        );

        args.until_midnight = true;
        assert_eq!(
            plan_from(&args).unwrap(),
            IngestPlan::Backfill { from, until: RangeEnd::TodayMidnight }
        );

        args.until = Some("2024-03-01".into());
        args.until_midnight = false;
        assert_eq!(
            plan_from(&args).unwrap(),
            IngestPlan::Backfill {
                from,
                until: RangeEnd::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            }
        );
    }
}
