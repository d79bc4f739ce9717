use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "fitsteps",
    version,
    about = "Collect Google Fit step counts and forecast tomorrow's total"
)]
struct Cli {
    /// Without a subcommand, runs an incremental ingest.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch step data into the local database
    Ingest(commands::ingest::IngestArgs),
    /// Show stored daily totals
    History {
        /// Only the last N calendar days, ending at the latest stored day
        #[arg(long)]
        days: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Predict tomorrow's step count from stored history
    Predict {
        #[arg(long)]
        json: bool,
    },
    /// Show the watermark and what is stored
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fitsteps_core=info,fitsteps=info")),
        )
        .init();
}

fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        None => commands::ingest::run(commands::ingest::IngestArgs::default()),
        Some(Commands::Ingest(args)) => commands::ingest::run(args),
        Some(Commands::History { days, json }) => commands::history::run(days, json),
        Some(Commands::Predict { json }) => commands::predict::run(json),
        Some(Commands::Status { json }) => commands::status::run(json),
        Some(Commands::Config { action }) => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
