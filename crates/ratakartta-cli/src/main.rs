use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use ratakartta_core::model::TrainNumber;
use ratakartta_feed::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "ratakartta", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/ratakartta/ratakartta.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Watch live train positions with their origin and destination
    ///
    /// Polls the Digitraffic position feed and prints every reporting train
    /// on each poll. A train seen for the first time today is printed
    /// without a route; its timetable is fetched in the background (at most
    /// `max_requests_per_window` lookups per window) and the route shows up
    /// on a later poll.
    ///
    /// Resolved routes are cached per train and day in the database, so a
    /// restart does not fetch them again.
    Watch {
        /// Stop after this many polls (default: run until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,

        /// Print each poll as a JSON array instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Look up one train's origin and destination
    Lookup {
        /// Train number
        train: TrainNumber,

        /// Service day (default: today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show metadata cache status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.db {
        Some(path) => Config::load_with_db_path(path)?,
        None => Config::load()?,
    };
    init_logging(&config.log_level);

    match cli.command {
        Commands::Watch { ticks, json } => {
            commands::run_watch(&config, ticks, json).await?;
        }
        Commands::Lookup { train, date } => {
            commands::run_lookup(&config, train, date).await?;
        }
        Commands::Status => {
            commands::show_status(&config)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
