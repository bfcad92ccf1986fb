//! Command-line access to the OpenF1 API through the paced fetch queue.
//!
//!   openf1 latest
//!   openf1 sessions --year 2024
//!   openf1 summary [--session 9158]
//!   openf1 fetch laps --session 9158 --driver 44

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use openf1_client::OpenF1;
use openf1_client::SESSION_TYPE_RACE;
use tower::BoxError;
use tower_pace::ApiRequest;
use tower_pace::QueueConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "openf1", about = "Query the OpenF1 telemetry API")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML queue configuration. `OPENF1_*` environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the most recent race session.
    Latest,

    /// List sessions of one type in a year.
    Sessions {
        #[arg(long)]
        year: i32,

        #[arg(long = "type", default_value = SESSION_TYPE_RACE)]
        session_type: String,
    },

    /// Fetch drivers, laps, stints, pits and weather of a session concurrently
    /// and print how many records each returned.
    Summary {
        /// Session key; defaults to the latest race.
        #[arg(long)]
        session: Option<u32>,
    },

    /// Fetch any endpoint for a session and print the raw records.
    Fetch {
        /// Endpoint name, e.g. `laps` or `car_data`.
        endpoint: String,

        /// Session key; defaults to the latest race.
        #[arg(long)]
        session: Option<u32>,

        #[arg(long)]
        driver: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => QueueConfig::from_toml_file(path)?,
        None => QueueConfig::default(),
    }
    .with_env_overrides()?;
    info!(base_url = %config.base_url, spacing = ?config.min_interval, "starting");

    let f1 = OpenF1::from_config(&config)?;

    match cli.command {
        Command::Latest => match f1.latest_session().await {
            Some(session) => println!("{session:#?}"),
            None => println!("no race sessions found"),
        },
        Command::Sessions { year, session_type } => {
            for session in f1.sessions(year, &session_type).await {
                println!(
                    "{:>6}  {}  {:<20} {}",
                    session.session_key,
                    session.date_start.format("%Y-%m-%d %H:%M"),
                    session.circuit_short_name,
                    session.session_name
                );
            }
        }
        Command::Summary { session } => {
            let session_key = resolve_session(&f1, session).await?;
            let (drivers, laps, stints, pits, weather) = tokio::join!(
                f1.drivers(session_key),
                f1.laps(session_key, None),
                f1.stints(session_key, None),
                f1.pits(session_key, None),
                f1.weather(session_key),
            );
            println!("session {session_key}");
            println!("  drivers: {}", drivers.len());
            println!("  laps:    {}", laps.len());
            println!("  stints:  {}", stints.len());
            println!("  pits:    {}", pits.len());
            println!("  weather: {}", weather.len());
        }
        Command::Fetch {
            endpoint,
            session,
            driver,
        } => {
            let session_key = resolve_session(&f1, session).await?;
            let request = ApiRequest::new(format!("/{}", endpoint.trim_start_matches('/')))
                .param("session_key", session_key)
                .param_opt("driver_number", driver.filter(|&n| n != 0));
            let records = f1
                .queue()
                .try_enqueue::<serde_json::Value>(request)
                .await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            info!(count = records.len(), "fetched");
        }
    }

    Ok(())
}

async fn resolve_session(f1: &OpenF1, session: Option<u32>) -> Result<u32, BoxError> {
    match session {
        Some(key) => Ok(key),
        None => f1
            .latest_session()
            .await
            .map(|s| s.session_key)
            .ok_or_else(|| "no race sessions found; pass --session".into()),
    }
}
