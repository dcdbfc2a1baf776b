use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// Classifies bank statements and keeps monthly and yearly aggregates up to date.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest a statement, then recompute the periods it touched
    Ingest {
        statement: PathBuf,
        #[arg(long, default_value = "saldo.toml")]
        config: PathBuf,
        #[arg(long, default_value = "saldo.db")]
        db: PathBuf,
        /// Defaults to now (UTC), e.g. 2024-06-01T09:30:00
        #[arg(long, value_parser = parse_timestamp)]
        reception_time: Option<NaiveDateTime>,
    },
    /// Recompute every period still marked for update
    Aggregate {
        /// File name the run is attributed to
        #[arg(long)]
        trigger: String,
        #[arg(long, default_value = "saldo.toml")]
        config: PathBuf,
        #[arg(long, default_value = "saldo.db")]
        db: PathBuf,
        #[arg(long, value_parser = parse_timestamp)]
        reception_time: Option<NaiveDateTime>,
    },
    /// Classify and aggregate a statement without writing anything
    Preview {
        statement: PathBuf,
        #[arg(long, default_value = "saldo.toml")]
        config: PathBuf,
    },
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, saldo_core::ISO_FORMAT).map_err(|e| e.to_string())
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Ingest { statement, config, db, reception_time } => {
            let config = config::Config::load(&config)?;
            let pool = saldo_storage::create_db(&db)
                .await
                .with_context(|| format!("Cannot open {}", db.display()))?;
            let summary = commands::ingest(
                &config,
                &pool,
                &statement,
                reception_time.unwrap_or_else(now),
            )
            .await?;
            println!("{summary}");
        }
        Command::Aggregate { trigger, config, db, reception_time } => {
            let config = config::Config::load(&config)?;
            let pool = saldo_storage::create_db(&db)
                .await
                .with_context(|| format!("Cannot open {}", db.display()))?;
            let summary = commands::aggregate(
                &config,
                &pool,
                &trigger,
                reception_time.unwrap_or_else(now),
            )
            .await?;
            println!("{summary}");
        }
        Command::Preview { statement, config } => {
            let config = config::Config::load(&config)?;
            let preview = commands::preview(&config, &statement)?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
    }

    Ok(())
}
