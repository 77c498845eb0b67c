use std::{
    path::PathBuf,
    process::ExitCode,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bookstore_batch::{
    bookstore::{
        create_schema,
        jobs::{run_delete_job, run_import_job},
    },
    config::{BatchConfig, DEFAULT_CONFIG_FILE},
};
use clap::{Parser, Subcommand};
use figment::Figment;
use log::{info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Bookstore batch jobs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a `title;isbn` file into the books table
    Import {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long)]
        chunk_size: Option<u16>,
        #[arg(long)]
        skip_limit: Option<u16>,
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Delete a file
    Delete {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl Command {
    fn merge_into(&self, mut figment: Figment) -> Figment {
        match self {
            Command::Import {
                input,
                chunk_size,
                skip_limit,
                database_url,
            } => {
                if let Some(input) = input {
                    figment = figment.merge(("input.path", input));
                }
                if let Some(chunk_size) = chunk_size {
                    figment = figment.merge(("chunk.size", chunk_size));
                }
                if let Some(skip_limit) = skip_limit {
                    figment = figment.merge(("chunk.skip_limit", skip_limit));
                }
                if let Some(database_url) = database_url {
                    figment = figment.merge(("database.url", database_url));
                }
            }
            Command::Delete { path } => {
                if let Some(path) = path {
                    figment = figment.merge(("delete.path", path));
                }
            }
        }
        figment
    }
}

async fn import(config: &BatchConfig) -> anyhow::Result<()> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    create_schema(&pool).await?;

    let stop_signal = Arc::new(AtomicBool::new(false));
    let stop_on_interrupt = Arc::clone(&stop_signal);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current chunk");
            stop_on_interrupt.store(true, Ordering::Relaxed);
        }
    });

    run_import_job(config, &pool, Some(stop_signal.as_ref()))?;
    pool.close().await;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let figment = cli.command.merge_into(BatchConfig::figment(&cli.config));
    let config = BatchConfig::from_figment(figment)?;

    match cli.command {
        Command::Import { .. } => import(&config).await?,
        Command::Delete { .. } => {
            run_delete_job(&config)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {
            info!("Job completed");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Job failed: {}", error);
            ExitCode::FAILURE
        }
    }
}
