// Main entry point for the points scheduler and operator CLI

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use server_core::{
    kernel::{build_engine, start_scheduler},
    Config,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "points")]
#[command(about = "Ambassador submission scanning and points reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scheduled scans and reconciliation until Ctrl-C
    Serve,

    /// Scan the submission window now
    Scan {
        /// Print the full summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a reconciliation pass now
    Reconcile {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the ledger row and submissions for one ambassador
    Ledger { ambassador_id: String },

    /// Show every ledger row, highest lifetime points first
    Leaderboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,points_engine=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let engine = Arc::new(build_engine(&config).await?);

    match cli.command {
        Commands::Serve => {
            tracing::info!("Starting points scheduler");
            let mut scheduler = start_scheduler(engine.clone())
                .await
                .context("Failed to start scheduler")?;

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutting down scheduler");
            scheduler
                .shutdown()
                .await
                .context("Failed to stop scheduler")?;
        }
        Commands::Scan { json } => {
            let summary = engine.run_scan(Utc::now()).await.context("Scan failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }
        Commands::Reconcile { json } => {
            let report = engine
                .run_reconciliation(Utc::now())
                .await
                .context("Reconciliation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
        }
        Commands::Ledger { ambassador_id } => {
            match engine.ledger_for(&ambassador_id).await? {
                Some(row) => println!("{row}"),
                None => println!("{ambassador_id}: no ledger row yet"),
            }
            for submission in engine.submissions_for(&ambassador_id).await? {
                let flag = if submission.is_duplicate {
                    "duplicate"
                } else {
                    submission.validity_status.as_str()
                };
                println!(
                    "  {}  {:>3} pts  {:<10} {}",
                    submission.submitted_at.format("%Y-%m-%d %H:%M"),
                    submission.points_awarded,
                    flag,
                    submission.content
                );
            }
        }
        Commands::Leaderboard => {
            for (rank, row) in engine.leaderboard().await?.iter().enumerate() {
                println!("{:>3}. {row}", rank + 1);
            }
        }
    }

    Ok(())
}
