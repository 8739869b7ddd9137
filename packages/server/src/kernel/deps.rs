//! Engine wiring for the server process.

use anyhow::{Context, Result};
use points_engine::{Engine, RulesTable, SqliteStore};

use crate::config::Config;
use crate::kernel::{event_feed::JsonLinesSource, log_sink::LogSink};

/// The engine as deployed: SQLite store, file feed, rules table, log mirror.
pub type PointsEngine = Engine<SqliteStore, JsonLinesSource, RulesTable, LogSink>;

/// Connect to the database and assemble the engine.
pub async fn build_engine(config: &Config) -> Result<PointsEngine> {
    tracing::info!("Connecting to database...");
    let store = SqliteStore::new(&config.database_url)
        .await
        .context("Failed to open points database")?;
    tracing::info!("Database connected");

    let rules = match &config.point_rules_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading point rules");
            RulesTable::load(path).context("Failed to load point rules")?
        }
        None => RulesTable::default(),
    };

    Ok(Engine::new(
        store,
        JsonLinesSource::new(&config.events_path),
        rules,
        LogSink,
        config.scan.clone(),
    )
    .with_reconcile_config(config.reconcile.clone()))
}
