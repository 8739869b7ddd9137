use anyhow::{Context, Result};
use dotenvy::dotenv;
use points_engine::{ReconcileConfig, ScanConfig};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const HOUR_SECS: u64 = 60 * 60;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub scan: ScanConfig,
    pub reconcile: ReconcileConfig,
    pub point_rules_path: Option<PathBuf>,
    pub events_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let hours = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(value) => value
                    .parse()
                    .with_context(|| format!("{key} must be a whole number of hours")),
                None => Ok(default),
            }
        };

        let scan_interval = hours("SCAN_INTERVAL_HOURS", 6)?;
        let default_window = scan_interval
            .checked_add(1)
            .context("SCAN_INTERVAL_HOURS is too large")?;
        let scan_window = hours("SCAN_WINDOW_HOURS", default_window)?;
        let reconcile_interval = hours("RECONCILE_INTERVAL_HOURS", 24)?;

        let scan_limit: usize = lookup("SCAN_LIMIT")
            .unwrap_or_else(|| "500".to_string())
            .parse()
            .context("SCAN_LIMIT must be a valid number")?;
        let monthly_minimum: i64 = lookup("MONTHLY_MINIMUM")
            .unwrap_or_else(|| "50".to_string())
            .parse()
            .context("MONTHLY_MINIMUM must be a valid number")?;

        let scan = ScanConfig::new(lookup("SCAN_CHANNEL").context("SCAN_CHANNEL must be set")?)
            .with_interval(hours_to_duration("SCAN_INTERVAL_HOURS", scan_interval)?)
            .with_window(hours_to_duration("SCAN_WINDOW_HOURS", scan_window)?)
            .with_limit(scan_limit);
        scan.validate().context("Invalid scan configuration")?;
        scan.window_span().context("Invalid scan configuration")?;

        let reconcile = ReconcileConfig::default()
            .with_interval(hours_to_duration("RECONCILE_INTERVAL_HOURS", reconcile_interval)?)
            .with_monthly_minimum(monthly_minimum);
        reconcile
            .validate()
            .context("Invalid reconcile configuration")?;

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://points.db?mode=rwc".to_string()),
            scan,
            reconcile,
            point_rules_path: lookup("POINT_RULES_PATH").map(PathBuf::from),
            events_path: lookup("EVENTS_PATH")
                .map(PathBuf::from)
                .context("EVENTS_PATH must be set")?,
        })
    }
}

fn hours_to_duration(key: &str, hours: u64) -> Result<Duration> {
    hours
        .checked_mul(HOUR_SECS)
        .map(Duration::from_secs)
        .with_context(|| format!("{key} is too large"))
}
