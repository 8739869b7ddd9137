//! Configuration for scan and reconciliation passes.

use std::time::Duration;

use crate::error::{EngineError, Result};

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Configuration for the ingestion window scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Source channel to read submissions from
    pub channel: String,

    /// How often the scan is scheduled
    pub interval: Duration,

    /// Trailing window fetched per scan; defaults to `interval` + 1h
    pub window: Duration,

    /// Maximum events fetched per scan
    pub limit: usize,
}

impl ScanConfig {
    /// Create a config for a channel with a 6h cadence and 7h window.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            interval: 6 * HOUR,
            window: 7 * HOUR,
            limit: 500,
        }
    }

    /// Set the cadence; the window follows at one hour longer.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.window = interval.saturating_add(HOUR);
        self
    }

    /// Override the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Window length as a `chrono` duration, for computing `since`.
    pub fn window_span(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.window)
            .map_err(|e| EngineError::Config(format!("scan window out of range: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(EngineError::Config("scan channel must be set".into()));
        }
        if self.window.is_zero() {
            return Err(EngineError::Config("scan window must be positive".into()));
        }
        if self.interval.is_zero() {
            return Err(EngineError::Config("scan interval must be positive".into()));
        }
        if self.limit == 0 {
            return Err(EngineError::Config("scan limit must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration for the points reconciler.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How often reconciliation is scheduled
    pub interval: Duration,

    /// Points needed in a month for it to count toward the streak
    pub monthly_minimum: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: 24 * HOUR,
            monthly_minimum: 50,
        }
    }
}

impl ReconcileConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_monthly_minimum(mut self, minimum: i64) -> Self {
        self.monthly_minimum = minimum;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(EngineError::Config(
                "reconcile interval must be positive".into(),
            ));
        }
        if self.monthly_minimum < 0 {
            return Err(EngineError::Config(
                "monthly minimum cannot be negative".into(),
            ));
        }
        Ok(())
    }
}
