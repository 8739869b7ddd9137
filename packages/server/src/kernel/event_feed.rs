//! File-backed event source.
//!
//! Reads a newline-delimited JSON export of the submissions channel, one
//! message per line:
//!
//! ```json
//! {"channel":"ambassadors","id":"m1","author_id":"u1","created_at":"2026-10-01T09:00:00Z","content":"https://youtu.be/abc","attachments":[]}
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use points_engine::{EngineError, EventSource, Result, SourceEvent};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct FeedLine {
    channel: String,
    #[serde(flatten)]
    event: SourceEvent,
}

/// An [`EventSource`] over a JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventSource for JsonLinesSource {
    async fn fetch_events(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceEvent>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| EngineError::Source(Box::new(e)))?;

        let mut events = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedLine>(line) {
                Ok(feed) if feed.channel == channel && feed.event.created_at >= since => {
                    events.push(feed.event)
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable feed line"
                ),
            }
        }

        events.sort_by_key(|e| e.created_at);
        events.truncate(limit);
        Ok(events)
    }
}
