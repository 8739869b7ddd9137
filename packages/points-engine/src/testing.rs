//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the points engine
//! without a live chat connection or an external ledger mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

use crate::error::{EngineError, Result};
use crate::traits::{sink::MirrorSink, source::EventSource};
use crate::types::{event::SourceEvent, report::LedgerCorrection, submission::Submission};

/// A mock event source serving a fixed list of events.
///
/// Honors `since` and `limit` like a real source unless told otherwise, and
/// records every fetch for assertions.
#[derive(Default, Clone)]
pub struct MockEventSource {
    events: Arc<RwLock<Vec<SourceEvent>>>,

    /// Return events older than `since` too, like a misbehaving source
    ignore_since: bool,

    /// Fail every fetch
    fail: bool,

    calls: Arc<RwLock<Vec<SourceCall>>>,
}

/// Record of a fetch made against the mock source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCall {
    pub channel: String,
    pub since: DateTime<Utc>,
    pub limit: usize,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(self, events: Vec<SourceEvent>) -> Self {
        self.events.write().unwrap().extend(events);
        self
    }

    /// Post another event to the channel.
    pub fn push_event(&self, event: SourceEvent) {
        self.events.write().unwrap().push(event);
    }

    pub fn ignoring_since(mut self) -> Self {
        self.ignore_since = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Get all fetches made so far.
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_events(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceEvent>> {
        self.calls.write().unwrap().push(SourceCall {
            channel: channel.to_string(),
            since,
            limit,
        });

        if self.fail {
            return Err(EngineError::Source("mock source unavailable".into()));
        }

        let mut events: Vec<SourceEvent> = self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| self.ignore_since || e.created_at >= since)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        events.truncate(limit);
        Ok(events)
    }
}

/// A mirror sink that keeps every notification in memory.
#[derive(Default, Clone)]
pub struct RecordingSink {
    recorded: Arc<RwLock<Vec<Submission>>>,
    corrections: Arc<RwLock<Vec<LedgerCorrection>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record notifications, then report failure for each one.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn recorded(&self) -> Vec<Submission> {
        self.recorded.read().unwrap().clone()
    }

    pub fn corrections(&self) -> Vec<LedgerCorrection> {
        self.corrections.read().unwrap().clone()
    }

    fn result(&self) -> Result<()> {
        if self.fail {
            Err(EngineError::Sink("mock sink unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MirrorSink for RecordingSink {
    async fn submission_recorded(&self, submission: &Submission) -> Result<()> {
        self.recorded.write().unwrap().push(submission.clone());
        self.result()
    }

    async fn ledger_corrected(&self, correction: &LedgerCorrection) -> Result<()> {
        self.corrections.write().unwrap().push(correction.clone());
        self.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_mock_source_honors_since_and_limit() {
        let base = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let source = MockEventSource::new().with_events(vec![
            SourceEvent::new("m3", "u1", base + Duration::hours(3), ""),
            SourceEvent::new("m1", "u1", base + Duration::hours(1), ""),
            SourceEvent::new("m2", "u1", base + Duration::hours(2), ""),
        ]);

        let events = source
            .fetch_events("ambassadors", base + Duration::hours(2), 10)
            .await
            .unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        let events = source.fetch_events("ambassadors", base, 1).await.unwrap();
        assert_eq!(events[0].id, "m1");
        assert_eq!(source.calls().len(), 2);
    }
}
