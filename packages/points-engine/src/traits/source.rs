//! The external chat event source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::event::SourceEvent;

/// Where candidate submissions come from.
///
/// Implementations must honor `since`: the engine never asks for unbounded
/// history. Delivery does not need to be exactly-once; overlapping windows
/// may return the same event twice.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch up to `limit` events posted to `channel` at or after `since`.
    async fn fetch_events(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceEvent>>;
}
