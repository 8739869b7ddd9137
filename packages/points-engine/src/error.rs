//! Typed errors for the points engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! per-item failures apart from failures that must abort a whole pass.

use thiserror::Error;

/// Errors that can occur while scanning, storing, or reconciling submissions.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage backend failed (connection lost, lock poisoned, ...)
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored row could not be decoded
    #[error("corrupt submission row {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    /// A candidate could not be classified into a submission
    #[error("malformed candidate in event {event_id}: {reason}")]
    MalformedCandidate { event_id: String, reason: String },

    /// The point policy has no value for this classification
    #[error("no point value for {kind}/{platform}/{post_type}")]
    PolicyLookupMiss {
        kind: String,
        platform: String,
        post_type: String,
    },

    /// The external event source failed
    #[error("event source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The mirror sink rejected a notification
    #[error("mirror sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this error must abort the whole scan or reconciliation pass.
    ///
    /// Everything else is scoped to one candidate or one ambassador.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Source(_))
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string().into())
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_fatal_classification() {
        assert!(EngineError::store("connection reset").is_batch_fatal());
        assert!(EngineError::Source("timeout".into()).is_batch_fatal());

        let malformed = EngineError::MalformedCandidate {
            event_id: "m1".into(),
            reason: "empty author".into(),
        };
        assert!(!malformed.is_batch_fatal());

        let corrupt = EngineError::CorruptRow {
            id: "row".into(),
            reason: "bad date".into(),
        };
        assert!(!corrupt.is_batch_fatal());
    }

    #[test]
    fn test_policy_miss_message() {
        let err = EngineError::PolicyLookupMiss {
            kind: "url".into(),
            platform: "unknown".into(),
            post_type: "link".into(),
        };
        assert_eq!(err.to_string(), "no point value for url/unknown/link");
    }
}
