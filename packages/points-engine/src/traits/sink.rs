//! Mirror sink for external copies of the ledger (spreadsheets, dashboards).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{report::LedgerCorrection, submission::Submission};

/// Receives notifications about recorded submissions and ledger corrections.
///
/// The engine may notify about the same fingerprint more than once (for
/// example after an interrupted scan is retried); sinks must be idempotent.
/// Sink failures are logged and never roll back engine state.
#[async_trait]
pub trait MirrorSink: Send + Sync {
    /// A new canonical submission was recorded.
    async fn submission_recorded(&self, submission: &Submission) -> Result<()>;

    /// The reconciler overwrote a ledger row.
    async fn ledger_corrected(&self, correction: &LedgerCorrection) -> Result<()>;
}

/// A sink that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl MirrorSink for NoopSink {
    async fn submission_recorded(&self, _submission: &Submission) -> Result<()> {
        Ok(())
    }

    async fn ledger_corrected(&self, _correction: &LedgerCorrection) -> Result<()> {
        Ok(())
    }
}
