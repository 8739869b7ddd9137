//! Mirror sink that writes notifications to the log.

use async_trait::async_trait;
use points_engine::{LedgerCorrection, MirrorSink, Result, Submission};

/// Logs every recorded submission and ledger correction.
///
/// Stands in for an external mirror (spreadsheet, dashboard); logging the
/// same notification twice is harmless.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MirrorSink for LogSink {
    async fn submission_recorded(&self, submission: &Submission) -> Result<()> {
        tracing::info!(
            submission_id = %submission.id,
            ambassador_id = %submission.ambassador_id,
            fingerprint = %submission.fingerprint,
            platform = %submission.platform,
            points = submission.points_awarded,
            status = %submission.validity_status,
            "Submission recorded"
        );
        Ok(())
    }

    async fn ledger_corrected(&self, correction: &LedgerCorrection) -> Result<()> {
        tracing::info!(
            ambassador_id = %correction.ambassador_id,
            period = %correction.period,
            month_delta = correction.month_delta(),
            lifetime_delta = correction.lifetime_delta(),
            "Ledger corrected"
        );
        Ok(())
    }
}
