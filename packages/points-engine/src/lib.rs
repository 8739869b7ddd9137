//! Ambassador Submission Deduplication and Points Reconciliation
//!
//! Ingests proof-of-work submissions (shared post links and screenshots) from
//! a chat stream, credits each logical contribution exactly once, and keeps a
//! per-ambassador points ledger converged to the set of valid submissions.
//!
//! # Design
//!
//! - The submission store is the source of truth; the ledger is a cache
//! - Fingerprints depend only on ambassador and content, never on the message
//! - Scans always read a bounded trailing window, never all history
//! - Reconciliation recomputes totals wholesale and reports the drift
//!
//! # Usage
//!
//! ```rust,ignore
//! use points_engine::{Engine, MemoryStore, NoopSink, RulesTable, ScanConfig};
//! use points_engine::testing::MockEventSource;
//!
//! let engine = Engine::new(
//!     MemoryStore::new(),
//!     MockEventSource::new(),
//!     RulesTable::default(),
//!     NoopSink,
//!     ScanConfig::new("ambassadors"),
//! );
//!
//! let summary = engine.run_scan(Utc::now()).await?;
//! let report = engine.run_reconciliation(Utc::now()).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams to the outside world (EventSource, PointPolicy, MirrorSink, stores)
//! - [`types`] - Submissions, ledger rows, configs, and reports
//! - [`pipeline`] - Window scan, duplicate sweep, standing, reconciliation
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`testing`] - Mock implementations for testing

pub mod classify;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod rules;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use fingerprint::{normalize_url, Fingerprint};
pub use rules::RulesTable;
pub use stores::MemoryStore;
#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;
pub use traits::{
    policy::PointPolicy,
    sink::{MirrorSink, NoopSink},
    source::EventSource,
    store::{LedgerStore, PointsStore, SubmissionStore, TotalsFn},
};
pub use types::{
    config::{ReconcileConfig, ScanConfig},
    event::{Attachment, SourceEvent},
    ledger::{CalendarMonth, LedgerRebuild, LedgerRow, LedgerTotals, RewardTier},
    report::{
        AmbassadorFailure, CandidateOutcome, LedgerCorrection, ReconcileReport, ScanDecision,
        ScanSummary,
    },
    submission::{
        NewSubmission, Reclassification, RecordOutcome, Submission, SubmissionContent,
        SubmissionFilter, SubmissionKind, ValidityStatus,
    },
};
