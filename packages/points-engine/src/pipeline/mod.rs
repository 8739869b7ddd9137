//! Scan and reconciliation pipeline - the core of the engine.
//!
//! The pipeline orchestrates:
//! - Window scans (fetch → classify → fingerprint → record)
//! - The duplicate sweep over fingerprint groups
//! - Ledger totals and standing
//! - Reconciliation passes that overwrite the ledger

pub mod reconcile;
pub mod scan;
pub mod standing;
pub mod sweep;

pub use reconcile::reconcile;
pub use scan::scan_window;
pub use standing::{calculate_totals, consecutive_months};
pub use sweep::plan_duplicate_sweep;
