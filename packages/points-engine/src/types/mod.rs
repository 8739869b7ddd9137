pub mod config;
pub mod event;
pub mod ledger;
pub mod report;
pub mod submission;
