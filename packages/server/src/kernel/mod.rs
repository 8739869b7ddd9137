pub mod deps;
pub mod event_feed;
pub mod log_sink;
pub mod scheduled_tasks;

pub use deps::{build_engine, PointsEngine};
pub use event_feed::JsonLinesSource;
pub use log_sink::LogSink;
pub use scheduled_tasks::{start_scheduler, RunGuard};
