pub mod config;
pub mod kernel;

pub use config::Config;
