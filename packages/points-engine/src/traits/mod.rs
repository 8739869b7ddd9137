pub mod policy;
pub mod sink;
pub mod source;
pub mod store;
