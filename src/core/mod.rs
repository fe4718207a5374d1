pub mod common;
pub mod config;
pub mod indexing;
pub mod performance;

pub use self::config::KdTreeConfig;
