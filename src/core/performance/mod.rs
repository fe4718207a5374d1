//! Profiling for tree builds and searches

pub mod profiler;

pub use profiler::{Counter, KdProfile, Phase, ProfileSnapshot, ProfiledOperation};
