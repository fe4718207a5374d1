#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::cast_possible_wrap)]
#![forbid(unsafe_code)]
#![deny(clippy::todo, clippy::module_inception, clippy::wildcard_imports, clippy::correctness)]
#![warn(clippy::perf, clippy::style, clippy::complexity, clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # Oxikd: a k-d tree for nearest-neighbour search
//!
//! `oxikd` indexes fixed-dimension `f32` feature vectors for exact
//! k-nearest-neighbour queries. It features:
//! - Orthogonal, two-pole hyperplane and principal-component splits
//! - Mean, midpoint and median pivots
//! - Optional per-dimension weighting by `1 / sigma^2`
//! - Best-first branch-and-bound search with an explicit priority stack
//! - Incremental insert and delete with local leaf repair, and full rebuilds
//!   on request or after a configurable amount of drift
//! - Build and search profiling counters
//!
//! ```
//! use oxikd::{KdTree, KdTreeConfig};
//!
//! let config = KdTreeConfig::builder().dimension(2).max_leaf_size(2).build()?;
//! let mut tree = KdTree::new(config)?;
//! tree.load(&[0.0, 0.0, 1.0, 1.0, 5.0, 5.0], &[10, 11, 12])?;
//!
//! let nearest = tree.search_knn(&[0.9, 1.2], 1)?;
//! assert_eq!(nearest[0].0, 11);
//! # Ok::<(), oxikd::KdTreeError>(())
//! ```
//!
//! The library logs through `tracing` and installs no subscriber.

pub mod core;

// Re-export key types for easier use by library consumers
pub use crate::core::common::{ErrorKind, KdTreeError};
pub use crate::core::config::{KdTreeConfig, KdTreeConfigBuilder};
pub use crate::core::indexing::kdtree::{
    BuildSummary, DecompositionMode, DimensionStats, DistanceFunction, KdNode, KdTree, NodeId,
    NodeKind, ObjectId, PivotMode, SplitPlane, Weights,
};
pub use crate::core::indexing::VectorIndex;
pub use crate::core::performance::ProfileSnapshot;

/// Core result type for the library
pub type Result<T> = std::result::Result<T, KdTreeError>;
