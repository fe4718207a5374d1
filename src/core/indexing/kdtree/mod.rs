// src/core/indexing/kdtree/mod.rs

//! KD-Tree implementation for nearest-neighbour search over feature vectors.
//!
//! [`KdTree`] owns three pieces: the Object Store (vectors and identifiers),
//! the Node Store (a flat array of split descriptors and leaf ranges) and a
//! profile of build and search work. Construction is a bulk operation; after
//! that the tree accepts inserts and deletes, repairing itself locally and
//! rebuilding in full when told to (or when the configured drift threshold
//! is reached).

mod builder;
mod distance;
mod maintenance;
mod objects;
mod search;
mod split;
mod tree;
mod weights;


pub use self::builder::BuildSummary;
pub use self::distance::{
    euclidean_sq, euclidean_sq_strided, weighted_euclidean_sq, weighted_euclidean_sq_strided,
    DistanceFunction,
};
pub use self::objects::{DimensionStats, ObjectId};
pub use self::split::{DecompositionMode, PivotMode};
pub use self::tree::{KdNode, NodeId, NodeKind, SplitPlane};
pub use self::weights::Weights;

use self::builder::BuildParams;
use self::objects::ObjectStore;
use self::search::{KnnQuery, SearchContext};
use self::tree::NodeStore;
use crate::core::common::KdTreeError;
use crate::core::config::KdTreeConfig;
use crate::core::performance::{KdProfile, ProfileSnapshot};

/// A k-d tree over fixed-dimension `f32` vectors.
///
/// Search takes `&self` and only touches atomic profile counters, so a built
/// tree can be shared across threads behind an `Arc` (or an `RwLock` when it
/// is also mutated).
#[derive(Debug)]
pub struct KdTree {
    config: KdTreeConfig,
    store: ObjectStore,
    nodes: NodeStore,
    weights: Option<Weights>,
    stats: DimensionStats,
    profile: KdProfile,
    is_built: bool,
    drift: usize,
}

impl KdTree {
    /// Creates an empty, unbuilt tree.
    pub fn new(config: KdTreeConfig) -> Result<Self, KdTreeError> {
        config.validate()?;
        Ok(Self {
            store: ObjectStore::new(config.dimension, config.capacity),
            nodes: NodeStore::new(),
            weights: None,
            stats: DimensionStats::default(),
            profile: KdProfile::new(),
            is_built: false,
            drift: 0,
            config,
        })
    }

    /// Creates an empty tree with the default configuration for `dimension`.
    pub fn with_dimension(dimension: usize) -> Result<Self, KdTreeError> {
        Self::new(KdTreeConfig::with_dimension(dimension)?)
    }

    /// Replaces every stored object with `ids.len()` row-major vectors taken
    /// from `rows`. The tree is marked unbuilt until [`KdTree::build`].
    ///
    /// Nothing changes if validation fails.
    pub fn set_data(&mut self, rows: &[f32], ids: &[ObjectId]) -> Result<(), KdTreeError> {
        self.store.set_rows(rows, ids)?;
        self.nodes.clear();
        self.is_built = false;
        self.drift = 0;
        Ok(())
    }

    /// Like [`KdTree::set_data`], from `(id, vector)` pairs.
    pub fn set_objects(&mut self, objects: Vec<(ObjectId, Vec<f32>)>) -> Result<(), KdTreeError> {
        let dimension = self.dimension();
        let mut rows = Vec::with_capacity(objects.len() * dimension);
        let mut ids = Vec::with_capacity(objects.len());
        for (id, vector) in objects {
            if vector.len() != dimension {
                return Err(KdTreeError::DimensionMismatch { expected: dimension, actual: vector.len() });
            }
            rows.extend_from_slice(&vector);
            ids.push(id);
        }
        self.set_data(&rows, &ids)
    }

    /// Sets the data and builds the tree over it.
    pub fn load(&mut self, rows: &[f32], ids: &[ObjectId]) -> Result<BuildSummary, KdTreeError> {
        self.set_data(rows, ids)?;
        self.build()
    }

    /// Builds the tree from scratch over the live objects.
    ///
    /// Removed objects are compacted away and the per-dimension statistics
    /// are refreshed. Resets the drift counter.
    pub fn build(&mut self) -> Result<BuildSummary, KdTreeError> {
        let params = self.build_params();
        let summary = builder::build_full(&mut self.store, &mut self.nodes, &params, &self.profile);
        self.stats = self.store.compute_stats();
        self.is_built = true;
        self.drift = 0;
        Ok(summary)
    }

    /// Returns the `k` nearest objects to `query` as `(id, distance)` pairs
    /// sorted by ascending distance. Fewer are returned when the tree holds
    /// fewer than `k` objects.
    pub fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<(ObjectId, f32)>, KdTreeError> {
        self.knn(query, 1, k, None)
    }

    /// Like [`KdTree::search_knn`], ignoring objects farther than `max_distance`.
    pub fn search_knn_within(
        &self,
        query: &[f32],
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<(ObjectId, f32)>, KdTreeError> {
        if max_distance.is_nan() || max_distance < 0.0 {
            return Err(KdTreeError::invalid(format!(
                "max_distance must be a non-negative number, got {}",
                max_distance
            )));
        }
        self.knn(query, 1, k, Some(max_distance * max_distance))
    }

    /// Like [`KdTree::search_knn`] with the query read from every `stride`-th
    /// element of `query`, e.g. one frame of an interleaved buffer.
    pub fn search_knn_strided(
        &self,
        query: &[f32],
        stride: usize,
        k: usize,
    ) -> Result<Vec<(ObjectId, f32)>, KdTreeError> {
        if stride == 0 {
            return Err(KdTreeError::invalid("stride must be at least 1"));
        }
        self.knn(query, stride, k, None)
    }

    fn knn(
        &self,
        query: &[f32],
        stride: usize,
        k: usize,
        max_distance_sq: Option<f32>,
    ) -> Result<Vec<(ObjectId, f32)>, KdTreeError> {
        if !self.is_built {
            return Err(KdTreeError::NotBuilt);
        }
        if k == 0 {
            return Err(KdTreeError::invalid("k must be at least 1"));
        }
        let dimension = self.dimension();
        let needed = (dimension - 1)
            .checked_mul(stride)
            .map(|n| n + 1)
            .ok_or_else(|| KdTreeError::invalid(format!("stride {} is too large", stride)))?;
        // a strided query may carry trailing elements of its buffer
        let fits = if stride == 1 { query.len() == needed } else { query.len() >= needed };
        if !fits {
            return Err(KdTreeError::DimensionMismatch { expected: needed, actual: query.len() });
        }
        if (0..dimension).any(|i| query[i * stride].is_nan()) {
            return Err(KdTreeError::invalid("query contains NaN"));
        }

        let ctx = self.search_context();
        let q = KnnQuery { query, stride, k, max_distance_sq };
        Ok(search::find_knn(&ctx, &q)
            .into_iter()
            .map(|(slot, distance_sq)| (self.store.id(slot), distance_sq.sqrt()))
            .collect())
    }

    fn search_context(&self) -> SearchContext<'_> {
        SearchContext {
            store: &self.store,
            nodes: &self.nodes,
            distance: self.distance_function(),
            weights: self.weights.as_ref(),
            profile: &self.profile,
        }
    }

    pub(crate) fn build_params(&self) -> BuildParams {
        let weights = if self.config.weighted_build { self.weights.as_ref() } else { None };
        BuildParams::new(
            self.config.dimension,
            self.config.decomposition,
            self.config.pivot,
            self.config.max_leaf_size,
            self.config.max_depth,
            weights,
        )
    }

    // Settings

    pub fn set_decomposition(&mut self, mode: DecompositionMode) -> Result<(), KdTreeError> {
        self.config.decomposition = mode;
        self.settings_changed()
    }

    pub fn set_pivot(&mut self, mode: PivotMode) -> Result<(), KdTreeError> {
        self.config.pivot = mode;
        self.settings_changed()
    }

    /// Sets per-dimension standard deviations; distances then weigh dimension
    /// `i` by `1 / sigma[i]^2` and dimensions with zero sigma are ignored.
    ///
    /// Search uses the new weights at once. Splits pick them up on the next
    /// build.
    pub fn set_sigma(&mut self, sigma: &[f32]) -> Result<(), KdTreeError> {
        if sigma.len() != self.dimension() {
            return Err(KdTreeError::DimensionMismatch { expected: self.dimension(), actual: sigma.len() });
        }
        self.weights = Some(Weights::from_sigma(sigma)?);
        self.settings_changed()
    }

    /// Returns to plain Euclidean distance.
    pub fn clear_sigma(&mut self) -> Result<(), KdTreeError> {
        self.weights = None;
        self.settings_changed()
    }

    /// Uses the sigma of the current data (see [`KdTree::stats`]) as weights,
    /// which normalises every dimension to unit spread.
    pub fn set_sigma_from_stats(&mut self) -> Result<(), KdTreeError> {
        if !self.is_built {
            return Err(KdTreeError::NotBuilt);
        }
        let sigma = self.stats.sigma.clone();
        self.set_sigma(&sigma)
    }

    pub fn set_max_leaf_size(&mut self, max_leaf_size: usize) -> Result<(), KdTreeError> {
        if max_leaf_size == 0 {
            return Err(KdTreeError::invalid("max_leaf_size must be greater than 0"));
        }
        self.config.max_leaf_size = max_leaf_size;
        self.settings_changed()
    }

    /// `None` disables automatic rebuilding.
    pub fn set_rebuild_threshold(&mut self, threshold: Option<usize>) -> Result<(), KdTreeError> {
        if threshold == Some(0) {
            return Err(KdTreeError::invalid("rebuild threshold must be greater than 0"));
        }
        self.config.rebuild_threshold = threshold;
        if self.is_built {
            self.rebuild_if_drifted()?;
        }
        Ok(())
    }

    fn settings_changed(&mut self) -> Result<(), KdTreeError> {
        if self.is_built && self.config.rebuild_on_settings_change {
            self.rebuild()?;
        }
        Ok(())
    }

    // Profiling

    pub fn profile(&self) -> ProfileSnapshot {
        self.profile.snapshot()
    }

    pub fn clear_profile(&self) {
        self.profile.clear();
    }

    // Accessors

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.is_built
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn config(&self) -> &KdTreeConfig {
        &self.config
    }

    pub fn decomposition(&self) -> DecompositionMode {
        self.config.decomposition
    }

    pub fn pivot(&self) -> PivotMode {
        self.config.pivot
    }

    /// The Node Store; the root is at index 0.
    pub fn nodes(&self) -> &[KdNode] {
        self.nodes.nodes()
    }

    pub fn node(&self, id: NodeId) -> Option<&KdNode> {
        self.nodes.get(id)
    }

    /// Vector stored under `id`, if it is live.
    pub fn object(&self, id: ObjectId) -> Option<&[f32]> {
        self.store.slot_of(id).map(|slot| self.store.vector(slot))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.store.slot_of(id).is_some()
    }

    /// Ids of the objects below `node`, in tree order.
    pub fn ordered_ids(&self, node: NodeId) -> Option<Vec<ObjectId>> {
        let node = self.nodes.get(node)?;
        let order = self.store.order();
        Some(order[node.range()].iter().map(|&slot| self.store.id(slot)).collect())
    }

    /// Live objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &[f32])> + '_ {
        self.store.iter()
    }

    /// Largest node depth; 0 for a tree that is a single leaf.
    pub fn height(&self) -> usize {
        self.nodes.height()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.leaf_count()
    }

    /// Node ids of every leaf, left to right.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes.leaves()
    }

    /// Per-dimension statistics as of the last full build.
    pub fn stats(&self) -> &DimensionStats {
        &self.stats
    }

    pub fn weights(&self) -> Option<&Weights> {
        self.weights.as_ref()
    }

    /// Distance function search currently uses.
    pub fn distance_function(&self) -> DistanceFunction {
        if self.weights.is_some() {
            DistanceFunction::WeightedEuclidean
        } else {
            DistanceFunction::Euclidean
        }
    }

    /// Inserts and deletes since the last full build.
    pub fn drift(&self) -> usize {
        self.drift
    }
}
