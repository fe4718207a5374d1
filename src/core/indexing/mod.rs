// src/core/indexing/mod.rs

use crate::core::common::KdTreeError;
use std::fmt::Debug;

pub mod kdtree;

use self::kdtree::{KdTree, ObjectId};

/// Trait for vector indexes capable of similarity search.
pub trait VectorIndex: Debug + Send + Sync {
    /// Returns the name of the index.
    fn name(&self) -> &str;

    /// Returns the dimension of vectors this index handles.
    fn dimension(&self) -> usize;

    /// Inserts a vector under `id`.
    fn insert(&mut self, id: ObjectId, vector: &[f32]) -> Result<(), KdTreeError>;

    /// Deletes the vector stored under `id`.
    fn delete(&mut self, id: ObjectId) -> Result<(), KdTreeError>;

    /// Performs a K-Nearest Neighbor search.
    /// Returns a list of (id, distance) tuples, nearest first.
    fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<(ObjectId, f32)>, KdTreeError>;

    /// Builds or rebuilds the index from all current data.
    fn build(&mut self) -> Result<(), KdTreeError>;
}

impl VectorIndex for KdTree {
    fn name(&self) -> &str {
        &self.config().name
    }

    fn dimension(&self) -> usize {
        Self::dimension(self)
    }

    fn insert(&mut self, id: ObjectId, vector: &[f32]) -> Result<(), KdTreeError> {
        Self::insert(self, id, vector)
    }

    fn delete(&mut self, id: ObjectId) -> Result<(), KdTreeError> {
        Self::delete(self, id)
    }

    fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<(ObjectId, f32)>, KdTreeError> {
        Self::search_knn(self, query, k)
    }

    fn build(&mut self) -> Result<(), KdTreeError> {
        Self::build(self).map(|_| ())
    }
}
