// src/core/indexing/kdtree/maintenance.rs

//! Incremental maintenance: inserts and deletes that keep the tree valid
//! without a full rebuild, plus the drift bookkeeping that decides when a
//! full rebuild is due.
//!
//! Split planes are never moved by maintenance. An inserted object follows
//! the same `<= pivot` rule the build used, so every object stays inside the
//! region its leaf describes and search remains exact; the tree only loses
//! balance, which the next full rebuild restores.

use tracing::debug;

use super::builder::{self, BuildSummary};
use super::tree::{NodeId, NodeKind};
use super::{KdTree, ObjectId};
use crate::core::common::KdTreeError;

impl KdTree {
    /// Inserts `vector` under `id`.
    ///
    /// The object is appended to the leaf its position descends to. A leaf
    /// that grows past `max_leaf_size` is rebuilt on the spot into a subtree.
    ///
    /// # Errors
    ///
    /// `NotBuilt`, `DimensionMismatch`, `DuplicateId`, `CapacityExceeded` or
    /// `InvalidArgument` for NaN values. The tree is unchanged on error.
    pub fn insert(&mut self, id: ObjectId, vector: &[f32]) -> Result<(), KdTreeError> {
        if !self.is_built {
            return Err(KdTreeError::NotBuilt);
        }
        self.store.check_insert(id, vector)?;

        let path = self.descend(vector);
        let leaf = *path.last().ok_or(KdTreeError::NotBuilt)?;
        let pos = self.nodes.get(leaf).map_or(0, |node| node.end);

        let slot = self.store.push(id, vector)?;
        self.store.order_mut().insert(pos, slot);
        self.nodes.shift_after_insert(&path, pos);

        if let Some(node) = self.nodes.get(leaf) {
            if node.len() > self.config.max_leaf_size && node.depth < self.config.max_depth {
                let params = self.build_params();
                builder::rebuild_leaf(&mut self.store, &mut self.nodes, leaf, &params, &self.profile);
            }
        }

        self.drift += 1;
        self.rebuild_if_drifted()
    }

    /// Removes the object stored under `id`.
    ///
    /// # Errors
    ///
    /// `NotBuilt` or `NotFound`.
    pub fn delete(&mut self, id: ObjectId) -> Result<(), KdTreeError> {
        if !self.is_built {
            return Err(KdTreeError::NotBuilt);
        }
        let slot = self.store.slot_of(id).ok_or(KdTreeError::NotFound(id))?;

        let mut path = self.descend(self.store.vector(slot));
        let order = self.store.order();
        let found = path
            .last()
            .and_then(|&leaf| self.nodes.get(leaf))
            .and_then(|node| node.range().find(|&p| order[p] == slot));
        let pos = match found {
            Some(pos) => pos,
            None => {
                // not where descent says it is; look everywhere
                let pos = order.iter().position(|&s| s == slot).ok_or(KdTreeError::NotFound(id))?;
                path = self.path_to_position(pos);
                pos
            }
        };

        self.store.order_mut().remove(pos);
        self.nodes.shift_after_remove(&path, pos);
        self.store.mark_removed(id)?;

        self.drift += 1;
        self.rebuild_if_drifted()
    }

    /// Moves the object `id` to `vector`. Counts as one delete plus one insert.
    ///
    /// # Errors
    ///
    /// `NotBuilt`, `NotFound`, `DimensionMismatch` or `InvalidArgument`; the
    /// tree is unchanged on error.
    pub fn update(&mut self, id: ObjectId, vector: &[f32]) -> Result<(), KdTreeError> {
        if !self.is_built {
            return Err(KdTreeError::NotBuilt);
        }
        if vector.len() != self.dimension() {
            return Err(KdTreeError::DimensionMismatch { expected: self.dimension(), actual: vector.len() });
        }
        if vector.iter().any(|v| v.is_nan()) {
            return Err(KdTreeError::invalid("vector contains NaN"));
        }
        if !self.contains(id) {
            return Err(KdTreeError::NotFound(id));
        }
        self.delete(id)?;
        self.insert(id, vector)
    }

    /// Discards the Node Store and builds it again over the current objects.
    pub fn rebuild(&mut self) -> Result<BuildSummary, KdTreeError> {
        self.build()
    }

    /// Runs a full rebuild when drift has reached the configured threshold.
    pub(crate) fn rebuild_if_drifted(&mut self) -> Result<(), KdTreeError> {
        match self.config.rebuild_threshold {
            Some(threshold) if self.drift >= threshold => {
                debug!(drift = self.drift, threshold, objects = self.len(), "drift threshold reached, rebuilding");
                self.rebuild().map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Node ids from the root to the leaf `vector` descends to.
    fn descend(&self, vector: &[f32]) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.nodes.height() + 1);
        let mut current = 0;
        while let Some(node) = self.nodes.get(current) {
            path.push(current);
            match &node.kind {
                NodeKind::Leaf => break,
                NodeKind::Internal { split, left, right } => {
                    current = if split.goes_left(vector) { *left } else { *right };
                }
            }
        }
        path
    }

    /// Node ids from the root to the leaf whose range holds `pos`.
    fn path_to_position(&self, pos: usize) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = 0;
        while let Some(node) = self.nodes.get(current) {
            path.push(current);
            match &node.kind {
                NodeKind::Leaf => break,
                NodeKind::Internal { left, right, .. } => {
                    let in_left = self.nodes.get(*left).is_some_and(|l| l.range().contains(&pos));
                    current = if in_left { *left } else { *right };
                }
            }
        }
        path
    }
}
