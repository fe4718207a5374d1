// src/core/indexing/kdtree/objects.rs

//! The Object Store: flat table of feature vectors and their identifiers.
//!
//! Vectors live in row-major slots that are appended to between full
//! rebuilds. Tree nodes never point at slots directly; they reference
//! contiguous ranges of the `order` permutation, which is what the Build
//! Engine rearranges in place. Removed slots are reclaimed once they
//! outnumber the live ones or the store reaches its capacity; reclaiming
//! renumbers slots but leaves every `order` position where it was.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::common::KdTreeError;

/// External identifier of a stored object.
pub type ObjectId = u64;

/// Per-dimension statistics over the live objects, refreshed on every full
/// build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    /// Number of objects the statistics were computed from.
    pub count: usize,
    pub mean: Vec<f32>,
    /// Population standard deviation.
    pub sigma: Vec<f32>,
}

impl DimensionStats {
    /// Number of dimensions with non-zero spread.
    pub fn nonzero_sigma_count(&self) -> usize {
        self.sigma.iter().filter(|s| **s != 0.0).count()
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    dimension: usize,
    capacity: usize,
    data: Vec<f32>,
    ids: Vec<ObjectId>,
    live: Vec<bool>,
    slots: HashMap<ObjectId, usize>,
    live_count: usize,
    /// Permutation of live slots; node ranges index into this.
    order: Vec<usize>,
}

impl ObjectStore {
    pub fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            capacity,
            data: Vec::new(),
            ids: Vec::new(),
            live: Vec::new(),
            slots: HashMap::new(),
            live_count: 0,
            order: Vec::new(),
        }
    }

    /// Replaces the whole store with `ids.len()` row-major vectors from `rows`.
    ///
    /// Validation happens before anything is replaced.
    pub fn set_rows(&mut self, rows: &[f32], ids: &[ObjectId]) -> Result<(), KdTreeError> {
        let expected_len = ids.len().checked_mul(self.dimension).ok_or_else(|| {
            KdTreeError::invalid(format!("{} objects overflow the data buffer", ids.len()))
        })?;
        if rows.len() != expected_len {
            return Err(KdTreeError::invalid(format!(
                "expected {} values for {} objects of dimension {}, got {}",
                expected_len,
                ids.len(),
                self.dimension,
                rows.len()
            )));
        }
        if ids.len() > self.capacity {
            return Err(KdTreeError::CapacityExceeded { capacity: self.capacity });
        }
        check_values(rows)?;

        let mut slots = HashMap::with_capacity(ids.len());
        for (slot, &id) in ids.iter().enumerate() {
            if slots.insert(id, slot).is_some() {
                return Err(KdTreeError::DuplicateId(id));
            }
        }

        self.data = rows.to_vec();
        self.ids = ids.to_vec();
        self.live = vec![true; ids.len()];
        self.slots = slots;
        self.live_count = ids.len();
        self.order = (0..ids.len()).collect();
        Ok(())
    }

    /// Checks that `vector` could be pushed under `id` without mutating anything.
    pub fn check_insert(&self, id: ObjectId, vector: &[f32]) -> Result<(), KdTreeError> {
        if vector.len() != self.dimension {
            return Err(KdTreeError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.slots.contains_key(&id) {
            return Err(KdTreeError::DuplicateId(id));
        }
        if self.live_count >= self.capacity {
            return Err(KdTreeError::CapacityExceeded { capacity: self.capacity });
        }
        check_values(vector)
    }

    /// Appends a new slot and returns its index. The slot is not placed in
    /// `order`; that is the caller's job.
    pub fn push(&mut self, id: ObjectId, vector: &[f32]) -> Result<usize, KdTreeError> {
        self.check_insert(id, vector)?;
        if self.ids.len() >= self.capacity {
            self.reclaim();
        }
        let slot = self.ids.len();
        self.data.extend_from_slice(vector);
        self.ids.push(id);
        self.live.push(true);
        self.slots.insert(id, slot);
        self.live_count += 1;
        Ok(slot)
    }

    /// Marks `id` as removed and returns its former slot. The caller must
    /// already have taken the slot out of `order`.
    ///
    /// The returned slot number is only meaningful until the next removal or
    /// push, since either may reclaim dead slots.
    pub fn mark_removed(&mut self, id: ObjectId) -> Result<usize, KdTreeError> {
        let slot = self.slots.remove(&id).ok_or(KdTreeError::NotFound(id))?;
        self.live[slot] = false;
        self.live_count -= 1;
        if self.ids.len() - self.live_count > self.live_count {
            self.reclaim();
        }
        Ok(slot)
    }

    pub fn slot_of(&self, id: ObjectId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    #[inline]
    pub fn vector(&self, slot: usize) -> &[f32] {
        let start = slot * self.dimension;
        &self.data[start..start + self.dimension]
    }

    #[inline]
    pub fn id(&self, slot: usize) -> ObjectId {
        self.ids[slot]
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Number of slots including removed ones awaiting compaction.
    pub fn slot_count(&self) -> usize {
        self.ids.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn order_mut(&mut self) -> &mut Vec<usize> {
        &mut self.order
    }

    /// Iterates live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &[f32])> + '_ {
        (0..self.ids.len()).filter(|&s| self.live[s]).map(move |s| (self.ids[s], self.vector(s)))
    }

    /// Drops removed slots, keeping live slots in their relative order, and
    /// resets `order` to the identity.
    pub fn compact(&mut self) {
        self.reclaim();
        self.reset_order();
    }

    /// Drops removed slots and renumbers the live ones in their relative
    /// order. `order` keeps its length and positions; only the slot numbers
    /// in it change, so node ranges stay valid.
    pub(crate) fn reclaim(&mut self) {
        let dead = self.ids.len() - self.live_count;
        if dead == 0 {
            return;
        }
        let dim = self.dimension;
        let mut remap = vec![usize::MAX; self.ids.len()];
        let mut data = Vec::with_capacity(self.live_count * dim);
        let mut ids = Vec::with_capacity(self.live_count);
        for slot in (0..self.ids.len()).filter(|&s| self.live[s]) {
            remap[slot] = ids.len();
            data.extend_from_slice(&self.data[slot * dim..(slot + 1) * dim]);
            ids.push(self.ids[slot]);
        }
        for slot in &mut self.order {
            *slot = remap[*slot];
        }
        self.slots = ids.iter().enumerate().map(|(slot, &id)| (id, slot)).collect();
        self.live = vec![true; ids.len()];
        self.data = data;
        self.ids = ids;
        trace!(dead, live = self.live_count, "reclaimed removed slots");
    }

    /// Resets `order` to the live slots in ascending order.
    pub fn reset_order(&mut self) {
        let live = &self.live;
        self.order = (0..live.len()).filter(|&s| live[s]).collect();
    }

    /// Mean and standard deviation of every dimension over live objects.
    pub fn compute_stats(&self) -> DimensionStats {
        let dim = self.dimension;
        let n = self.live_count;
        let mut sum = vec![0.0f64; dim];
        let mut sum_sq = vec![0.0f64; dim];
        for (_, v) in self.iter() {
            for (j, &x) in v.iter().enumerate() {
                let x = f64::from(x);
                sum[j] += x;
                sum_sq[j] += x * x;
            }
        }
        if n == 0 {
            return DimensionStats { count: 0, mean: vec![0.0; dim], sigma: vec![0.0; dim] };
        }
        let count = n as f64;
        let mut mean = Vec::with_capacity(dim);
        let mut sigma = Vec::with_capacity(dim);
        for j in 0..dim {
            let m = sum[j] / count;
            let var = (sum_sq[j] / count - m * m).max(0.0);
            mean.push(m as f32);
            sigma.push(var.sqrt() as f32);
        }
        DimensionStats { count: n, mean, sigma }
    }
}

fn check_values(values: &[f32]) -> Result<(), KdTreeError> {
    if let Some(i) = values.iter().position(|x| x.is_nan()) {
        return Err(KdTreeError::invalid(format!("value at position {i} is NaN")));
    }
    Ok(())
}
