// src/core/indexing/kdtree/split.rs

//! Split strategies: decomposition (which direction to cut along), pivot
//! (where to cut) and the in-place partition of a node's object range.
//!
//! Strategies are plain functions selected by matching on the mode enums;
//! all direction fitting happens in weighted space (coordinates scaled by
//! `sqrt(weight)`) and is mapped back to a raw-coordinate plane so build,
//! insert and search all project with the same `SplitPlane`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::objects::ObjectStore;
use super::tree::SplitPlane;
use crate::core::performance::{Counter, KdProfile};

/// Power iterations used to estimate the principal component.
const PCA_POWER_ITERATIONS: usize = 24;

/// How the space of a node is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionMode {
    /// Orthogonal to the axis of maximum variance (fastest to build).
    #[default]
    Orthogonal,
    /// Arbitrary hyperplane through the two extreme poles of the node.
    Hyperplane,
    /// Orthogonal to the first principal component.
    Pca,
}

impl DecompositionMode {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Orthogonal => "orthogonal",
            Self::Hyperplane => "hyperplane",
            Self::Pca => "pca",
        }
    }
}

/// How the split threshold is picked along the chosen direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotMode {
    /// Mean of the projected values.
    Mean,
    /// Halfway between the smallest and largest projected value.
    Middle,
    /// Lower median of the projected values; gives balanced trees.
    #[default]
    Median,
}

impl PivotMode {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Middle => "middle",
            Self::Median => "median",
        }
    }
}

/// Inputs shared by every split of one build pass.
pub(crate) struct SplitParams<'a> {
    pub decomposition: DecompositionMode,
    pub pivot: PivotMode,
    /// `sqrt(weight)` per dimension, or all ones for an unweighted build.
    pub scale: &'a [f32],
    /// Dimensions with a non-zero scale.
    pub active: &'a [usize],
    pub profile: &'a KdProfile,
}

/// Reusable buffers so recursive splitting does not allocate per node.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    projections: Vec<f32>,
    select: Vec<f32>,
}

/// Chooses a split for `order` (one node's range), partitions it in place and
/// returns the plane with the split index, or `None` when the range cannot be
/// separated (all objects identical on every active dimension).
pub(crate) fn split_range(
    store: &ObjectStore,
    order: &mut [usize],
    depth: usize,
    params: &SplitParams<'_>,
    scratch: &mut Scratch,
) -> Option<(SplitPlane, usize)> {
    if order.len() < 2 || params.active.is_empty() {
        return None;
    }

    let primary = match params.decomposition {
        DecompositionMode::Orthogonal => max_variance_dim(store, order, params).map(Direction::Axis),
        DecompositionMode::Hyperplane => {
            params.profile.add(Counter::Planes, 1);
            pole_direction(store, order, params).map(Direction::Normal)
        }
        DecompositionMode::Pca => {
            params.profile.add(Counter::Planes, 1);
            principal_direction(store, order, params).map(Direction::Normal)
        }
    };

    if let Some(direction) = primary {
        project_all(store, order, &direction, &mut scratch.projections);
        if scratch.projections.iter().all(|p| p.is_finite()) {
            if let Some(pivot) = choose_pivot(&scratch.projections, params.pivot, &mut scratch.select, params.profile) {
                let split = partition(order, &mut scratch.projections, pivot);
                return Some((direction.into_plane(pivot), split));
            }
        }
        trace!(mode = params.decomposition.name(), len = order.len(), depth, "split direction degenerate, cycling axes");
    }

    // Fallback: cycle through the active axes starting at the depth.
    let n_active = params.active.len();
    for k in 0..n_active {
        let dim = params.active[(depth + k) % n_active];
        let direction = Direction::Axis(dim);
        project_all(store, order, &direction, &mut scratch.projections);
        if let Some(pivot) = choose_pivot(&scratch.projections, PivotMode::Mean, &mut scratch.select, params.profile) {
            let split = partition(order, &mut scratch.projections, pivot);
            return Some((direction.into_plane(pivot), split));
        }
    }
    None
}

enum Direction {
    Axis(usize),
    Normal(Vec<f32>),
}

impl Direction {
    fn into_plane(self, pivot: f32) -> SplitPlane {
        match self {
            Self::Axis(dim) => SplitPlane::Axis { dim, pivot },
            Self::Normal(normal) => SplitPlane::Hyperplane { normal: normal.into_boxed_slice(), pivot },
        }
    }

    fn project(&self, x: &[f32]) -> f32 {
        match self {
            Self::Axis(dim) => x[*dim],
            Self::Normal(normal) => {
                let mut sum = 0.0f32;
                for (i, &n) in normal.iter().enumerate() {
                    if n != 0.0 {
                        sum += n * x[i];
                    }
                }
                sum
            }
        }
    }
}

fn project_all(store: &ObjectStore, order: &[usize], direction: &Direction, out: &mut Vec<f32>) {
    out.clear();
    out.extend(order.iter().map(|&slot| direction.project(store.vector(slot))));
}

/// Picks a pivot that leaves both sides non-empty. Tries `mode` first and
/// falls back to the minimum projected value, which separates the range as
/// soon as the projections are not all equal.
fn choose_pivot(projections: &[f32], mode: PivotMode, select: &mut Vec<f32>, profile: &KdProfile) -> Option<f32> {
    profile.add(Counter::Pivots, 1);
    let n = projections.len();
    let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
    for &p in projections {
        min = min.min(p);
        max = max.max(p);
    }
    if !(min < max) {
        return None;
    }

    let candidate = match mode {
        PivotMode::Mean => {
            let sum: f64 = projections.iter().map(|&p| f64::from(p)).sum();
            (sum / n as f64) as f32
        }
        PivotMode::Middle => (f64::from(min) + (f64::from(max) - f64::from(min)) / 2.0) as f32,
        PivotMode::Median => {
            select.clear();
            select.extend_from_slice(projections);
            let mid = (n - 1) / 2;
            let (_, median, _) = select.select_nth_unstable_by(mid, f32::total_cmp);
            *median
        }
    };

    if candidate.is_finite() {
        let left = projections.iter().filter(|&&p| p <= candidate).count();
        if left > 0 && left < n {
            return Some(candidate);
        }
    }
    Some(min)
}

/// Two-pointer in-place partition: `<= pivot` first. Returns the split index.
pub(crate) fn partition(order: &mut [usize], projections: &mut [f32], pivot: f32) -> usize {
    let mut i = 0;
    let mut j = order.len();
    while i < j {
        if projections[i] <= pivot {
            i += 1;
        } else {
            j -= 1;
            order.swap(i, j);
            projections.swap(i, j);
        }
    }
    i
}

/// Active dimension with the largest weighted variance; ties go to the lowest
/// index. `None` if no dimension has a finite, positive variance.
fn max_variance_dim(store: &ObjectStore, order: &[usize], params: &SplitParams<'_>) -> Option<usize> {
    let n = order.len() as f64;
    let mut best: Option<(usize, f64)> = None;
    for &dim in params.active {
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for &slot in order {
            let x = f64::from(store.vector(slot)[dim]);
            sum += x;
            sum_sq += x * x;
        }
        let mean = sum / n;
        let scale = f64::from(params.scale[dim]);
        let var = (sum_sq / n - mean * mean).max(0.0) * scale * scale;
        if var.is_finite() && var > 0.0 && best.map_or(true, |(_, b)| var > b) {
            best = Some((dim, var));
        }
    }
    best.map(|(dim, _)| dim)
}

/// Mean of the range in weighted space (zeros on inactive dimensions).
fn weighted_mean(store: &ObjectStore, order: &[usize], params: &SplitParams<'_>) -> Vec<f64> {
    let mut mean = vec![0.0f64; params.scale.len()];
    for &slot in order {
        let v = store.vector(slot);
        for &d in params.active {
            mean[d] += f64::from(v[d] * params.scale[d]);
        }
    }
    let n = order.len() as f64;
    mean.iter_mut().for_each(|m| *m /= n);
    mean
}

fn weighted_dist_sq(v: &[f32], to: &[f64], params: &SplitParams<'_>) -> f64 {
    params
        .active
        .iter()
        .map(|&d| {
            let diff = f64::from(v[d] * params.scale[d]) - to[d];
            diff * diff
        })
        .sum()
}

/// Two-pole direction: `l` is the object farthest from the mean, `r` the one
/// farthest from `l`; the normal points from `l` to `r`.
fn pole_direction(store: &ObjectStore, order: &[usize], params: &SplitParams<'_>) -> Option<Vec<f32>> {
    let mean = weighted_mean(store, order, params);
    let left_pole = farthest(store, order, &mean, params)?;
    let left: Vec<f64> = store
        .vector(left_pole)
        .iter()
        .zip(params.scale)
        .map(|(&x, &s)| if s == 0.0 { 0.0 } else { f64::from(x * s) })
        .collect();
    let right_pole = farthest(store, order, &left, params)?;
    let right = store.vector(right_pole);

    let mut normal = vec![0.0f64; params.scale.len()];
    for &d in params.active {
        normal[d] = f64::from(right[d] * params.scale[d]) - left[d];
    }
    to_raw_normal(&normal, params)
}

fn farthest(store: &ObjectStore, order: &[usize], from: &[f64], params: &SplitParams<'_>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &slot in order {
        let d = weighted_dist_sq(store.vector(slot), from, params);
        if d.is_finite() && best.map_or(true, |(_, b)| d > b) {
            best = Some((slot, d));
        }
    }
    best.map(|(slot, _)| slot)
}

/// First principal component of the range by power iteration, started along
/// the axis of maximum variance so the result is deterministic.
fn principal_direction(store: &ObjectStore, order: &[usize], params: &SplitParams<'_>) -> Option<Vec<f32>> {
    let start_dim = max_variance_dim(store, order, params)?;
    let mean = weighted_mean(store, order, params);
    let dim = params.scale.len();

    let mut v = vec![0.0f64; dim];
    v[start_dim] = 1.0;
    let mut centered = vec![0.0f64; dim];
    for _ in 0..PCA_POWER_ITERATIONS {
        let mut next = vec![0.0f64; dim];
        for &slot in order {
            let x = store.vector(slot);
            let mut dot = 0.0f64;
            for &d in params.active {
                centered[d] = f64::from(x[d] * params.scale[d]) - mean[d];
                dot += centered[d] * v[d];
            }
            for &d in params.active {
                next[d] += dot * centered[d];
            }
        }
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if !(norm > 0.0 && norm.is_finite()) {
            break;
        }
        next.iter_mut().for_each(|x| *x /= norm);
        v = next;
    }
    to_raw_normal(&v, params)
}

/// Maps a weighted-space direction `u` to the raw-coordinate normal
/// `n_i = u_i * scale_i`, normalised to unit length.
fn to_raw_normal(weighted: &[f64], params: &SplitParams<'_>) -> Option<Vec<f32>> {
    let raw: Vec<f64> = weighted.iter().zip(params.scale).map(|(&u, &s)| u * f64::from(s)).collect();
    let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !(norm > 0.0 && norm.is_finite()) {
        return None;
    }
    Some(raw.iter().map(|x| (x / norm) as f32).collect())
}
