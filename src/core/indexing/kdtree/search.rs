// src/core/indexing/kdtree/search.rs

//! Logic for performing K-Nearest Neighbor (KNN) search in a KD-Tree.
//!
//! Branch-and-bound, best-first: pending subtrees sit in a min-priority
//! stack keyed by the smallest distance the query could have to anything in
//! them, and the search stops as soon as that bound cannot beat the current
//! k-th best distance. No recursion, so stack depth does not depend on tree
//! height.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::distance::{axis_distance_sq, plane_distance_sq, DistanceFunction};
use super::objects::ObjectStore;
use super::tree::{NodeId, NodeKind, NodeStore, SplitPlane};
use super::weights::Weights;
use crate::core::performance::{Counter, KdProfile, Phase, ProfiledOperation};

/// Relative shrink applied to hyperplane bounds on top of the absolute
/// [`SplitPlane::rounding_margin`]; covers rounding in the normal's length
/// and in the distance sums the bound is compared against.
const HYPERPLANE_BOUND_SLACK: f32 = 0.999_9;

/// Entry of the bounded result set. Ordered by `(distance_sq, slot)` so the
/// max-heap keeps the current worst neighbour on top and equal distances
/// are resolved in favour of the earlier-inserted object.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Neighbor {
    distance_sq: f32,
    slot: usize,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq.total_cmp(&other.distance_sq).then(self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Search stack element: a subtree and the minimum possible distance from the
/// query to its region.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingNode {
    node: NodeId,
    min_distance_sq: f32,
}

impl Eq for PendingNode {}

impl Ord for PendingNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour (smallest bound first)
        other
            .min_distance_sq
            .total_cmp(&self.min_distance_sq)
            .then(other.node.cmp(&self.node))
    }
}

impl PartialOrd for PendingNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One k-NN query. `query` is read every `stride` elements.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KnnQuery<'a> {
    pub query: &'a [f32],
    pub stride: usize,
    pub k: usize,
    /// Squared radius limit; `None` means unlimited.
    pub max_distance_sq: Option<f32>,
}

/// Read-only view of everything a search needs.
pub(crate) struct SearchContext<'a> {
    pub store: &'a ObjectStore,
    pub nodes: &'a NodeStore,
    pub distance: DistanceFunction,
    pub weights: Option<&'a Weights>,
    pub profile: &'a KdProfile,
}

/// Returns up to `k` `(slot, squared distance)` pairs sorted by ascending
/// distance, ties by slot.
pub(crate) fn find_knn(ctx: &SearchContext<'_>, q: &KnnQuery<'_>) -> Vec<(usize, f32)> {
    let op = ProfiledOperation::start(Phase::Search);
    if ctx.nodes.root().map_or(true, |root| root.is_empty()) || q.k == 0 {
        ctx.profile.add(Counter::Searches, 1);
        op.complete(ctx.profile);
        return Vec::new();
    }

    let radius = q.max_distance_sq.unwrap_or(f32::INFINITY);
    let bound_weights = match ctx.distance {
        DistanceFunction::WeightedEuclidean => ctx.weights,
        DistanceFunction::Euclidean => None,
    };
    let order = ctx.store.order();

    let mut results: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(q.k + 1);
    let mut stack: BinaryHeap<PendingNode> = BinaryHeap::new();
    stack.push(PendingNode { node: 0, min_distance_sq: 0.0 });

    let (mut v2v, mut v2n, mut visited, mut leaves, mut max_stack) = (0u64, 0u64, 0u64, 0u64, 1usize);

    while let Some(PendingNode { node, min_distance_sq }) = stack.pop() {
        if min_distance_sq > radius {
            break;
        }
        if results.len() == q.k && results.peek().is_some_and(|worst| min_distance_sq > worst.distance_sq) {
            break;
        }
        visited += 1;

        let Some(current) = ctx.nodes.get(node) else {
            continue;
        };
        match &current.kind {
            NodeKind::Leaf => {
                leaves += 1;
                for &slot in &order[current.range()] {
                    let d = ctx.distance.distance_sq(q.query, q.stride, ctx.store.vector(slot), ctx.weights);
                    v2v += 1;
                    if d > radius {
                        continue;
                    }
                    offer(&mut results, q.k, Neighbor { distance_sq: d, slot });
                }
            }
            NodeKind::Internal { split, left, right } => {
                let offset = split.offset_strided(q.query, q.stride);
                let (near, far) = if offset <= 0.0 { (*left, *right) } else { (*right, *left) };
                let bound = match split {
                    SplitPlane::Axis { dim, .. } => axis_distance_sq(offset, *dim, bound_weights),
                    SplitPlane::Hyperplane { normal, .. } => {
                        // NaN when both are infinite; max() turns that into no bound
                        let reach = (offset.abs() - split.rounding_margin(q.query, q.stride)).max(0.0);
                        plane_distance_sq(reach, normal, bound_weights) * HYPERPLANE_BOUND_SLACK
                    }
                };
                v2n += 1;

                stack.push(PendingNode { node: near, min_distance_sq });
                let far_min = min_distance_sq.max(bound);
                let full_and_beaten =
                    results.len() == q.k && results.peek().is_some_and(|worst| far_min > worst.distance_sq);
                if far_min <= radius && !full_and_beaten {
                    stack.push(PendingNode { node: far, min_distance_sq: far_min });
                }
                max_stack = max_stack.max(stack.len());
            }
        }
    }

    let sorted: Vec<(usize, f32)> =
        results.into_sorted_vec().into_iter().map(|n| (n.slot, n.distance_sq)).collect();

    let p = ctx.profile;
    p.add(Counter::Searches, 1);
    p.add(Counter::Neighbours, sorted.len() as u64);
    p.add(Counter::DistanceEvaluations, v2v);
    p.add(Counter::NodeBounds, v2n);
    p.add(Counter::NodesVisited, visited);
    p.add(Counter::LeavesScanned, leaves);
    p.observe_stack(max_stack);
    op.complete(p);
    sorted
}

fn offer(results: &mut BinaryHeap<Neighbor>, k: usize, candidate: Neighbor) {
    if results.len() < k {
        results.push(candidate);
    } else if results.peek().is_some_and(|worst| candidate < *worst) {
        results.pop();
        results.push(candidate);
    }
}

/// Reference linear scan with the same ordering rules, used to cross-check
/// the tree search.
#[cfg(test)]
pub(crate) fn brute_force_knn(ctx: &SearchContext<'_>, q: &KnnQuery<'_>) -> Vec<(usize, f32)> {
    let radius = q.max_distance_sq.unwrap_or(f32::INFINITY);
    let mut all: Vec<Neighbor> = ctx
        .store
        .order()
        .iter()
        .map(|&slot| Neighbor {
            distance_sq: ctx.distance.distance_sq(q.query, q.stride, ctx.store.vector(slot), ctx.weights),
            slot,
        })
        .filter(|n| n.distance_sq <= radius)
        .collect();
    all.sort();
    all.truncate(q.k);
    all.into_iter().map(|n| (n.slot, n.distance_sq)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_without_nodes_is_still_counted() {
        let store = ObjectStore::new(2, 4);
        let nodes = NodeStore::new();
        let profile = KdProfile::new();
        let ctx = SearchContext {
            store: &store,
            nodes: &nodes,
            distance: DistanceFunction::Euclidean,
            weights: None,
            profile: &profile,
        };
        let q = KnnQuery { query: &[0.0, 0.0], stride: 1, k: 3, max_distance_sq: None };

        assert!(find_knn(&ctx, &q).is_empty());
        assert_eq!(profile.snapshot().searches, 1);
    }
}
