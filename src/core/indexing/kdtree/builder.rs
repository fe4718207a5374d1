// src/core/indexing/kdtree/builder.rs

//! Logic for building a KD-Tree (or one subtree of it) over the Object Store.

use std::time::Duration;

use tracing::{debug, warn};

use super::objects::ObjectStore;
use super::split::{split_range, DecompositionMode, PivotMode, Scratch, SplitParams};
use super::tree::{KdNode, NodeId, NodeKind, NodeStore};
use super::weights::Weights;
use crate::core::performance::{Counter, KdProfile, Phase, ProfiledOperation};

/// Parameters of one build pass, resolved from the tree configuration.
#[derive(Debug, Clone)]
pub(crate) struct BuildParams {
    pub decomposition: DecompositionMode,
    pub pivot: PivotMode,
    pub max_leaf_size: usize,
    pub max_depth: usize,
    scale: Vec<f32>,
    active: Vec<usize>,
}

impl BuildParams {
    /// `weights` restricts and scales split fitting; `None` builds unweighted.
    pub fn new(
        dimension: usize,
        decomposition: DecompositionMode,
        pivot: PivotMode,
        max_leaf_size: usize,
        max_depth: usize,
        weights: Option<&Weights>,
    ) -> Self {
        let (scale, active) = match weights {
            Some(w) => (w.scale(), w.active_dimensions().to_vec()),
            None => (vec![1.0; dimension], (0..dimension).collect()),
        };
        Self { decomposition, pivot, max_leaf_size, max_depth, scale, active }
    }

    fn split_params<'a>(&'a self, profile: &'a KdProfile) -> SplitParams<'a> {
        SplitParams {
            decomposition: self.decomposition,
            pivot: self.pivot,
            scale: &self.scale,
            active: &self.active,
            profile,
        }
    }
}

/// Outcome of a full build, mostly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub objects: usize,
    pub nodes: usize,
    pub height: usize,
    pub elapsed: Duration,
}

/// Discards `nodes` and rebuilds the whole tree over the live objects of
/// `store`. Removed slots are compacted away first.
///
/// An empty store still yields a root: an empty leaf, so inserts have
/// somewhere to land.
pub(crate) fn build_full(
    store: &mut ObjectStore,
    nodes: &mut NodeStore,
    params: &BuildParams,
    profile: &KdProfile,
) -> BuildSummary {
    let op = ProfiledOperation::start(Phase::Build);
    let dropped = store.slot_count() - store.len();
    store.compact();
    nodes.clear();

    let n = store.len();
    nodes.reserve(2 * n / params.max_leaf_size.max(1) + 1);
    let root = nodes.push(KdNode::leaf(0, n, 0));

    let mut order = std::mem::take(store.order_mut());
    let mut scratch = Scratch::default();
    build_node(store, &mut order, nodes, root, 0, n, 0, params, profile, &mut scratch);
    *store.order_mut() = order;

    profile.add(Counter::Builds, 1);
    let elapsed = op.complete(profile);
    let summary = BuildSummary { objects: n, nodes: nodes.len(), height: nodes.height(), elapsed };
    debug!(
        objects = summary.objects,
        nodes = summary.nodes,
        height = summary.height,
        dropped,
        decomposition = params.decomposition.name(),
        pivot = params.pivot.name(),
        elapsed_us = elapsed.as_micros() as u64,
        "kd-tree built"
    );
    summary
}

/// Rebuilds the subtree rooted at leaf `leaf` in place: the leaf's slot
/// becomes the new subtree root, so the parent's child reference stays valid.
pub(crate) fn rebuild_leaf(
    store: &mut ObjectStore,
    nodes: &mut NodeStore,
    leaf: NodeId,
    params: &BuildParams,
    profile: &KdProfile,
) {
    let Some(node) = nodes.get(leaf) else {
        return;
    };
    debug_assert!(node.is_leaf());
    let (start, end, depth) = (node.start, node.end, node.depth);

    let op = ProfiledOperation::start(Phase::Build);
    let mut order = std::mem::take(store.order_mut());
    let mut scratch = Scratch::default();
    build_node(store, &mut order, nodes, leaf, start, end, depth, params, profile, &mut scratch);
    *store.order_mut() = order;
    profile.add(Counter::LocalRebuilds, 1);
    op.complete(profile);

    debug!(leaf, objects = end - start, depth, "leaf rebuilt locally");
}

#[allow(clippy::too_many_arguments)]
fn build_node(
    store: &ObjectStore,
    order: &mut [usize],
    nodes: &mut NodeStore,
    slot: NodeId,
    start: usize,
    end: usize,
    depth: usize,
    params: &BuildParams,
    profile: &KdProfile,
    scratch: &mut Scratch,
) {
    let len = end - start;
    if len <= params.max_leaf_size || depth >= params.max_depth {
        if len > params.max_leaf_size {
            warn!(objects = len, depth, max_depth = params.max_depth, "leaf forced at maximum depth");
        }
        nodes.set(slot, KdNode::leaf(start, end, depth));
        return;
    }

    let split_params = params.split_params(profile);
    let Some((plane, split)) = split_range(store, &mut order[start..end], depth, &split_params, scratch)
    else {
        // every object is identical on the weighted dimensions
        nodes.set(slot, KdNode::leaf(start, end, depth));
        return;
    };

    let mid = start + split;
    let left = nodes.push(KdNode::leaf(start, mid, depth + 1));
    let right = nodes.push(KdNode::leaf(mid, end, depth + 1));
    nodes.set(
        slot,
        KdNode { start, end, depth, kind: NodeKind::Internal { split: plane, left, right } },
    );

    build_node(store, order, nodes, left, start, mid, depth + 1, params, profile, scratch);
    build_node(store, order, nodes, right, mid, end, depth + 1, params, profile, scratch);
}
