// src/core/indexing/kdtree/tests/common.rs

//! Helpers shared by the KD-Tree test modules.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::config::KdTreeConfig;
use crate::core::indexing::kdtree::{DecompositionMode, KdTree, NodeKind, ObjectId, PivotMode};

pub(super) const DECOMPOSITIONS: [DecompositionMode; 3] =
    [DecompositionMode::Orthogonal, DecompositionMode::Hyperplane, DecompositionMode::Pca];

pub(super) const PIVOTS: [PivotMode; 3] = [PivotMode::Mean, PivotMode::Middle, PivotMode::Median];

/// `n` row-major vectors with coordinates uniform in `[-10, 10)`.
pub(super) fn random_rows(seed: u64, n: usize, dimension: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * dimension).map(|_| rng.gen_range(-10.0f32..10.0)).collect()
}

pub(super) fn sequential_ids(n: usize) -> Vec<ObjectId> {
    (0..n as ObjectId).collect()
}

pub(super) fn tree_with(
    dimension: usize,
    decomposition: DecompositionMode,
    pivot: PivotMode,
    max_leaf_size: usize,
) -> KdTree {
    let config = KdTreeConfig::builder()
        .dimension(dimension)
        .decomposition(decomposition)
        .pivot(pivot)
        .max_leaf_size(max_leaf_size)
        .build()
        .unwrap();
    KdTree::new(config).unwrap()
}

/// Linear scan with the tree's current distance function. Ties keep
/// insertion order, as the tree does.
pub(super) fn brute_force_knn(tree: &KdTree, query: &[f32], k: usize) -> Vec<(ObjectId, f32)> {
    let distance = tree.distance_function();
    let mut all: Vec<(ObjectId, f32)> = tree
        .objects()
        .map(|(id, v)| (id, distance.distance_sq(query, 1, v, tree.weights()).sqrt()))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1));
    all.truncate(k);
    all
}

/// Checks that every live object sits in exactly one leaf and on the side of
/// every split that the split's plane assigns it to.
pub(super) fn assert_partitioned(tree: &KdTree) {
    let nodes = tree.nodes();
    assert_eq!(nodes[0].len(), tree.len(), "root must cover every live object");

    let mut in_leaves: Vec<ObjectId> =
        tree.leaves().into_iter().flat_map(|leaf| tree.ordered_ids(leaf).unwrap()).collect();
    in_leaves.sort_unstable();
    let mut live: Vec<ObjectId> = tree.objects().map(|(id, _)| id).collect();
    live.sort_unstable();
    assert_eq!(in_leaves, live, "leaves must hold each live object exactly once");

    for node in nodes {
        if let NodeKind::Internal { split, left, right } = &node.kind {
            let (l, r) = (&nodes[*left], &nodes[*right]);
            assert_eq!(l.len() + r.len(), node.len());
            assert_eq!(l.depth, node.depth + 1);
            assert_eq!(r.depth, node.depth + 1);
            for id in tree.ordered_ids(*left).unwrap() {
                assert!(split.goes_left(tree.object(id).unwrap()), "object {id} on the wrong side");
            }
            for id in tree.ordered_ids(*right).unwrap() {
                assert!(!split.goes_left(tree.object(id).unwrap()), "object {id} on the wrong side");
            }
        }
    }
}
