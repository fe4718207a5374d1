// src/core/indexing/kdtree/tree.rs

//! Defines the Node Store: `KdNode`, `SplitPlane` and the flat `NodeStore`.

/// Index of a node inside the [`NodeStore`].
pub type NodeId = usize;

/// Splitting decision of an internal node.
///
/// Objects whose projection is `<= pivot` live in the left child, the others
/// in the right child.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitPlane {
    /// Split orthogonal to coordinate axis `dim`.
    Axis { dim: usize, pivot: f32 },
    /// Split along an arbitrary unit normal.
    Hyperplane { normal: Box<[f32]>, pivot: f32 },
}

impl SplitPlane {
    #[inline]
    pub const fn pivot(&self) -> f32 {
        match self {
            Self::Axis { pivot, .. } | Self::Hyperplane { pivot, .. } => *pivot,
        }
    }

    #[inline]
    pub fn project(&self, x: &[f32]) -> f32 {
        self.project_strided(x, 1)
    }

    /// Projection of a vector read every `stride` elements.
    #[inline]
    pub fn project_strided(&self, x: &[f32], stride: usize) -> f32 {
        match self {
            Self::Axis { dim, .. } => x[dim * stride],
            Self::Hyperplane { normal, .. } => {
                let mut sum = 0.0f32;
                for (i, &n) in normal.iter().enumerate() {
                    // skip so that inf coordinates on unused axes do not yield NaN
                    if n != 0.0 {
                        sum += n * x[i * stride];
                    }
                }
                sum
            }
        }
    }

    /// Signed offset of `x` from the plane, negative or zero on the left side.
    #[inline]
    pub fn offset_strided(&self, x: &[f32], stride: usize) -> f32 {
        self.project_strided(x, stride) - self.pivot()
    }

    /// Largest amount by which rounding can have moved `x`, or any object
    /// near it, across the plane: projections are f32 dot products whose
    /// error grows with `sum(|n_i * x_i|)`, not with the offset itself.
    /// Axis splits compare raw coordinates and never round.
    pub fn rounding_margin(&self, x: &[f32], stride: usize) -> f32 {
        match self {
            Self::Axis { .. } => 0.0,
            Self::Hyperplane { normal, pivot } => {
                let mut magnitude = pivot.abs();
                for (i, &n) in normal.iter().enumerate() {
                    if n != 0.0 {
                        magnitude += (n * x[i * stride]).abs();
                    }
                }
                2.0 * (normal.len() + 2) as f32 * f32::EPSILON * magnitude
            }
        }
    }

    #[inline]
    pub fn goes_left(&self, x: &[f32]) -> bool {
        self.project(x) <= self.pivot()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Leaf,
    Internal { split: SplitPlane, left: NodeId, right: NodeId },
}

/// A tree node referencing the contiguous range `start..end` of the object
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct KdNode {
    pub start: usize,
    pub end: usize,
    pub depth: usize,
    pub kind: NodeKind,
}

impl KdNode {
    pub(crate) const fn leaf(start: usize, end: usize, depth: usize) -> Self {
        Self { start, end, depth, kind: NodeKind::Leaf }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    pub const fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Flat, index-addressed node array. The root is always node 0.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: Vec<KdNode>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&KdNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> Option<&KdNode> {
        self.nodes.first()
    }

    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    pub(crate) fn push(&mut self, node: KdNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(crate) fn set(&mut self, id: NodeId, node: KdNode) {
        self.nodes[id] = node;
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.nodes.reserve(additional);
    }

    /// Leaves in left-to-right order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        if self.is_empty() {
            return leaves;
        }
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            match &self.nodes[id].kind {
                NodeKind::Leaf => leaves.push(id),
                NodeKind::Internal { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Depth of the deepest node (a single leaf has height 0).
    pub fn height(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Grows the ranges after one element was inserted into the order at
    /// `pos`, the end of the last node on `path`.
    pub(crate) fn shift_after_insert(&mut self, path: &[NodeId], pos: usize) {
        let on_path = self.mark(path);
        for (node, on_path) in self.nodes.iter_mut().zip(on_path) {
            if on_path {
                node.end += 1;
            } else if node.start >= pos {
                node.start += 1;
                node.end += 1;
            }
        }
    }

    /// Shrinks the ranges after the element at `pos` was removed from the
    /// order; `path` holds the leaf that contained it and its ancestors.
    pub(crate) fn shift_after_remove(&mut self, path: &[NodeId], pos: usize) {
        let on_path = self.mark(path);
        for (node, on_path) in self.nodes.iter_mut().zip(on_path) {
            if on_path {
                node.end -= 1;
            } else if node.start > pos {
                node.start -= 1;
                node.end -= 1;
            }
        }
    }

    fn mark(&self, path: &[NodeId]) -> Vec<bool> {
        let mut on_path = vec![false; self.nodes.len()];
        for &id in path {
            if let Some(flag) = on_path.get_mut(id) {
                *flag = true;
            }
        }
        on_path
    }
}
