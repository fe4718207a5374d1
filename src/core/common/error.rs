use std::fmt;

use crate::core::indexing::kdtree::ObjectId;

/// Errors reported by the k-d tree engine.
///
/// Every variant falls into one of three [`ErrorKind`]s so callers can tell
/// a bad argument apart from a tree that is not ready yet.
#[derive(Debug)]
pub enum KdTreeError {
    /// A vector or weight vector does not have the tree's dimension.
    DimensionMismatch { expected: usize, actual: usize },
    /// An argument is out of its valid domain (k == 0, stride 0, NaN values...).
    InvalidArgument(String),
    /// The operation needs a built tree.
    NotBuilt,
    /// Inserting would exceed the configured object capacity.
    CapacityExceeded { capacity: usize },
    /// The object identifier is already stored in the tree.
    DuplicateId(ObjectId),
    /// The object identifier is not stored in the tree.
    NotFound(ObjectId),
    /// Invalid or unreadable configuration.
    Configuration(String),
    Io(std::io::Error),
}

/// Coarse classification of [`KdTreeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something the engine cannot accept.
    InvalidInput,
    /// The structure has not been built yet.
    NotReady,
    /// Capacity or environment limits were hit.
    ResourceExhausted,
}

impl KdTreeError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotBuilt => ErrorKind::NotReady,
            Self::CapacityExceeded { .. } | Self::Io(_) => ErrorKind::ResourceExhausted,
            Self::DimensionMismatch { .. }
            | Self::InvalidArgument(_)
            | Self::DuplicateId(_)
            | Self::NotFound(_)
            | Self::Configuration(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl fmt::Display for KdTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "KD-Tree Dimension Mismatch: expected {expected}, got {actual}")
            }
            Self::InvalidArgument(msg) => write!(f, "KD-Tree Invalid Argument: {msg}"),
            Self::NotBuilt => write!(f, "KD-Tree Not Built: call build() first"),
            Self::CapacityExceeded { capacity } => {
                write!(f, "KD-Tree Capacity Exceeded: capacity is {capacity} objects")
            }
            Self::DuplicateId(id) => write!(f, "KD-Tree Duplicate Id: {id} is already stored"),
            Self::NotFound(id) => write!(f, "KD-Tree Not Found: {id}"),
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(e) => write!(f, "IO Error: {e}"),
        }
    }
}

impl std::error::Error for KdTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KdTreeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
