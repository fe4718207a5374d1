// src/core/indexing/kdtree/weights.rs

//! Per-dimension weights derived from a sigma vector.

use crate::core::common::KdTreeError;

/// Dimension weights `1 / sigma^2`. A sigma of zero switches the dimension
/// off (weight 0), matching the Mahalanobis-style convention the tree uses.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    sigma: Vec<f32>,
    weights: Vec<f32>,
    /// Indices of dimensions with a non-zero weight.
    active: Vec<usize>,
}

impl Weights {
    /// Builds weights from `sigma`. Negative or NaN sigmas are rejected.
    pub fn from_sigma(sigma: &[f32]) -> Result<Self, KdTreeError> {
        if let Some((i, s)) = sigma.iter().enumerate().find(|(_, s)| s.is_nan() || **s < 0.0) {
            return Err(KdTreeError::invalid(format!(
                "sigma[{i}] = {s} is not a non-negative number"
            )));
        }
        let weights: Vec<f32> = sigma
            .iter()
            .map(|&s| if s == 0.0 { 0.0 } else { 1.0 / (s * s) })
            .collect();
        if let Some(i) = weights.iter().position(|w| w.is_infinite()) {
            return Err(KdTreeError::invalid(format!(
                "sigma[{i}] = {} is too small to weight by",
                sigma[i]
            )));
        }
        let active = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0.0)
            .map(|(i, _)| i)
            .collect();
        Ok(Self { sigma: sigma.to_vec(), weights, active })
    }

    pub fn values(&self) -> &[f32] {
        &self.weights
    }

    pub fn sigma(&self) -> &[f32] {
        &self.sigma
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    /// Number of dimensions taking part in distance computations.
    pub fn nnz(&self) -> usize {
        self.active.len()
    }

    pub fn active_dimensions(&self) -> &[usize] {
        &self.active
    }

    /// Per-dimension factor that maps raw coordinates into weighted space
    /// (`sqrt(weight)`).
    pub(crate) fn scale(&self) -> Vec<f32> {
        self.weights.iter().map(|w| w.sqrt()).collect()
    }
}
