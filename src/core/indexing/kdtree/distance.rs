// src/core/indexing/kdtree/distance.rs

//! Vector distance functions used by build and search.
//!
//! All functions return *squared* distances; callers that only compare
//! distances never pay for the square root. Weighted variants scale each
//! squared difference by a per-dimension weight, and a weight of exactly zero
//! drops the dimension entirely so degenerate coordinates (inf, NaN) cannot
//! leak into the sum.

use super::weights::Weights;

/// Distance function selected by the tree at search time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceFunction {
    /// Plain squared Euclidean distance.
    Euclidean,
    /// Squared Euclidean distance with per-dimension weights `1 / sigma^2`.
    WeightedEuclidean,
}

impl DistanceFunction {
    /// Squared distance between a (possibly strided) query and a stored vector.
    ///
    /// `weights` is ignored for [`DistanceFunction::Euclidean`].
    #[inline]
    pub fn distance_sq(
        &self,
        query: &[f32],
        query_stride: usize,
        stored: &[f32],
        weights: Option<&Weights>,
    ) -> f32 {
        match (self, weights) {
            (Self::WeightedEuclidean, Some(w)) => {
                weighted_euclidean_sq_strided(query, query_stride, stored, w.values())
            }
            _ => euclidean_sq_strided(query, query_stride, stored),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::WeightedEuclidean => "weighted_euclidean",
        }
    }
}

/// Squared Euclidean distance between two contiguous vectors.
#[inline]
pub fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

/// Squared Euclidean distance where `a` is read every `a_stride` elements.
#[inline]
pub fn euclidean_sq_strided(a: &[f32], a_stride: usize, b: &[f32]) -> f32 {
    if a_stride == 1 {
        return euclidean_sq(&a[..b.len()], b);
    }
    debug_assert!(a_stride > 0 && (b.is_empty() || (b.len() - 1) * a_stride < a.len()));
    let mut sum = 0.0f32;
    for (i, y) in b.iter().enumerate() {
        let d = a[i * a_stride] - y;
        sum += d * d;
    }
    sum
}

/// Weighted squared Euclidean distance: `sum(w_i * (a_i - b_i)^2)`.
#[inline]
pub fn weighted_euclidean_sq(a: &[f32], b: &[f32], weights: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), weights.len());
    let mut sum = 0.0f32;
    for ((x, y), &w) in a.iter().zip(b).zip(weights) {
        if w == 0.0 {
            continue;
        }
        let d = x - y;
        sum += w * (d * d);
    }
    sum
}

/// Weighted squared Euclidean distance where `a` is read every `a_stride`
/// elements. Same accumulation order as [`weighted_euclidean_sq`], so a
/// stride of 1 gives bit-identical results.
#[inline]
pub fn weighted_euclidean_sq_strided(a: &[f32], a_stride: usize, b: &[f32], weights: &[f32]) -> f32 {
    debug_assert_eq!(b.len(), weights.len());
    debug_assert!(a_stride > 0 && (b.is_empty() || (b.len() - 1) * a_stride < a.len()));
    let mut sum = 0.0f32;
    for (i, (y, &w)) in b.iter().zip(weights).enumerate() {
        if w == 0.0 {
            continue;
        }
        let d = a[i * a_stride] - y;
        sum += w * (d * d);
    }
    sum
}

/// Lower bound on the squared distance from a point to the far side of the
/// plane `normal . x = pivot`, given the point's signed offset
/// `normal . q - pivot`.
///
/// Unweighted: `offset^2 / |normal|^2`. Weighted: `offset^2 / sum(n_i^2 / w_i)`,
/// which is 0 as soon as the normal has a component along a zero-weight
/// dimension (the point can move freely along it).
pub fn plane_distance_sq(offset: f32, normal: &[f32], weights: Option<&Weights>) -> f32 {
    let mut denom = 0.0f32;
    match weights {
        Some(w) => {
            for (&n, &wi) in normal.iter().zip(w.values()) {
                if n == 0.0 {
                    continue;
                }
                if wi == 0.0 {
                    return 0.0;
                }
                denom += n * n / wi;
            }
        }
        None => {
            for &n in normal {
                denom += n * n;
            }
        }
    }
    if denom > 0.0 && denom.is_finite() {
        offset * offset / denom
    } else {
        0.0
    }
}

/// Lower bound for an axis-aligned split on `dim`.
#[inline]
pub fn axis_distance_sq(offset: f32, dim: usize, weights: Option<&Weights>) -> f32 {
    let sq = offset * offset;
    match weights {
        Some(w) => {
            let wi = w.values()[dim];
            if wi == 0.0 {
                0.0
            } else {
                wi * sq
            }
        }
        None => sq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_euclidean_sq() {
        assert_relative_eq!(euclidean_sq(&[1.0, 2.0], &[4.0, 6.0]), 25.0, epsilon = 1e-6);
        assert_eq!(euclidean_sq(&[], &[]), 0.0);
    }

    #[test]
    fn test_weighted_zero_weight_ignores_non_finite() {
        let a = [1.0, f32::INFINITY, 3.0];
        let b = [2.0, 0.0, 3.0];
        let w = [4.0, 0.0, 1.0];
        assert_relative_eq!(weighted_euclidean_sq(&a, &b, &w), 4.0, epsilon = 1e-6);
        assert_relative_eq!(weighted_euclidean_sq_strided(&a, 1, &b, &w), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_strided_reads_interleaved_buffer() {
        // query (1, 2, 3) interleaved with junk channel
        let interleaved = [1.0, 100.0, 2.0, 100.0, 3.0];
        let stored = [0.0, 0.0, 0.0];
        assert_relative_eq!(euclidean_sq_strided(&interleaved, 2, &stored), 14.0, epsilon = 1e-6);
        let w = [1.0, 2.0, 0.5];
        assert_relative_eq!(
            weighted_euclidean_sq_strided(&interleaved, 2, &stored, &w),
            1.0 + 8.0 + 4.5,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_stride_one_is_bit_identical() {
        let a: Vec<f32> = (0..37).map(|i| (i as f32 * 0.731).sin() * 13.0).collect();
        let b: Vec<f32> = (0..37).map(|i| (i as f32 * 1.37).cos() * 7.5).collect();
        let w: Vec<f32> = (0..37).map(|i| if i % 5 == 0 { 0.0 } else { 1.0 / (i as f32) }).collect();
        let contiguous = weighted_euclidean_sq(&a, &b, &w);
        let strided = weighted_euclidean_sq_strided(&a, 1, &b, &w);
        assert_eq!(contiguous.to_bits(), strided.to_bits());
        assert_eq!(euclidean_sq(&a, &b).to_bits(), euclidean_sq_strided(&a, 1, &b).to_bits());
    }

    #[test]
    fn test_plane_distance_bounds() {
        // plane x + y = 0, point offset 2 -> distance^2 = 4 / 2
        assert_relative_eq!(plane_distance_sq(2.0, &[1.0, 1.0], None), 2.0, epsilon = 1e-6);

        let w = Weights::from_sigma(&[1.0, 0.0]).unwrap();
        assert_eq!(plane_distance_sq(2.0, &[1.0, 1.0], Some(&w)), 0.0);
        assert_relative_eq!(plane_distance_sq(2.0, &[1.0, 0.0], Some(&w)), 4.0, epsilon = 1e-6);

        let w = Weights::from_sigma(&[0.5, 2.0]).unwrap();
        assert_relative_eq!(axis_distance_sq(1.0, 0, Some(&w)), 4.0, epsilon = 1e-6);
        assert_relative_eq!(axis_distance_sq(1.0, 1, Some(&w)), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_distance_function_dispatch() {
        let w = Weights::from_sigma(&[1.0, 0.0]).unwrap();
        let q = [0.0, 0.0];
        let p = [3.0, 4.0];
        assert_relative_eq!(DistanceFunction::Euclidean.distance_sq(&q, 1, &p, Some(&w)), 25.0);
        assert_relative_eq!(DistanceFunction::WeightedEuclidean.distance_sq(&q, 1, &p, Some(&w)), 9.0);
        assert_relative_eq!(DistanceFunction::WeightedEuclidean.distance_sq(&q, 1, &p, None), 25.0);
    }
}
