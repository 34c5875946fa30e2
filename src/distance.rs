//! Similarity and ground-cost metrics for dense vectors.
//!
//! Two vocabularies live here:
//!
//! - [`Similarity`]: what nearest-neighbor search *maximizes*. Larger is closer.
//! - [`GroundCost`]: what optimal transport *minimizes* between two n-grams.
//!
//! ## Important nuance
//!
//! [`Similarity::InnerProduct`] on L2-normalized vectors equals cosine similarity,
//! which is how the sharded search evaluates [`Similarity::Cosine`]: it normalizes
//! copies of the rows once per tile instead of recomputing norms per pair.

use serde::{Deserialize, Serialize};

use crate::simd;

/// Similarity used by nearest-neighbor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Raw inner product $\langle a,b\rangle$ (maximum inner product search).
    InnerProduct,
    /// Cosine similarity $\cos(a,b)$.
    #[default]
    Cosine,
    /// Negative Euclidean distance $-\|a-b\|_2$ (word centroid distance).
    NegativeL2,
}

impl Similarity {
    /// Compute similarity between two vectors.
    ///
    /// If dimensions mismatch, this returns `f32::NEG_INFINITY` (so it is never
    /// selected as a nearest neighbor).
    #[inline]
    #[must_use]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::NEG_INFINITY;
        }
        match self {
            Similarity::InnerProduct => simd::dot(a, b),
            Similarity::Cosine => simd::cosine(a, b).clamp(-1.0, 1.0),
            Similarity::NegativeL2 => -simd::l2_distance(a, b),
        }
    }
}

/// Ground cost between two n-gram embeddings in Word Mover's Distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundCost {
    /// Cosine distance $1 - \cos(a,b)$, in `[0, 2]`.
    #[default]
    Cosine,
    /// Euclidean distance $\|a-b\|_2$.
    Euclidean,
}

impl GroundCost {
    /// Cost of moving one unit of mass from `a` to `b`. Always non-negative.
    #[inline]
    #[must_use]
    pub fn cost(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            GroundCost::Cosine => cosine_distance(a, b),
            GroundCost::Euclidean => simd::l2_distance(a, b),
        }
    }
}

/// Cosine distance $1 - \cos(a,b)$.
///
/// This computes cosine similarity (including norms), so it does **not** require
/// pre-normalized vectors.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    1.0 - simd::cosine(a, b).clamp(-1.0, 1.0)
}

/// Normalize a vector to unit L2 norm. Near-zero vectors become all zeros.
#[inline]
#[must_use]
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = simd::norm(v);
    if n < 1e-10 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_is_zero_for_identical() {
        let a = [1.0_f32, 2.0, 3.0];
        let d = cosine_distance(&a, &a);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn inner_product_on_normalized_matches_cosine() {
        let a = normalize(&[3.0_f32, 4.0]);
        let b = normalize(&[1.0_f32, 7.0]);
        let s1 = Similarity::Cosine.similarity(&a, &b);
        let s2 = Similarity::InnerProduct.similarity(&a, &b);
        assert!((s1 - s2).abs() < 1e-6);
    }

    #[test]
    fn negative_l2_prefers_closer_vectors() {
        let q = [0.0_f32, 0.0];
        let near = Similarity::NegativeL2.similarity(&q, &[1.0, 0.0]);
        let far = Similarity::NegativeL2.similarity(&q, &[3.0, 4.0]);
        assert!(near > far);
        assert!((far + 5.0).abs() < 1e-6);
    }

    #[test]
    fn ground_costs_are_non_negative() {
        let a = [1.0_f32, -2.0];
        let b = [-1.0_f32, 2.0];
        assert!(GroundCost::Cosine.cost(&a, &b) >= 0.0);
        assert!((GroundCost::Cosine.cost(&a, &b) - 2.0).abs() < 1e-6);
        assert!(GroundCost::Euclidean.cost(&a, &b) >= 0.0);
    }

    #[test]
    fn mismatched_dimensions_never_win() {
        assert_eq!(
            Similarity::InnerProduct.similarity(&[1.0], &[1.0, 2.0]),
            f32::NEG_INFINITY
        );
    }

    #[test]
    fn serde_names_are_snake_case() {
        let s: Similarity = serde_json::from_str("\"negative_l2\"").unwrap();
        assert_eq!(s, Similarity::NegativeL2);
        let c: GroundCost = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(c, GroundCost::Euclidean);
    }
}
