//! Ratio-margin scoring for mining parallel sentences.
//!
//! Raw cosine similarity favors **hubs**: vectors near the centroid of the
//! space that are close to everything. The ratio margin divides each candidate
//! similarity by the average neighborhood similarity of both endpoints:
//!
//! ```text
//! margin(i, j) = sim(i, j) / ((fwd_mean[i] + bwd_mean[j]) / 2)
//! ```
//!
//! where `fwd_mean[i]` is the mean of source `i`'s top-k similarities to the
//! target side, and `bwd_mean[j]` the mean of target `j`'s top-k similarities to
//! the source side. A hub has a large `bwd_mean`, so its margins shrink.
//!
//! Mining is greedy: every source row keeps its best-margin candidate, and a
//! target may be chosen by several sources.
//!
//! # References
//!
//! - Artetxe & Schwenk (2019): "Margin-based Parallel Corpus Mining with
//!   Multilingual Sentence Embeddings"

use tracing::debug;

use crate::distance::Similarity;
use crate::error::Result;
use crate::knn::{knn_sharded, Neighbors};
use crate::matrix::EmbeddingMatrix;

/// Margin score of every forward candidate, row-major like `forward`.
///
/// A zero denominator yields 0.0.
pub fn score_candidates(forward: &Neighbors, fwd_mean: &[f32], bwd_mean: &[f32]) -> Vec<Vec<f32>> {
    (0..forward.rows())
        .map(|i| {
            forward
                .similarities(i)
                .iter()
                .zip(forward.indices(i))
                .map(|(&sim, &j)| {
                    let denom = (fwd_mean[i] + bwd_mean[j]) / 2.0;
                    if denom == 0.0 {
                        0.0
                    } else {
                        sim / denom
                    }
                })
                .collect()
        })
        .collect()
}

/// Mine one target per source row by maximal ratio margin (cosine similarity).
///
/// Returns `(pairs, scores)` in source order; pairs are `(source, target)`.
/// Sources without candidates (empty target side) are omitted.
pub fn ratio_margin_align(
    source: &EmbeddingMatrix,
    target: &EmbeddingMatrix,
    k: usize,
    tile_size: usize,
) -> Result<(Vec<(usize, usize)>, Vec<f32>)> {
    ratio_margin_align_with(source, target, k, tile_size, Similarity::Cosine)
}

/// [`ratio_margin_align`] with an explicit similarity.
///
/// Use [`Similarity::InnerProduct`] when the caller already L2-normalized the rows.
pub fn ratio_margin_align_with(
    source: &EmbeddingMatrix,
    target: &EmbeddingMatrix,
    k: usize,
    tile_size: usize,
    metric: Similarity,
) -> Result<(Vec<(usize, usize)>, Vec<f32>)> {
    let forward = knn_sharded(source, target, k, tile_size, metric)?;
    let backward = knn_sharded(target, source, k, tile_size, metric)?;

    let fwd_mean = forward.mean_similarities();
    let bwd_mean = backward.mean_similarities();
    let margins = score_candidates(&forward, &fwd_mean, &bwd_mean);

    let mut pairs = Vec::with_capacity(forward.rows());
    let mut scores = Vec::with_capacity(forward.rows());
    for (i, row) in margins.iter().enumerate() {
        if let Some(best) = argmax(row) {
            pairs.push((i, forward.indices(i)[best]));
            scores.push(row[best]);
        }
    }
    debug!(mined = pairs.len(), k, "ratio margin mining");
    Ok((pairs, scores))
}

/// Index of the first maximum.
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn score_formula() {
        let forward = Neighbors::from_parts(2, vec![0.8, 0.4], vec![1, 0]);
        let scores = score_candidates(&forward, &[0.6], &[0.2, 1.0]);
        // 0.8 / ((0.6 + 1.0) / 2) and 0.4 / ((0.6 + 0.2) / 2)
        assert!((scores[0][0] - 1.0).abs() < 1e-6);
        assert!((scores[0][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_denominator_scores_zero() {
        let forward = Neighbors::from_parts(1, vec![0.0], vec![0]);
        let scores = score_candidates(&forward, &[0.0], &[0.0]);
        assert_eq!(scores[0][0], 0.0);
    }

    #[test]
    fn one_pair_per_source_in_order() {
        let src = EmbeddingMatrix::from_rows(&[[1.0_f32, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
        let tgt = EmbeddingMatrix::from_rows(&[[0.0_f32, 1.0], [1.0, 0.1]]).unwrap();
        let (pairs, scores) = ratio_margin_align(&src, &tgt, 2, 2).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(scores.len(), 3);
        assert_eq!(pairs[0], (0, 1));
        assert_eq!(pairs[1], (1, 0));
        assert_eq!(pairs[2].0, 2);
    }

    #[test]
    fn empty_target_mines_nothing() {
        let src = EmbeddingMatrix::from_rows(&[[1.0_f32, 0.0]]).unwrap();
        let tgt = EmbeddingMatrix::empty(2);
        let (pairs, scores) = ratio_margin_align(&src, &tgt, 3, 8).unwrap();
        assert!(pairs.is_empty());
        assert!(scores.is_empty());
    }
}
