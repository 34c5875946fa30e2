//! Word Mover's Distance between sentences.
//!
//! A sentence is a weighted point cloud: one point per n-gram, with mass
//! proportional to the n-gram's summed token weight. WMD is the minimum cost
//! of moving one cloud onto the other when moving unit mass between two
//! n-grams costs their ground distance.
//!
//! # Pipeline
//!
//! 1. [`ngram::group`] merges consecutive tokens into spans.
//! 2. The ground-cost matrix is filled with [`GroundCost`] between spans.
//! 3. Span weights are normalized to probability distributions.
//! 4. A [`TransportSolver`] finds the cheapest plan.
//! 5. The cost becomes a similarity.
//!
//! # Score convention
//!
//! **similarity = 1 - cost.** With the default cosine ground cost the cost
//! lies in `[0, 2]`, so similarities lie in `[-1, 1]` and a sentence scored
//! against an identical copy of itself gets exactly the maximum, 1. The same
//! formula is applied with Euclidean ground cost, where it is unbounded below.
//!
//! A sentence with no spans, or whose weights sum to zero, carries no mass to
//! move. Any comparison involving it scores 0.0.
//!
//! # References
//!
//! - Kusner et al. (2015): "From Word Embeddings To Document Distances"
//! - Zhao et al. (2019): "MoverScore: Text Generation Evaluating with
//!   Contextualized Embeddings and Earth Mover Distance"

pub mod ngram;
pub mod transport;

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use ngram::{group, NGrams, Span};
pub use transport::{solve_exact, solve_sinkhorn, TransportPlan, TransportSolver};

use crate::distance::GroundCost;
use crate::embed::SentenceEmbedding;
use crate::error::{Result, XMoverError};

/// Parameters of a WMD comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WmdConfig {
    /// Tokens per span.
    pub n_gram: usize,
    pub ground_cost: GroundCost,
    pub solver: TransportSolver,
}

impl Default for WmdConfig {
    fn default() -> Self {
        Self {
            n_gram: 1,
            ground_cost: GroundCost::Cosine,
            solver: TransportSolver::Exact,
        }
    }
}

impl WmdConfig {
    pub fn with_n_gram(n_gram: usize) -> Self {
        Self {
            n_gram,
            ..Self::default()
        }
    }
}

/// Optimal plan between two sentences, or `None` when either side has no mass.
pub fn transport_plan(
    source: &SentenceEmbedding,
    target: &SentenceEmbedding,
    config: &WmdConfig,
) -> Result<Option<TransportPlan>> {
    let src = group(source, config.n_gram)?;
    let tgt = group(target, config.n_gram)?;
    plan_between(&src, &tgt, config)
}

fn plan_between(src: &NGrams, tgt: &NGrams, config: &WmdConfig) -> Result<Option<TransportPlan>> {
    let (Some(a), Some(b)) = (src.distribution(), tgt.distribution()) else {
        return Ok(None);
    };
    if src.embeddings.dimension() != tgt.embeddings.dimension() {
        return Err(XMoverError::DimensionMismatch {
            expected: src.embeddings.dimension(),
            actual: tgt.embeddings.dimension(),
        });
    }

    let mut cost = Vec::with_capacity(src.len() * tgt.len());
    for x in src.embeddings.iter_rows() {
        for y in tgt.embeddings.iter_rows() {
            cost.push(f64::from(config.ground_cost.cost(x, y)).max(0.0));
        }
    }
    config.solver.solve(&a, &b, &cost).map(Some)
}

fn score_between(src: &NGrams, tgt: &NGrams, config: &WmdConfig) -> Result<f32> {
    Ok(match plan_between(src, tgt, config)? {
        Some(plan) => (1.0 - plan.cost()) as f32,
        None => 0.0,
    })
}

/// WMD similarity (`1 - cost`) between two sentences.
pub fn wmd_score(
    source: &SentenceEmbedding,
    target: &SentenceEmbedding,
    config: &WmdConfig,
) -> Result<f32> {
    let src = group(source, config.n_gram)?;
    let tgt = group(target, config.n_gram)?;
    score_between(&src, &tgt, config)
}

/// Parallel-array scores: `source[i]` against `target[i]`, no cross product.
pub fn wmd_scores(
    source: &[SentenceEmbedding],
    target: &[SentenceEmbedding],
    config: &WmdConfig,
) -> Result<Vec<f32>> {
    if source.len() != target.len() {
        return Err(XMoverError::InvalidParameter(format!(
            "{} source sentences but {} target sentences",
            source.len(),
            target.len()
        )));
    }
    source
        .iter()
        .zip(target)
        .map(|(s, t)| wmd_score(s, t, config))
        .collect()
}

/// Best target for each source sentence among its candidates.
///
/// `candidates[i]` lists indices into `target` for source `i`. Only those
/// pairs are compared, so the work is linear in the number of candidates.
/// Returns `(source, target)` pairs in source order with their similarity;
/// sources with an empty candidate list are omitted. On equal scores the
/// earlier candidate wins.
pub fn wmd_align(
    source: &[SentenceEmbedding],
    target: &[SentenceEmbedding],
    config: &WmdConfig,
    candidates: &[Vec<usize>],
) -> Result<(Vec<(usize, usize)>, Vec<f32>)> {
    if candidates.len() != source.len() {
        return Err(XMoverError::InvalidParameter(format!(
            "{} candidate lists for {} source sentences",
            candidates.len(),
            source.len()
        )));
    }

    let mut grouped: HashMap<usize, NGrams> = HashMap::new();
    let mut pairs = Vec::with_capacity(source.len());
    let mut scores = Vec::with_capacity(source.len());

    for (i, (sentence, cands)) in source.iter().zip(candidates).enumerate() {
        let src = group(sentence, config.n_gram)?;
        let mut best: Option<(usize, f32)> = None;
        for &j in cands {
            let Some(tgt_sentence) = target.get(j) else {
                return Err(XMoverError::InvalidParameter(format!(
                    "candidate {j} of source {i} is out of range for {} targets",
                    target.len()
                )));
            };
            let tgt = match grouped.entry(j) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(group(tgt_sentence, config.n_gram)?),
            };
            let score = score_between(&src, tgt, config)?;
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((j, score));
            }
        }
        if let Some((j, score)) = best {
            pairs.push((i, j));
            scores.push(score);
        }
    }
    debug!(sources = source.len(), aligned = pairs.len(), "wmd align");
    Ok((pairs, scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::EmbeddingMatrix;

    fn sentence(rows: &[[f32; 3]], weights: &[f32]) -> SentenceEmbedding {
        let tokens = (0..rows.len()).map(|i| format!("w{i}")).collect();
        SentenceEmbedding::new(
            tokens,
            EmbeddingMatrix::from_rows(rows).unwrap(),
            weights.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn identical_sentences_score_one() {
        let s = sentence(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.5], [0.2, 0.2, 1.0]], &[1.0, 2.0, 1.0]);
        let score = wmd_score(&s, &s, &WmdConfig::default()).unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthogonal_sentences_score_zero() {
        let a = sentence(&[[1.0, 0.0, 0.0]], &[1.0]);
        let b = sentence(&[[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], &[1.0, 1.0]);
        let score = wmd_score(&a, &b, &WmdConfig::default()).unwrap();
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn zero_weight_sentence_scores_zero() {
        let a = sentence(&[[1.0, 0.0, 0.0]], &[0.0]);
        let b = sentence(&[[1.0, 0.0, 0.0]], &[1.0]);
        assert_eq!(wmd_score(&a, &b, &WmdConfig::default()).unwrap(), 0.0);
        assert!(transport_plan(&a, &b, &WmdConfig::default()).unwrap().is_none());
    }

    #[test]
    fn weights_shift_the_score() {
        let a = sentence(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[1.0, 1.0]);
        let b_light = sentence(&[[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]], &[3.0, 1.0]);
        let b_heavy = sentence(&[[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]], &[1.0, 3.0]);
        let cfg = WmdConfig::default();
        assert!(wmd_score(&a, &b_light, &cfg).unwrap() > wmd_score(&a, &b_heavy, &cfg).unwrap());
    }

    #[test]
    fn align_picks_best_candidate_only_among_candidates() {
        let src = vec![sentence(&[[1.0, 0.0, 0.0]], &[1.0])];
        let tgt = vec![
            sentence(&[[1.0, 0.0, 0.0]], &[1.0]),
            sentence(&[[0.9, 0.1, 0.0]], &[1.0]),
            sentence(&[[0.0, 1.0, 0.0]], &[1.0]),
        ];
        let cfg = WmdConfig::default();
        let (pairs, _) = wmd_align(&src, &tgt, &cfg, &[vec![2, 1]]).unwrap();
        assert_eq!(pairs, vec![(0, 1)]);
        let (pairs, scores) = wmd_align(&src, &tgt, &cfg, &[vec![0, 1, 2]]).unwrap();
        assert_eq!(pairs, vec![(0, 0)]);
        assert!((scores[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn align_validates_candidates() {
        let src = vec![sentence(&[[1.0, 0.0, 0.0]], &[1.0])];
        let cfg = WmdConfig::default();
        assert!(wmd_align(&src, &src, &cfg, &[]).is_err());
        assert!(wmd_align(&src, &src, &cfg, &[vec![3]]).is_err());
        let (pairs, scores) = wmd_align(&src, &src, &cfg, &[vec![]]).unwrap();
        assert!(pairs.is_empty() && scores.is_empty());
    }

    #[test]
    fn parallel_scores_require_equal_lengths() {
        let s = sentence(&[[1.0, 0.0, 0.0]], &[1.0]);
        let cfg = WmdConfig::default();
        assert!(wmd_scores(&[s.clone()], &[], &cfg).is_err());
        assert_eq!(wmd_scores(&[s.clone()], &[s], &cfg).unwrap().len(), 1);
    }

    #[test]
    fn sinkhorn_is_close_to_exact() {
        let a = sentence(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[1.0, 1.0]);
        let b = sentence(&[[0.8, 0.2, 0.0], [0.0, 0.5, 0.5]], &[1.0, 1.0]);
        let exact = wmd_score(&a, &b, &WmdConfig::default()).unwrap();
        let approx = wmd_score(
            &a,
            &b,
            &WmdConfig {
                solver: TransportSolver::sinkhorn(),
                ..WmdConfig::default()
            },
        )
        .unwrap();
        assert!((exact - approx).abs() < 0.15);
    }
}
