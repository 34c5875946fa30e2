//! Aligner configuration.

use serde::{Deserialize, Serialize};

use crate::distance::GroundCost;
use crate::error::{Result, XMoverError};
use crate::wmd::{TransportSolver, WmdConfig};

/// How sentence-level candidates are retrieved before WMD re-ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStrategy {
    /// Cosine similarity between mean-pooled sentence vectors.
    Cosine,
    /// Euclidean distance between mean-pooled sentence vectors.
    WordCentroid,
}

/// Parameters of an [`crate::Aligner`].
///
/// Unknown fields are rejected; missing fields take their defaults.
///
/// ```rust
/// use xmover::AlignerConfig;
///
/// let config = AlignerConfig::from_json(r#"{ "k": 5, "n_gram": 2 }"#).unwrap();
/// assert_eq!(config.k, 5);
/// assert_eq!(config.align_batch_size, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignerConfig {
    /// Candidates per source sentence.
    pub k: usize,
    /// Tokens per WMD span.
    pub n_gram: usize,
    /// Tile size of the sharded nearest-neighbor search.
    pub knn_batch_size: usize,
    /// Sentences per embedding call; WMD micro-batches hold
    /// `ceil(align_batch_size / k)` sources with all their candidates.
    pub align_batch_size: usize,
    /// Cosine candidates and ratio-margin mining instead of word centroid distance.
    pub use_cosine: bool,
    /// Candidates per source when mining with word centroid distance.
    pub mining_k: usize,
    pub ground_cost: GroundCost,
    pub solver: TransportSolver,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            k: 20,
            n_gram: 1,
            knn_batch_size: 1_000_000,
            align_batch_size: 5000,
            use_cosine: false,
            mining_k: 1,
            ground_cost: GroundCost::Cosine,
            solver: TransportSolver::Exact,
        }
    }
}

impl AlignerConfig {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero sizes and malformed solver settings.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("k", self.k),
            ("n_gram", self.n_gram),
            ("knn_batch_size", self.knn_batch_size),
            ("align_batch_size", self.align_batch_size),
            ("mining_k", self.mining_k),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(XMoverError::Config(format!("{name} must be positive")));
            }
        }
        if let TransportSolver::Sinkhorn {
            epsilon,
            max_iter,
            tolerance,
            marginal_penalty,
        } = self.solver
        {
            let finite_positive = |x: f64| x > 0.0 && x.is_finite();
            if max_iter == 0
                || !finite_positive(epsilon)
                || !finite_positive(tolerance)
                || !finite_positive(marginal_penalty)
            {
                return Err(XMoverError::Config(
                    "sinkhorn needs positive epsilon, max_iter, tolerance and marginal_penalty"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn strategy(&self) -> CandidateStrategy {
        if self.use_cosine {
            CandidateStrategy::Cosine
        } else {
            CandidateStrategy::WordCentroid
        }
    }

    pub fn wmd(&self) -> WmdConfig {
        WmdConfig {
            n_gram: self.n_gram,
            ground_cost: self.ground_cost,
            solver: self.solver,
        }
    }
}
