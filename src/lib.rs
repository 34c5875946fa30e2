//! xmover: cross-lingual sentence alignment and scoring.
//!
//! Given token-level embeddings for sentences in two languages, xmover finds
//! likely translation pairs and scores how well a candidate translation
//! preserves meaning:
//!
//! - `knn/`: exact sharded nearest-neighbor search over sentence vectors
//! - `margin`: ratio-margin scoring for mining parallel sentences
//! - `wmd/`: Word Mover's Distance (n-gram grouping, optimal transport)
//! - `align`: the orchestrator tying retrieval and re-ranking together
//! - `mining`, `evaluation`: filtering mined pairs, correlating with judgements
//!
//! Language models stay outside the crate. Anything that produces token
//! embeddings implements [`EmbeddingProvider`].
//!
//! ```rust
//! use std::collections::HashMap;
//! use xmover::{Aligner, AlignerConfig, StaticEmbedder};
//!
//! let mut table = HashMap::new();
//! table.insert("Hund".to_string(), vec![1.0, 0.1]);
//! table.insert("dog".to_string(), vec![0.9, 0.2]);
//! table.insert("cat".to_string(), vec![0.1, 1.0]);
//! let embedder = StaticEmbedder::shared(2, table).unwrap();
//!
//! let aligner = Aligner::new(embedder, AlignerConfig { k: 2, ..Default::default() }).unwrap();
//! let (pairs, _) = aligner
//!     .align(&["Hund".to_string()], &["cat".to_string(), "dog".to_string()])
//!     .unwrap();
//! assert_eq!(pairs[0].1, "dog");
//! ```
//!
//! # Critical Nuances
//!
//! ## The Hubness Problem
//!
//! In high-dimensional spaces, some vectors become **hubs**: they appear as
//! nearest neighbors of many other points, while **antihubs** rarely appear
//! in any neighbor list. Nearest-neighbor relations become asymmetric.
//!
//! Points near the global centroid dominate because pairwise distances
//! concentrate. For mining this is fatal: a hub target gets matched to many
//! unrelated sources. The ratio margin in [`margin`] divides by the average
//! neighborhood similarity of both endpoints, which penalizes hubs.
//!
//! ## Word centroid distance
//!
//! The Euclidean distance between mean-pooled sentence vectors lower-bounds
//! WMD. Retrieving candidates by it and re-ranking with exact WMD keeps the
//! expensive transport problem to `k` solves per source sentence.
//!
//! ## When Exact Search Beats Approximate
//!
//! Candidate retrieval runs once per corpus pair over sentence vectors, and
//! recall matters more than latency. Exact tiled search is used throughout.

pub mod align;
pub mod blend;
pub mod config;
pub mod distance;
pub mod embed;
pub mod error;
pub mod evaluation;
pub mod knn;
pub mod margin;
pub mod matrix;
pub mod mining;
pub mod simd;
pub mod wmd;

// Re-exports
pub use align::{Aligner, AlignmentPair};
pub use blend::{BlendedScorer, Translator};
pub use config::{AlignerConfig, CandidateStrategy};
pub use distance::{GroundCost, Similarity};
pub use embed::{
    EmbeddingBatch, EmbeddingProvider, Projection, SentenceEmbedding, Side, StaticEmbedder,
};
pub use error::{Result, XMoverError};
pub use knn::{cosine_align, knn_exact, knn_sharded, wcd_align, Neighbors};
pub use margin::{ratio_margin_align, score_candidates};
pub use matrix::EmbeddingMatrix;
pub use mining::{filter_pairs, MiningFilter};
pub use wmd::{wmd_align, wmd_score, wmd_scores, TransportPlan, TransportSolver, WmdConfig};
