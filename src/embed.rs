//! The boundary with embedding collaborators.
//!
//! The core never runs a language model. It consumes, per sentence, the token
//! strings, one embedding row per token, and one importance weight per token,
//! bundled as a [`SentenceEmbedding`]. Anything that can produce those bundles
//! implements [`EmbeddingProvider`] and plugs into the [`crate::Aligner`].
//!
//! Cross-lingual projections are plain values ([`Projection`]) handed to
//! [`embed_side`] at call time; providers themselves stay stateless.

use std::collections::HashMap;

use crate::error::{Result, XMoverError};
use crate::matrix::EmbeddingMatrix;
use crate::simd;

/// Which corpus a batch belongs to.
///
/// Dictionary-based providers keep one table per language. A translated source
/// sentence is already in the target language and is embedded as `Target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

/// One sentence's tokens with their embeddings and weights.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceEmbedding {
    tokens: Vec<String>,
    embeddings: EmbeddingMatrix,
    weights: Vec<f32>,
}

impl SentenceEmbedding {
    /// Bundle a sentence. Lengths must agree and weights must be finite and
    /// non-negative.
    pub fn new(tokens: Vec<String>, embeddings: EmbeddingMatrix, weights: Vec<f32>) -> Result<Self> {
        Self::for_sentence(0, tokens, embeddings, weights)
    }

    /// Like [`SentenceEmbedding::new`], reporting `sentence` in errors.
    pub fn for_sentence(
        sentence: usize,
        tokens: Vec<String>,
        embeddings: EmbeddingMatrix,
        weights: Vec<f32>,
    ) -> Result<Self> {
        if tokens.len() != embeddings.rows() || tokens.len() != weights.len() {
            return Err(XMoverError::ShapeMismatch {
                sentence,
                tokens: tokens.len(),
                embeddings: embeddings.rows(),
                weights: weights.len(),
            });
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(XMoverError::InvalidParameter(format!(
                "sentence {sentence} has weight {w}; weights must be finite and non-negative"
            )));
        }
        Ok(Self {
            tokens,
            embeddings,
            weights,
        })
    }

    /// Bundle with the default weight of 1.0 per token.
    pub fn uniform(tokens: Vec<String>, embeddings: EmbeddingMatrix) -> Result<Self> {
        let weights = vec![1.0; tokens.len()];
        Self::new(tokens, embeddings, weights)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Mean of the token embeddings over valid positions.
    ///
    /// Every token the provider returned is valid; weights do not enter the
    /// pooling. Returns `None` for an empty sentence.
    pub fn mean_pool(&self) -> Option<Vec<f32>> {
        if self.is_empty() {
            return None;
        }
        let mut acc = vec![0.0f32; self.embeddings.dimension()];
        let scale = 1.0 / self.len() as f32;
        for row in self.embeddings.iter_rows() {
            simd::axpy(&mut acc, scale, row);
        }
        Some(acc)
    }

    fn project(&mut self, projection: &Projection) -> Result<()> {
        let mut projected = EmbeddingMatrix::empty(projection.output_dimension());
        for row in self.embeddings.iter_rows() {
            projected.push(&projection.apply(row)?)?;
        }
        self.embeddings = projected;
        Ok(())
    }
}

/// Embeddings for a batch of sentences, in input order.
pub type EmbeddingBatch = Vec<SentenceEmbedding>;

/// Anything that turns sentences into token-level embedding bundles.
///
/// Implementations must return exactly one bundle per input sentence, and an
/// empty batch for empty input.
pub trait EmbeddingProvider {
    fn embed(&self, sentences: &[String], side: Side) -> Result<EmbeddingBatch>;
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for &P {
    fn embed(&self, sentences: &[String], side: Side) -> Result<EmbeddingBatch> {
        (**self).embed(sentences, side)
    }
}

/// Learned cross-lingual mapping applied to source-side token embeddings.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `x -> x W` with `W` of shape `D_in x D_out` (cross-lingual projection).
    Linear(EmbeddingMatrix),
    /// `x -> x - (x . u) u`, removing the direction `u` (language-direction removal).
    Removal(Vec<f32>),
}

impl Projection {
    fn input_dimension(&self) -> usize {
        match self {
            Projection::Linear(w) => w.rows(),
            Projection::Removal(u) => u.len(),
        }
    }

    fn output_dimension(&self) -> usize {
        match self {
            Projection::Linear(w) => w.dimension(),
            Projection::Removal(u) => u.len(),
        }
    }

    /// Map one vector.
    pub fn apply(&self, x: &[f32]) -> Result<Vec<f32>> {
        if x.len() != self.input_dimension() {
            return Err(XMoverError::DimensionMismatch {
                expected: self.input_dimension(),
                actual: x.len(),
            });
        }
        Ok(match self {
            Projection::Linear(w) => {
                let mut out = vec![0.0f32; w.dimension()];
                for (xi, row) in x.iter().zip(w.iter_rows()) {
                    simd::axpy(&mut out, *xi, row);
                }
                out
            }
            Projection::Removal(u) => {
                let along = simd::dot(x, u);
                x.iter().zip(u).map(|(xi, ui)| xi - along * ui).collect()
            }
        })
    }
}

/// Embed one side, checking the provider contract and applying `projection`
/// to source-side bundles.
pub fn embed_side<P: EmbeddingProvider + ?Sized>(
    provider: &P,
    sentences: &[String],
    side: Side,
    projection: Option<&Projection>,
) -> Result<EmbeddingBatch> {
    if sentences.is_empty() {
        return Ok(Vec::new());
    }
    let mut batch = provider.embed(sentences, side)?;
    if batch.len() != sentences.len() {
        return Err(XMoverError::Provider(format!(
            "provider returned {} embeddings for {} sentences",
            batch.len(),
            sentences.len()
        )));
    }
    if let (Side::Source, Some(projection)) = (side, projection) {
        for bundle in &mut batch {
            bundle.project(projection)?;
        }
    }
    Ok(batch)
}

/// Static word-embedding provider backed by per-language lookup tables.
///
/// Tokens are whitespace-separated words. Unknown words map to the zero vector
/// and every token has weight 1.0.
#[derive(Debug, Clone)]
pub struct StaticEmbedder {
    dimension: usize,
    source: HashMap<String, Vec<f32>>,
    target: HashMap<String, Vec<f32>>,
}

impl StaticEmbedder {
    /// One table per side. All vectors must have length `dimension`.
    pub fn new(
        dimension: usize,
        source: HashMap<String, Vec<f32>>,
        target: HashMap<String, Vec<f32>>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(XMoverError::InvalidParameter(
                "dimension must be positive".to_string(),
            ));
        }
        for v in source.values().chain(target.values()) {
            if v.len() != dimension {
                return Err(XMoverError::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
        }
        Ok(Self {
            dimension,
            source,
            target,
        })
    }

    /// A single table shared by both sides (already-aligned multilingual space).
    pub fn shared(dimension: usize, table: HashMap<String, Vec<f32>>) -> Result<Self> {
        Self::new(dimension, table.clone(), table)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn table(&self, side: Side) -> &HashMap<String, Vec<f32>> {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }
}

impl EmbeddingProvider for StaticEmbedder {
    fn embed(&self, sentences: &[String], side: Side) -> Result<EmbeddingBatch> {
        let table = self.table(side);
        let zero = vec![0.0f32; self.dimension];
        sentences
            .iter()
            .enumerate()
            .map(|(idx, sentence)| {
                let tokens: Vec<String> = sentence.split_whitespace().map(str::to_string).collect();
                let mut embeddings = EmbeddingMatrix::empty(self.dimension);
                for token in &tokens {
                    embeddings.push(table.get(token).unwrap_or(&zero))?;
                }
                let weights = vec![1.0; tokens.len()];
                SentenceEmbedding::for_sentence(idx, tokens, embeddings, weights)
            })
            .collect()
    }
}
