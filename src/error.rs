//! Error types for xmover.

use thiserror::Error;

/// Errors that can occur during search, scoring or alignment.
///
/// Degenerate-but-valid inputs (empty corpora, `k` larger than the corpus,
/// zero-weight sentences) are not errors; they produce empty or zero
/// results instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XMoverError {
    /// Token, embedding and weight sequences of one sentence disagree in length.
    #[error(
        "shape mismatch in sentence {sentence}: {tokens} tokens, {embeddings} embedding rows, {weights} weights"
    )]
    ShapeMismatch {
        sentence: usize,
        tokens: usize,
        embeddings: usize,
        weights: usize,
    },

    /// Vector dimensionality differs from the rest of the run.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An embedding provider or translator failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// The entropic transport solver failed.
    #[error("transport solver error: {0}")]
    Transport(String),

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for XMoverError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, XMoverError>;
