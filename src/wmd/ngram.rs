//! n-gram grouping of token embeddings.
//!
//! Consecutive tokens are merged into spans of `n` tokens: the span embedding
//! is the elementwise mean of its members, the span weight is the sum of their
//! weights. Grouping makes the transport operate on short phrases, which
//! softens sub-word tokenization differences between languages.
//!
//! The trailing span may be shorter than `n`; it is kept.

use smallvec::SmallVec;

use crate::embed::SentenceEmbedding;
use crate::error::{Result, XMoverError};
use crate::matrix::EmbeddingMatrix;
use crate::simd;

/// A group of consecutive tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// Token positions in the sentence.
    pub members: SmallVec<[usize; 4]>,
    /// Member tokens joined by a single space.
    pub label: String,
    /// Summed member weight.
    pub weight: f32,
}

/// A sentence regrouped into spans, with one embedding row per span.
#[derive(Debug, Clone, PartialEq)]
pub struct NGrams {
    pub spans: Vec<Span>,
    pub embeddings: EmbeddingMatrix,
}

impl NGrams {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.spans.iter().map(|s| f64::from(s.weight)).sum()
    }

    /// Span weights scaled to sum to 1. `None` when the total is zero.
    pub fn distribution(&self) -> Option<Vec<f64>> {
        let total = self.total_weight();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(
            self.spans
                .iter()
                .map(|s| f64::from(s.weight) / total)
                .collect(),
        )
    }
}

/// Group `sentence` into spans of `n` tokens.
///
/// `n == 1` keeps plain tokens; `n >= len` yields one span for the whole
/// sentence. An empty sentence yields no spans.
pub fn group(sentence: &SentenceEmbedding, n: usize) -> Result<NGrams> {
    if n == 0 {
        return Err(XMoverError::InvalidParameter(
            "n_gram must be positive".to_string(),
        ));
    }

    let dim = sentence.embeddings().dimension();
    let mut spans = Vec::with_capacity(sentence.len().div_ceil(n));
    let mut embeddings = EmbeddingMatrix::empty(dim);

    for start in (0..sentence.len()).step_by(n) {
        let end = (start + n).min(sentence.len());
        let members: SmallVec<[usize; 4]> = (start..end).collect();

        let mut mean = vec![0.0f32; dim];
        let scale = 1.0 / members.len() as f32;
        for &t in &members {
            simd::axpy(&mut mean, scale, sentence.embeddings().row(t));
        }

        let label = sentence.tokens()[start..end].join(" ");
        let weight = sentence.weights()[start..end].iter().sum();
        embeddings.push(&mean)?;
        spans.push(Span {
            members,
            label,
            weight,
        });
    }

    Ok(NGrams { spans, embeddings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(n: usize) -> SentenceEmbedding {
        let tokens: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
        let rows: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 1.0]).collect();
        let weights: Vec<f32> = (0..n).map(|i| (i + 1) as f32).collect();
        SentenceEmbedding::new(tokens, EmbeddingMatrix::from_rows(&rows).unwrap(), weights).unwrap()
    }

    #[test]
    fn bigrams_on_four_tokens_give_two_spans() {
        let g = group(&sentence(4), 2).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.spans[0].label, "t0 t1");
        assert_eq!(g.spans[1].weight, 7.0);
        assert_eq!(g.embeddings.row(1), &[2.5, 1.0]);
    }

    #[test]
    fn trailing_partial_span_is_kept() {
        let g = group(&sentence(5), 2).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.spans[2].members.as_slice(), &[4]);
    }

    #[test]
    fn unigrams_are_tokens() {
        let s = sentence(3);
        let g = group(&s, 1).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(&g.embeddings, s.embeddings());
    }

    #[test]
    fn whole_sentence_span() {
        let g = group(&sentence(3), 3).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.spans[0].weight, 6.0);
        let g = group(&sentence(3), 10).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn zero_n_is_rejected() {
        assert!(group(&sentence(3), 0).is_err());
    }

    #[test]
    fn distribution_sums_to_one() {
        let g = group(&sentence(4), 1).unwrap();
        let d = g.distribution().unwrap();
        assert!((d.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
