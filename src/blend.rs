//! Blending cross-lingual and monolingual scores.
//!
//! The cross-lingual score compares a source sentence with a target sentence
//! directly. The monolingual score first translates the source into the
//! target language, then compares the translation with the target in the
//! target embedding space. The blend interpolates between the two:
//!
//! ```text
//! score = (1 - ratio) * cross_lingual + ratio * monolingual
//! ```

use tracing::info;

use crate::align::Aligner;
use crate::embed::EmbeddingProvider;
use crate::error::{Result, XMoverError};

/// Source-to-target machine translation.
pub trait Translator {
    /// One translation per input sentence, in input order.
    fn translate(&self, sentences: &[String]) -> Result<Vec<String>>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate(&self, sentences: &[String]) -> Result<Vec<String>> {
        (**self).translate(sentences)
    }
}

/// Weighted mix of cross-lingual and translation-based WMD similarity.
#[derive(Debug, Clone)]
pub struct BlendedScorer<P, T> {
    aligner: Aligner<P>,
    translator: T,
    ratio: f32,
}

impl<P: EmbeddingProvider, T: Translator> BlendedScorer<P, T> {
    /// `ratio` is the weight of the monolingual score and must lie in `[0, 1]`.
    pub fn new(aligner: Aligner<P>, translator: T, ratio: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(XMoverError::InvalidParameter(format!(
                "blend ratio {ratio} is outside [0, 1]"
            )));
        }
        Ok(Self {
            aligner,
            translator,
            ratio,
        })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn aligner(&self) -> &Aligner<P> {
        &self.aligner
    }

    /// One blended score per `(source[i], target[i])`.
    pub fn score(&self, source: &[String], target: &[String]) -> Result<Vec<f32>> {
        let cross = self.aligner.score(source, target)?;
        if self.ratio == 0.0 {
            return Ok(cross);
        }

        info!(sentences = source.len(), "translating source sentences");
        let translated = self.translator.translate(source)?;
        if translated.len() != source.len() {
            return Err(XMoverError::Provider(format!(
                "translator returned {} sentences for {}",
                translated.len(),
                source.len()
            )));
        }
        let mono = self.aligner.score_monolingual(&translated, target)?;

        Ok(cross
            .iter()
            .zip(&mono)
            .map(|(x, m)| (1.0 - self.ratio) * x + self.ratio * m)
            .collect())
    }
}
