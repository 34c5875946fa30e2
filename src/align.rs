//! Sentence alignment: coarse candidate retrieval, then WMD re-ranking.
//!
//! ```text
//! sentences -> mean-pooled vectors -> sharded KNN -> top-k candidates
//!           -> token embeddings of (source, candidates) -> WMD -> best pair
//! ```
//!
//! The aligner owns no mutable state. The embedding provider and the optional
//! projection are fixed at construction, and every call recomputes what it
//! needs from its inputs.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{AlignerConfig, CandidateStrategy};
use crate::embed::{
    embed_side, EmbeddingBatch, EmbeddingProvider, Projection, SentenceEmbedding, Side,
};
use crate::error::{Result, XMoverError};
use crate::knn::{cosine_align, wcd_align};
use crate::margin::ratio_margin_align;
use crate::matrix::EmbeddingMatrix;
use crate::wmd::{wmd_align, wmd_scores};

/// An aligned `(source, target)` index pair and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentPair {
    pub source: usize,
    pub target: usize,
    pub score: f32,
}

/// Cross-lingual sentence aligner over an [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct Aligner<P> {
    provider: P,
    config: AlignerConfig,
    projection: Option<Projection>,
}

impl<P: EmbeddingProvider> Aligner<P> {
    pub fn new(provider: P, config: AlignerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            projection: None,
        })
    }

    /// Map source-side token embeddings through `projection` before any comparison.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn embed(&self, sentences: &[String], side: Side) -> Result<EmbeddingBatch> {
        embed_side(&self.provider, sentences, side, self.projection.as_ref())
    }

    /// One mean-pooled vector per sentence, embedding both corpora in batches
    /// of `align_batch_size`.
    ///
    /// Empty sentences pool to the zero vector. Its width comes from the
    /// side's other sentences, or from the opposite side when every sentence
    /// of this side is empty.
    pub fn mean_pool_embed(
        &self,
        source: &[String],
        target: &[String],
    ) -> Result<(EmbeddingMatrix, EmbeddingMatrix)> {
        let batch = self.config.align_batch_size;
        let mut src_pooled = Pooled::default();
        let mut tgt_pooled = Pooled::default();

        for (n, chunk) in source.chunks(batch).enumerate() {
            src_pooled.extend(&self.embed(chunk, Side::Source)?);
            debug!(done = n * batch + chunk.len(), side = "source", "mean pooling batch");
        }
        for (n, chunk) in target.chunks(batch).enumerate() {
            tgt_pooled.extend(&self.embed(chunk, Side::Target)?);
            debug!(done = n * batch + chunk.len(), side = "target", "mean pooling batch");
        }

        let fallback = src_pooled.dimension.or(tgt_pooled.dimension).unwrap_or(1);
        let src = src_pooled.finish(fallback)?;
        let fallback = tgt_pooled.dimension.unwrap_or(src.dimension().max(1));
        let tgt = tgt_pooled.finish(fallback)?;
        Ok((src, tgt))
    }

    /// Top-k candidate targets per source from pooled sentence vectors.
    pub fn candidates(
        &self,
        source: &EmbeddingMatrix,
        target: &EmbeddingMatrix,
        k: usize,
    ) -> Result<Vec<Vec<usize>>> {
        let tile = self.config.knn_batch_size;
        let (candidates, _) = match self.config.strategy() {
            CandidateStrategy::Cosine => cosine_align(source, target, k, tile)?,
            CandidateStrategy::WordCentroid => wcd_align(source, target, k, tile)?,
        };
        Ok(candidates)
    }

    /// WMD re-ranking of `candidates`, embedding `ceil(align_batch_size / k)`
    /// sources and their candidate targets per micro-batch.
    pub fn rerank(
        &self,
        source: &[String],
        target: &[String],
        candidates: &[Vec<usize>],
    ) -> Result<Vec<AlignmentPair>> {
        if candidates.len() != source.len() {
            return Err(XMoverError::InvalidParameter(format!(
                "{} candidate lists for {} source sentences",
                candidates.len(),
                source.len()
            )));
        }
        let k = candidates.iter().map(Vec::len).max().unwrap_or(0);
        if k == 0 {
            return Ok(Vec::new());
        }
        let batch_size = self.config.align_batch_size.div_ceil(k);
        let wmd = self.config.wmd();
        let mut aligned = Vec::with_capacity(source.len());

        for (chunk, (src_sents, cands)) in source
            .chunks(batch_size)
            .zip(candidates.chunks(batch_size))
            .enumerate()
        {
            let offset = chunk * batch_size;
            // Each distinct target is embedded once per micro-batch.
            let mut unique: Vec<usize> = Vec::new();
            let mut position: HashMap<usize, usize> = HashMap::new();
            let mut local = Vec::with_capacity(cands.len());
            for c in cands {
                let mut slots = Vec::with_capacity(c.len());
                for &j in c {
                    if j >= target.len() {
                        return Err(XMoverError::InvalidParameter(format!(
                            "candidate {j} is out of range for {} targets",
                            target.len()
                        )));
                    }
                    let slot = *position.entry(j).or_insert_with(|| {
                        unique.push(j);
                        unique.len() - 1
                    });
                    slots.push(slot);
                }
                local.push(slots);
            }
            let tgt_sents: Vec<String> = unique.iter().map(|&j| target[j].clone()).collect();

            let src_emb = self.embed(src_sents, Side::Source)?;
            let tgt_emb = self.embed(&tgt_sents, Side::Target)?;

            let (pairs, scores) = wmd_align(&src_emb, &tgt_emb, &wmd, &local)?;
            aligned.extend(pairs.into_iter().zip(scores).map(|((s, t), score)| {
                AlignmentPair {
                    source: s + offset,
                    target: unique[t],
                    score,
                }
            }));
            debug!(
                sources = offset + src_sents.len(),
                targets_embedded = unique.len(),
                "wmd micro-batch"
            );
        }
        Ok(aligned)
    }

    /// Index-level alignment: best WMD-scored candidate per source sentence.
    #[instrument(skip_all, fields(source = source.len(), target = target.len()))]
    pub fn align_indices(&self, source: &[String], target: &[String]) -> Result<Vec<AlignmentPair>> {
        if source.is_empty() || target.is_empty() {
            return Ok(Vec::new());
        }
        info!("obtaining sentence embeddings");
        let (src_pooled, tgt_pooled) = self.mean_pool_embed(source, target)?;
        info!(strategy = ?self.config.strategy(), "searching for nearest neighbors");
        let candidates = self.candidates(&src_pooled, &tgt_pooled, self.config.k)?;
        info!("filtering candidates with word mover's distance");
        self.rerank(source, target, &candidates)
    }

    /// Align each source sentence to a target sentence.
    ///
    /// Returns `(source_text, target_text)` pairs in source order and their
    /// WMD similarities.
    pub fn align(
        &self,
        source: &[String],
        target: &[String],
    ) -> Result<(Vec<(String, String)>, Vec<f32>)> {
        let aligned = self.align_indices(source, target)?;
        let pairs = aligned
            .iter()
            .map(|p| (source[p.source].clone(), target[p.target].clone()))
            .collect();
        let scores = aligned.iter().map(|p| p.score).collect();
        Ok((pairs, scores))
    }

    /// Mine pseudo-parallel pairs.
    ///
    /// With `use_cosine`, pairs come from ratio-margin scoring of pooled vectors.
    /// Otherwise the `mining_k` nearest word centroids are re-ranked with WMD.
    #[instrument(skip_all, fields(source = source.len(), target = target.len()))]
    pub fn mine(&self, source: &[String], target: &[String]) -> Result<Vec<AlignmentPair>> {
        if source.is_empty() || target.is_empty() {
            return Ok(Vec::new());
        }
        info!("obtaining sentence embeddings");
        let (src_pooled, tgt_pooled) = self.mean_pool_embed(source, target)?;
        if self.config.use_cosine {
            info!("mining pseudo parallel data with ratio margin");
            let (pairs, scores) = ratio_margin_align(
                &src_pooled,
                &tgt_pooled,
                self.config.k,
                self.config.knn_batch_size,
            )?;
            Ok(pairs
                .into_iter()
                .zip(scores)
                .map(|((source, target), score)| AlignmentPair {
                    source,
                    target,
                    score,
                })
                .collect())
        } else {
            info!("mining pseudo parallel data with word centroid distance");
            let (candidates, _) = wcd_align(
                &src_pooled,
                &tgt_pooled,
                self.config.mining_k,
                self.config.knn_batch_size,
            )?;
            info!("computing exact word mover's distances for candidates");
            self.rerank(source, target, &candidates)
        }
    }

    /// One cross-lingual WMD similarity per `(source[i], target[i])`.
    pub fn score(&self, source: &[String], target: &[String]) -> Result<Vec<f32>> {
        let src = self.embed(source, Side::Source)?;
        let tgt = self.embed(target, Side::Target)?;
        wmd_scores(&src, &tgt, &self.config.wmd())
    }

    /// Like [`Aligner::score`], with both sides in the target language (no projection).
    pub fn score_monolingual(&self, hypotheses: &[String], target: &[String]) -> Result<Vec<f32>> {
        let src = self.embed(hypotheses, Side::Target)?;
        let tgt = self.embed(target, Side::Target)?;
        wmd_scores(&src, &tgt, &self.config.wmd())
    }

    /// Fraction of reference pairs recovered after shuffling the targets.
    ///
    /// `reference_target[i]` is the translation of `reference_source[i]`.
    pub fn accuracy(
        &self,
        reference_source: &[String],
        reference_target: &[String],
        seed: u64,
    ) -> Result<f64> {
        if reference_source.len() != reference_target.len() {
            return Err(XMoverError::InvalidParameter(format!(
                "{} reference sources but {} reference targets",
                reference_source.len(),
                reference_target.len()
            )));
        }
        if reference_source.is_empty() {
            return Ok(0.0);
        }
        let mut shuffled = reference_target.to_vec();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        let aligned = self.align_indices(reference_source, &shuffled)?;
        let hits = aligned
            .iter()
            .filter(|p| shuffled[p.target] == reference_target[p.source])
            .count();
        Ok(hits as f64 / reference_source.len() as f64)
    }
}

/// Pooled vectors of one side; empty sentences wait for a known width.
#[derive(Default)]
struct Pooled {
    vectors: Vec<Option<Vec<f32>>>,
    dimension: Option<usize>,
}

impl Pooled {
    fn extend(&mut self, bundles: &[SentenceEmbedding]) {
        for bundle in bundles {
            let dim = bundle.embeddings().dimension();
            if self.dimension.is_none() && dim > 0 {
                self.dimension = Some(dim);
            }
            self.vectors.push(bundle.mean_pool());
        }
    }

    fn finish(self, fallback: usize) -> Result<EmbeddingMatrix> {
        let dimension = self.dimension.unwrap_or(fallback);
        let zero = vec![0.0f32; dimension];
        let mut matrix = EmbeddingMatrix::empty(dimension);
        for vector in &self.vectors {
            matrix.push(vector.as_deref().unwrap_or(&zero))?;
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::StaticEmbedder;
    use std::collections::HashMap;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn embedder() -> StaticEmbedder {
        let mut table = HashMap::new();
        for (word, v) in [
            ("a", [1.0, 0.0, 0.0]),
            ("b", [0.0, 1.0, 0.0]),
            ("c", [0.0, 0.0, 1.0]),
            ("d", [0.7, 0.7, 0.0]),
        ] {
            table.insert(word.to_string(), v.to_vec());
        }
        StaticEmbedder::shared(3, table).unwrap()
    }

    fn config(k: usize) -> AlignerConfig {
        AlignerConfig {
            k,
            knn_batch_size: 2,
            align_batch_size: 3,
            ..AlignerConfig::default()
        }
    }

    #[test]
    fn aligns_identical_corpora_to_themselves() {
        let aligner = Aligner::new(embedder(), config(2)).unwrap();
        let src = strings(&["a b", "c", "d a", "b c"]);
        let (pairs, scores) = aligner.align(&src, &src).unwrap();
        assert_eq!(pairs.len(), 4);
        for ((s, t), score) in pairs.iter().zip(&scores) {
            assert_eq!(s, t);
            assert!((score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn micro_batches_map_indices_back() {
        // k = 3 and align_batch_size = 3 gives one source per micro-batch.
        let aligner = Aligner::new(embedder(), config(3)).unwrap();
        let src = strings(&["a", "b", "c"]);
        let tgt = strings(&["c", "a", "b"]);
        let aligned = aligner.align_indices(&src, &tgt).unwrap();
        let targets: Vec<usize> = aligned.iter().map(|p| p.target).collect();
        assert_eq!(targets, vec![1, 2, 0]);
        let sources: Vec<usize> = aligned.iter().map(|p| p.source).collect();
        assert_eq!(sources, vec![0, 1, 2]);
    }

    #[test]
    fn empty_corpora_align_to_nothing() {
        let aligner = Aligner::new(embedder(), config(2)).unwrap();
        let (pairs, scores) = aligner.align(&[], &strings(&["a"])).unwrap();
        assert!(pairs.is_empty() && scores.is_empty());
        assert!(aligner.mine(&strings(&["a"]), &[]).unwrap().is_empty());
    }

    #[test]
    fn score_is_parallel() {
        let aligner = Aligner::new(embedder(), config(2)).unwrap();
        let scores = aligner
            .score(&strings(&["a b", "c"]), &strings(&["a b", "a"]))
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 1.0).abs() < 1e-5);
        assert!(scores[1].abs() < 1e-5);
    }

    #[test]
    fn mining_with_both_strategies() {
        let src = strings(&["a", "b", "c"]);
        let tgt = strings(&["b", "c", "a"]);
        for use_cosine in [true, false] {
            let cfg = AlignerConfig {
                use_cosine,
                ..config(2)
            };
            let aligner = Aligner::new(embedder(), cfg).unwrap();
            let mined = aligner.mine(&src, &tgt).unwrap();
            let targets: Vec<usize> = mined.iter().map(|p| p.target).collect();
            assert_eq!(targets, vec![2, 0, 1], "use_cosine = {use_cosine}");
        }
    }

    #[test]
    fn accuracy_on_a_clean_corpus_is_perfect() {
        let aligner = Aligner::new(embedder(), config(2)).unwrap();
        let src = strings(&["a", "b", "c", "d"]);
        let acc = aligner.accuracy(&src, &src, 7).unwrap();
        assert!((acc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn projection_changes_cross_lingual_scores_only() {
        let aligner = Aligner::new(embedder(), config(1))
            .unwrap()
            .with_projection(Projection::Removal(vec![1.0, 0.0, 0.0]));
        let s = strings(&["d"]);
        let cross = aligner.score(&s, &s).unwrap();
        let mono = aligner.score_monolingual(&s, &s).unwrap();
        assert!(cross[0] < 0.99);
        assert!((mono[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_sentences_pool_to_zero() {
        let aligner = Aligner::new(embedder(), config(1)).unwrap();
        let (src, tgt) = aligner
            .mean_pool_embed(&strings(&["", "a b"]), &strings(&["c"]))
            .unwrap();
        assert_eq!(src.rows(), 2);
        assert_eq!(src.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(src.row(1), &[0.5, 0.5, 0.0]);
        assert_eq!(tgt.rows(), 1);
    }

    #[test]
    fn batching_does_not_change_pooling() {
        let src = strings(&["a", "b c", "d", "a d", "c"]);
        let small = Aligner::new(embedder(), config(1)).unwrap();
        let large = Aligner::new(
            embedder(),
            AlignerConfig {
                align_batch_size: 100,
                ..config(1)
            },
        )
        .unwrap();
        assert_eq!(
            small.mean_pool_embed(&src, &src).unwrap(),
            large.mean_pool_embed(&src, &src).unwrap()
        );
    }

    struct Counting {
        inner: StaticEmbedder,
        targets: std::cell::Cell<usize>,
    }

    impl EmbeddingProvider for Counting {
        fn embed(&self, sentences: &[String], side: Side) -> Result<EmbeddingBatch> {
            if side == Side::Target {
                self.targets.set(self.targets.get() + sentences.len());
            }
            self.inner.embed(sentences, side)
        }
    }

    #[test]
    fn shared_candidates_are_embedded_once_per_micro_batch() {
        let counting = Counting {
            inner: embedder(),
            targets: std::cell::Cell::new(0),
        };
        let cfg = AlignerConfig {
            k: 2,
            align_batch_size: 100,
            ..AlignerConfig::default()
        };
        let aligner = Aligner::new(&counting, cfg).unwrap();
        let src = strings(&["a", "a b", "a d"]);
        let tgt = strings(&["a", "b"]);
        let aligned = aligner.align_indices(&src, &tgt).unwrap();
        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned[0].target, 0);
        // Two targets pooled, then the same two re-embedded for WMD.
        assert_eq!(counting.targets.get(), 4);
    }
}
