//! Exact nearest-neighbor search over sentence-embedding matrices.
//!
//! - [`flat`]: brute-force per-tile index (the `IndexFlat` of the pipeline)
//! - [`sharded`]: tiled search with a global top-k merge
//!
//! Two candidate strategies sit on top:
//!
//! - [`cosine_align`]: cosine similarity between mean-pooled sentence vectors
//! - [`wcd_align`]: word centroid distance, i.e. Euclidean distance between the
//!   same vectors. WCD lower-bounds Word Mover's Distance, which makes it the
//!   natural pre-filter for WMD re-ranking.

pub mod flat;
pub mod sharded;

pub use flat::FlatIndex;
pub use sharded::{knn_exact, knn_sharded};

use crate::distance::Similarity;
use crate::error::Result;
use crate::matrix::EmbeddingMatrix;

/// Row-aligned top-k tables: `rows x width` similarities and global indices.
///
/// Every row has the same `width = min(k, M)`, sorted by descending similarity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Neighbors {
    width: usize,
    rows: usize,
    similarities: Vec<f32>,
    indices: Vec<usize>,
}

impl Neighbors {
    /// `rows` queries with no neighbors each.
    pub fn empty(rows: usize) -> Self {
        Self {
            width: 0,
            rows,
            similarities: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub(crate) fn from_parts(width: usize, similarities: Vec<f32>, indices: Vec<usize>) -> Self {
        debug_assert_eq!(similarities.len(), indices.len());
        let rows = if width == 0 { 0 } else { indices.len() / width };
        Self {
            width,
            rows,
            similarities,
            indices,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Similarities of query `row`, descending.
    pub fn similarities(&self, row: usize) -> &[f32] {
        &self.similarities[row * self.width..(row + 1) * self.width]
    }

    /// Global target indices of query `row`, aligned with [`Neighbors::similarities`].
    pub fn indices(&self, row: usize) -> &[usize] {
        &self.indices[row * self.width..(row + 1) * self.width]
    }

    /// Mean top-k similarity of each query. Queries without neighbors get 0.
    pub fn mean_similarities(&self) -> Vec<f32> {
        (0..self.rows)
            .map(|i| {
                let sims = self.similarities(i);
                if sims.is_empty() {
                    0.0
                } else {
                    sims.iter().sum::<f32>() / sims.len() as f32
                }
            })
            .collect()
    }

    /// Candidate lists, one `Vec` per query.
    pub fn candidates(&self) -> Vec<Vec<usize>> {
        (0..self.rows).map(|i| self.indices(i).to_vec()).collect()
    }
}

/// Top-`k` targets per source sentence by cosine similarity.
///
/// Returns `(candidates, neighbors)`; the candidate lists are similarity-descending.
pub fn cosine_align(
    source: &EmbeddingMatrix,
    target: &EmbeddingMatrix,
    k: usize,
    tile_size: usize,
) -> Result<(Vec<Vec<usize>>, Neighbors)> {
    let neighbors = knn_sharded(source, target, k, tile_size, Similarity::Cosine)?;
    Ok((neighbors.candidates(), neighbors))
}

/// Top-`k` targets per source sentence by word centroid distance.
///
/// Similarities in the returned [`Neighbors`] are negated Euclidean distances.
pub fn wcd_align(
    source: &EmbeddingMatrix,
    target: &EmbeddingMatrix,
    k: usize,
    tile_size: usize,
) -> Result<(Vec<Vec<usize>>, Neighbors)> {
    let neighbors = knn_sharded(source, target, k, tile_size, Similarity::NegativeL2)?;
    Ok((neighbors.candidates(), neighbors))
}
