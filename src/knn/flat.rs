//! Exact brute-force index over a block of rows.
//!
//! The flat index is the per-tile search structure of the sharded search:
//! it scores every stored row against the query and keeps the top `k`.

use std::cmp::Ordering;

use crate::distance::Similarity;
use crate::matrix::MatrixView;

/// Exact index over a borrowed block of rows.
///
/// Returned indices are tile-local (`0..rows`); callers add the view's offset.
#[derive(Debug, Clone, Copy)]
pub struct FlatIndex<'a> {
    rows: MatrixView<'a>,
    metric: Similarity,
}

impl<'a> FlatIndex<'a> {
    pub fn new(rows: MatrixView<'a>, metric: Similarity) -> Self {
        Self { rows, metric }
    }

    pub fn len(&self) -> usize {
        self.rows.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top `min(k, len)` rows for `query`, by descending similarity.
    ///
    /// Ties are broken by lower row index, so the result is deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let k = k.min(self.len());
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| (i, self.metric.similarity(query, self.rows.row(i))))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_similarity_desc);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_similarity_desc);
        scored
    }
}

/// Descending similarity, then ascending index. A total order.
#[inline]
pub(crate) fn by_similarity_desc(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}
