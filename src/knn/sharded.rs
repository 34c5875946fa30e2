//! Tiled exact k-nearest-neighbor search.
//!
//! Both matrices are cut into row tiles of at most `tile_size` rows. Every
//! source tile is searched against every target tile with a [`FlatIndex`],
//! and the per-target-tile partial lists are merged into one global top-k per
//! query. Peak memory is bounded by the tile size rather than `N x M`.
//!
//! Tiling never changes the answer: the global top-k is always contained in
//! the union of per-tile top-k lists, and the stable merge keeps the
//! lower-index-first tie-break of the flat index.
//!
//! Source tiles are independent, so they are processed on the rayon pool
//! and concatenated in tile order afterwards.

use std::borrow::Cow;

use rayon::prelude::*;
use tracing::debug;

use super::flat::{by_similarity_desc, FlatIndex};
use super::Neighbors;
use crate::distance::Similarity;
use crate::error::{Result, XMoverError};
use crate::matrix::{EmbeddingMatrix, MatrixView};

/// Sharded exact search of `source` rows against `target` rows.
///
/// Returns `min(k, M)` neighbors per source row, sorted by descending
/// similarity. Either matrix empty yields an empty result.
pub fn knn_sharded(
    source: &EmbeddingMatrix,
    target: &EmbeddingMatrix,
    k: usize,
    tile_size: usize,
    metric: Similarity,
) -> Result<Neighbors> {
    if k == 0 {
        return Err(XMoverError::InvalidParameter("k must be positive".to_string()));
    }
    if tile_size == 0 {
        return Err(XMoverError::InvalidParameter(
            "tile size must be positive".to_string(),
        ));
    }
    if source.is_empty() || target.is_empty() {
        return Ok(Neighbors::empty(source.rows()));
    }
    check_dimensions(source, target)?;

    // Cosine is inner product over unit vectors; normalize copies, never the inputs.
    let (source, target, metric) = prepare(source, target, metric);
    let width = k.min(target.rows());

    let tiles: Vec<MatrixView<'_>> = source.view().tiles(tile_size).collect();
    debug!(
        source_tiles = tiles.len(),
        target_rows = target.rows(),
        tile_size,
        k,
        "sharded knn"
    );

    let partials: Vec<(Vec<f32>, Vec<usize>)> = tiles
        .par_iter()
        .map(|x_tile| search_tile(*x_tile, &target, k, width, tile_size, metric))
        .collect();

    let mut similarities = Vec::with_capacity(source.rows() * width);
    let mut indices = Vec::with_capacity(source.rows() * width);
    for (sims, inds) in partials {
        similarities.extend(sims);
        indices.extend(inds);
    }
    Ok(Neighbors::from_parts(width, similarities, indices))
}

/// Untiled brute-force search, the reference [`knn_sharded`] must agree with.
pub fn knn_exact(
    source: &EmbeddingMatrix,
    target: &EmbeddingMatrix,
    k: usize,
    metric: Similarity,
) -> Result<Neighbors> {
    if k == 0 {
        return Err(XMoverError::InvalidParameter("k must be positive".to_string()));
    }
    if source.is_empty() || target.is_empty() {
        return Ok(Neighbors::empty(source.rows()));
    }
    check_dimensions(source, target)?;

    let (source, target, metric) = prepare(source, target, metric);
    let width = k.min(target.rows());
    let mut similarities = Vec::with_capacity(source.rows() * width);
    let mut indices = Vec::with_capacity(source.rows() * width);
    for query in source.iter_rows() {
        let mut scored: Vec<(usize, f32)> = target
            .iter_rows()
            .enumerate()
            .map(|(j, row)| (j, metric.similarity(query, row)))
            .collect();
        scored.sort_by(by_similarity_desc);
        for (j, s) in scored.into_iter().take(width) {
            indices.push(j);
            similarities.push(s);
        }
    }
    Ok(Neighbors::from_parts(width, similarities, indices))
}

fn check_dimensions(source: &EmbeddingMatrix, target: &EmbeddingMatrix) -> Result<()> {
    if source.dimension() != target.dimension() {
        return Err(XMoverError::DimensionMismatch {
            expected: source.dimension(),
            actual: target.dimension(),
        });
    }
    Ok(())
}

fn prepare<'a>(
    source: &'a EmbeddingMatrix,
    target: &'a EmbeddingMatrix,
    metric: Similarity,
) -> (Cow<'a, EmbeddingMatrix>, Cow<'a, EmbeddingMatrix>, Similarity) {
    match metric {
        Similarity::Cosine => (
            Cow::Owned(source.normalized()),
            Cow::Owned(target.normalized()),
            Similarity::InnerProduct,
        ),
        other => (Cow::Borrowed(source), Cow::Borrowed(target), other),
    }
}

/// One source tile against all target tiles; returns row-major `width` columns.
fn search_tile(
    x_tile: MatrixView<'_>,
    target: &EmbeddingMatrix,
    k: usize,
    width: usize,
    tile_size: usize,
    metric: Similarity,
) -> (Vec<f32>, Vec<usize>) {
    let mut merged: Vec<Vec<(usize, f32)>> = vec![Vec::new(); x_tile.rows()];

    for y_tile in target.view().tiles(tile_size) {
        let index = FlatIndex::new(y_tile, metric);
        let neighbor_size = k.min(y_tile.rows());
        for (q, partial) in merged.iter_mut().enumerate() {
            let hits = index.search(x_tile.row(q), neighbor_size);
            partial.extend(hits.into_iter().map(|(j, s)| (j + y_tile.offset(), s)));
        }
    }

    let mut sims = Vec::with_capacity(x_tile.rows() * width);
    let mut inds = Vec::with_capacity(x_tile.rows() * width);
    for mut partial in merged {
        // Stable: later tiles were appended after earlier ones.
        partial.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (j, s) in partial.into_iter().take(width) {
            inds.push(j);
            sims.push(s);
        }
    }
    (sims, inds)
}
