//! Row-major dense matrix of embeddings.
//!
//! Vectors are stored in a single flat buffer (SoA) and addressed by row,
//! the same layout the flat index searches over.

use crate::distance::normalize;
use crate::error::{Result, XMoverError};

/// `N x D` matrix of `f32` embeddings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    dimension: usize,
    rows: usize,
}

impl EmbeddingMatrix {
    /// Empty matrix of the given dimension.
    pub fn empty(dimension: usize) -> Self {
        Self {
            data: Vec::new(),
            dimension,
            rows: 0,
        }
    }

    /// Wrap a flat row-major buffer.
    pub fn from_flat(data: Vec<f32>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            if !data.is_empty() {
                return Err(XMoverError::InvalidParameter(
                    "non-empty buffer with zero dimension".to_string(),
                ));
            }
            return Ok(Self::empty(0));
        }
        if data.len() % dimension != 0 {
            return Err(XMoverError::InvalidParameter(format!(
                "buffer of {} values is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        let rows = data.len() / dimension;
        Ok(Self {
            data,
            dimension,
            rows,
        })
    }

    /// Build from rows. All rows must share the first row's length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let dimension = rows.first().map_or(0, |r| r.as_ref().len());
        let mut m = Self::empty(dimension);
        m.data.reserve(rows.len() * dimension);
        for row in rows {
            m.push(row.as_ref())?;
        }
        Ok(m)
    }

    /// Append one row.
    pub fn push(&mut self, row: &[f32]) -> Result<()> {
        if row.is_empty() {
            return Err(XMoverError::InvalidParameter(
                "zero-dimensional row".to_string(),
            ));
        }
        if self.rows == 0 && self.dimension == 0 {
            self.dimension = row.len();
        }
        if row.len() != self.dimension {
            return Err(XMoverError::DimensionMismatch {
                expected: self.dimension,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Append every row of `other`.
    pub fn extend(&mut self, other: &EmbeddingMatrix) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.rows == 0 && self.dimension == 0 {
            self.dimension = other.dimension;
        }
        if other.dimension != self.dimension {
            return Err(XMoverError::DimensionMismatch {
                expected: self.dimension,
                actual: other.dimension,
            });
        }
        self.data.extend_from_slice(&other.data);
        self.rows += other.rows;
        Ok(())
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row `idx` as a slice. Panics if out of bounds.
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on zero chunk size
        self.data.chunks_exact(self.dimension.max(1)).take(self.rows)
    }

    /// Borrowed view of rows `start..end`.
    pub fn slice_rows(&self, start: usize, end: usize) -> MatrixView<'_> {
        let end = end.min(self.rows);
        let start = start.min(end);
        MatrixView {
            data: &self.data[start * self.dimension..end * self.dimension],
            dimension: self.dimension,
            offset: start,
        }
    }

    pub fn view(&self) -> MatrixView<'_> {
        self.slice_rows(0, self.rows)
    }

    /// Copy with every row scaled to unit L2 norm.
    pub fn normalized(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.iter_rows() {
            data.extend(normalize(row));
        }
        Self {
            data,
            dimension: self.dimension,
            rows: self.rows,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Contiguous block of rows borrowed from an [`EmbeddingMatrix`].
///
/// `offset` is the global index of the first row, so tile-local hits can be
/// mapped back to pre-tiling indices.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: &'a [f32],
    dimension: usize,
    offset: usize,
}

impl<'a> MatrixView<'a> {
    #[inline]
    pub fn rows(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn row(&self, idx: usize) -> &'a [f32] {
        let start = idx * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Split into consecutive tiles of at most `tile_size` rows.
    pub fn tiles(self, tile_size: usize) -> impl Iterator<Item = MatrixView<'a>> {
        let rows = self.rows();
        let tile_size = tile_size.max(1);
        (0..rows).step_by(tile_size).map(move |start| {
            let end = (start + tile_size).min(rows);
            MatrixView {
                data: &self.data[start * self.dimension..end * self.dimension],
                dimension: self.dimension,
                offset: self.offset + start,
            }
        })
    }
}
