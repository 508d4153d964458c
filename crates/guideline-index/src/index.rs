//! Flat (exact) nearest-neighbor index.
//!
//! Vectors are stored row-major in a single contiguous buffer. Search scans
//! every row, which is cheap for corpora of hundreds to low thousands of
//! chunks and gives exact results.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{Neighbor, SearchHits};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Exact nearest-neighbor index over fixed-dimension vectors.
///
/// Position `i` always refers to the `i`-th vector added. The index never
/// reorders or removes rows; a rebuild means constructing a new index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    /// Row-major vector storage (`len * dimensions` floats).
    data: Vec<f32>,
    /// Vector dimensions.
    dimensions: usize,
    /// Distance metric.
    metric: DistanceMetric,
}

impl FlatIndex {
    /// Create an empty index.
    ///
    /// # Arguments
    ///
    /// * `dimensions` - Dimensionality of vectors.
    /// * `metric` - Distance metric to use.
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::InvalidVector("Dimensions must be > 0".to_string()));
        }

        Ok(Self {
            data: Vec::new(),
            dimensions,
            metric,
        })
    }

    /// Build an index from an embeddings matrix (one row per vector).
    ///
    /// The dimensionality is taken from the first row; every other row must
    /// match it.
    pub fn build(embeddings: &[Vec<f32>], metric: DistanceMetric) -> Result<Self> {
        let Some(first) = embeddings.first() else {
            return Err(Error::InvalidState(
                "Cannot build an index from an empty embeddings matrix".to_string(),
            ));
        };

        let mut index = Self::new(first.len(), metric)?;
        index.data.reserve(embeddings.len() * first.len());
        index.add_batch(embeddings.iter().map(Vec::as_slice))?;

        debug!(count = index.len(), dimensions = index.dimensions, %metric, "Built flat index");
        Ok(index)
    }

    /// Restore an index from a raw row-major buffer.
    pub(crate) fn from_raw(data: Vec<f32>, dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::Persistence("Stored dimensions are zero".to_string()));
        }
        if data.len() % dimensions != 0 {
            return Err(Error::Persistence(format!(
                "Stored buffer of {} floats is not a multiple of {} dimensions",
                data.len(),
                dimensions
            )));
        }

        Ok(Self {
            data,
            dimensions,
            metric,
        })
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw row-major storage.
    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// Append a vector. Returns its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.validate(vector)?;

        let position = self.len();
        self.data.extend_from_slice(vector);

        trace!(position, "Added vector");
        Ok(position)
    }

    /// Append multiple vectors in order.
    ///
    /// Validation runs over the whole batch first, so a bad row leaves the
    /// index untouched.
    pub fn add_batch<'a, I>(&mut self, vectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let batch: Vec<&[f32]> = vectors.into_iter().collect();

        for (offset, vector) in batch.iter().enumerate() {
            self.validate(vector).map_err(|e| match e {
                Error::InvalidVector(msg) => {
                    Error::InvalidVector(format!("Row {}: {}", self.len() + offset, msg))
                }
                other => other,
            })?;
        }

        for vector in &batch {
            self.data.extend_from_slice(vector);
        }

        debug!(count = batch.len(), "Batch added vectors");
        Ok(batch.len())
    }

    /// Get a stored vector by position.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        self.data.get(start..start + self.dimensions)
    }

    /// Search for the `top_k` nearest vectors.
    ///
    /// Results are in ascending distance order; equal distances keep
    /// ascending position order. Asking for more neighbors than the index
    /// holds returns all of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when the index is empty and
    /// [`Error::DimensionMismatch`] when the query has the wrong length.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<SearchHits> {
        if self.is_empty() {
            return Err(Error::InvalidState(
                "Cannot search an empty index".to_string(),
            ));
        }
        self.validate(query)?;

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: self.metric.distance(query, row),
            })
            .collect();

        neighbors.sort_by(compare_neighbors);
        neighbors.truncate(top_k);

        debug!(top_k, returned = neighbors.len(), "Search completed");
        Ok(SearchHits { neighbors })
    }

    fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        if vector.iter().any(|v| v.is_nan() || v.is_infinite()) {
            return Err(Error::InvalidVector(
                "Vector contains NaN or Inf".to_string(),
            ));
        }

        Ok(())
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}
