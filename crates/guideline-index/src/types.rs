//! Common types for guideline-index.

use serde::{Deserialize, Serialize};

/// A single neighbor returned by a search.
///
/// `position` is the ordinal of the vector at build time. The index knows
/// nothing about what the vector represents; callers map positions back to
/// their own rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Build-time ordinal of the matched vector.
    pub position: usize,
    /// Distance to the query (lower = closer).
    pub distance: f32,
}

/// Result of a nearest-neighbor search, ascending by distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    /// Neighbors ordered closest first. Ties keep ascending position order.
    pub neighbors: Vec<Neighbor>,
}

impl SearchHits {
    /// Distances in rank order.
    pub fn distances(&self) -> Vec<f32> {
        self.neighbors.iter().map(|n| n.distance).collect()
    }

    /// Build-time ordinals in rank order.
    pub fn positions(&self) -> Vec<usize> {
        self.neighbors.iter().map(|n| n.position).collect()
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Whether the search returned nothing.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Iterate over neighbors closest first.
    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }
}
