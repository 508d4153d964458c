//! Distance metrics for exact nearest-neighbor search.
//!
//! Every metric is expressed as a distance where **lower means closer**, so the
//! flat index can rank all of them with the same ascending comparator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance metric used to rank neighbors.
///
/// - **Euclidean**: straight-line (L2) distance, the default for guideline
///   corpora embedded with sentence-transformer style models.
/// - **Cosine**: `1 - cos(a, b)`, ignores vector magnitude.
/// - **DotProduct**: negated inner product, for pre-normalized vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance.
    ///
    /// Range: [0, ∞), where 0 means identical vectors.
    #[default]
    #[serde(rename = "l2", alias = "euclidean")]
    Euclidean,

    /// Cosine distance (`1 - cosine_similarity`).
    ///
    /// Range: [0, 2], where 0 means identical direction.
    #[serde(rename = "cosine")]
    Cosine,

    /// Negated dot product.
    ///
    /// Range: (-∞, ∞), lower means more aligned.
    #[serde(rename = "dot", alias = "dot_product")]
    DotProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors. Lower is closer.
    ///
    /// Both slices must have the same length; the index validates dimensions
    /// before calling this.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "l2",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" | "euclid" => Ok(DistanceMetric::Euclidean),
            "cosine" | "cos" => Ok(DistanceMetric::Cosine),
            "dot" | "dot_product" | "inner" => Ok(DistanceMetric::DotProduct),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

// ============================================================================
// Distance Functions
// ============================================================================

#[inline]
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;

    let chunks = a.len() / 4;
    let remainder = a.len() % 4;

    for i in 0..chunks {
        let base = i * 4;
        let d0 = a[base] - b[base];
        let d1 = a[base + 1] - b[base + 1];
        let d2 = a[base + 2] - b[base + 2];
        let d3 = a[base + 3] - b[base + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }

    let start = chunks * 4;
    for idx in start..start + remainder {
        let d = a[idx] - b[idx];
        sum += d * d;
    }

    sum.sqrt()
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();

    let denom = norm_a * norm_b;
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
