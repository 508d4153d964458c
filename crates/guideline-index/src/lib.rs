//! # guideline-index
//!
//! A pure-Rust exact nearest-neighbor index for dense embeddings.
//!
//! The index is a geometric structure only: it stores vectors in insertion
//! order and answers "which positions are closest to this query". It has no
//! knowledge of the text the vectors were computed from; callers keep the
//! position-to-row correspondence established at build time.
//!
//! ## Quick Start
//!
//! ```rust
//! use guideline_index::{DistanceMetric, FlatIndex};
//!
//! let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
//! let index = FlatIndex::build(&embeddings, DistanceMetric::Euclidean)?;
//!
//! let hits = index.search(&[0.9, 0.1], 1)?;
//! assert_eq!(hits.positions(), vec![0]);
//! # Ok::<(), guideline_index::Error>(())
//! ```
//!
//! ## Persistence
//!
//! [`save_index`] and [`load_index`] write and read a single binary blob that
//! also carries an [`IndexManifest`] (fingerprint, model id, build time).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use index::FlatIndex;
pub use persistence::{load_index, save_index, IndexManifest};
pub use types::{Neighbor, SearchHits};
