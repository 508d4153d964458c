//! Persistence layer for guideline-index.
//!
//! An index is written as a single opaque blob:
//!
//! ```text
//! b"GLIX" | format version (u32 LE) | postcard(StoredIndex)
//! ```
//!
//! The blob carries a caller-supplied fingerprint so that whoever owns the
//! position-to-row mapping can check it was built from the same rows.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::FlatIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"GLIX";
const FORMAT_VERSION: u32 = 1;

/// Descriptive header stored next to the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Opaque fingerprint of whatever the positions refer to.
    pub fingerprint: String,
    /// Identifier of the model that produced the vectors.
    pub model: String,
    /// When the index was built.
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    /// Create a manifest stamped with the current time.
    pub fn new(fingerprint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            model: model.into(),
            built_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIndex {
    manifest: IndexManifest,
    dimensions: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
}

/// Save an index and its manifest to `path`.
///
/// The blob is written to a sibling temporary file and renamed into place,
/// so a reader never observes a half-written index.
pub async fn save_index(path: &Path, index: &FlatIndex, manifest: &IndexManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let stored = StoredIndex {
        manifest: manifest.clone(),
        dimensions: index.dimensions(),
        metric: index.metric(),
        vectors: index.raw().to_vec(),
    };

    let payload = postcard::to_allocvec(&stored)
        .map_err(|e| Error::Persistence(format!("Failed to serialize index: {}", e)))?;

    let mut blob = Vec::with_capacity(MAGIC.len() + 4 + payload.len());
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(&payload);

    let tmp_path = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(&blob).await?;
    file.flush().await?;
    drop(file);
    tokio::fs::rename(&tmp_path, path).await?;

    info!(path = %path.display(), vectors = index.len(), bytes = blob.len(), "Saved index");
    Ok(())
}

/// Load an index and its manifest from `path`.
pub async fn load_index(path: &Path) -> Result<(FlatIndex, IndexManifest)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut blob = Vec::new();
    file.read_to_end(&mut blob).await?;

    if blob.len() < MAGIC.len() + 4 || &blob[..MAGIC.len()] != MAGIC {
        return Err(Error::Persistence(format!(
            "{} is not an index file",
            path.display()
        )));
    }

    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&blob[MAGIC.len()..MAGIC.len() + 4]);
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(Error::Persistence(format!(
            "Unsupported index format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let stored: StoredIndex = postcard::from_bytes(&blob[MAGIC.len() + 4..])
        .map_err(|e| Error::Persistence(format!("Failed to parse index: {}", e)))?;

    let index = FlatIndex::from_raw(stored.vectors, stored.dimensions, stored.metric)?;
    debug!(path = %path.display(), vectors = index.len(), "Loaded index");

    Ok((index, stored.manifest))
}
