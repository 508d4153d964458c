//! The chunk table: every chunk of the corpus with its provenance.
//!
//! Row order is significant. The vector index stores embeddings in the same
//! order, so row `i` of the table is position `i` of the index. Tables are
//! persisted as CSV with the header `source,chunk_id,text`.

use crate::rag::chunker::TextChunker;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Columns every chunk table must carry.
pub const CHUNK_COLUMNS: [&str; 3] = ["source", "chunk_id", "text"];

/// One retrievable passage of a guideline document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// File name of the originating document
    pub source: String,
    /// 0-based ordinal within `source`
    pub chunk_id: u32,
    pub text: String,
}

impl Chunk {
    pub fn new(source: impl Into<String>, chunk_id: u32, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            chunk_id,
            text: text.into(),
        }
    }
}

/// Ordered, validated collection of chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkTable {
    rows: Vec<Chunk>,
}

impl ChunkTable {
    /// Build a table from rows, rejecting empty text and duplicate
    /// `(source, chunk_id)` pairs.
    pub fn new(rows: Vec<Chunk>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.text.trim().is_empty() {
                return Err(AppError::DataFormat(format!(
                    "row {} ({} chunk {}) has empty text",
                    i, row.source, row.chunk_id
                )));
            }
            if !seen.insert((row.source.as_str(), row.chunk_id)) {
                return Err(AppError::DataFormat(format!(
                    "duplicate chunk ({}, {}) at row {}",
                    row.source, row.chunk_id, i
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Chunk a set of named documents, in the order given.
    pub fn from_documents<'a, I>(documents: I, chunker: &TextChunker) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut rows = Vec::new();
        for (source, text) in documents {
            let chunks = chunker.chunk(text);
            if chunks.is_empty() {
                warn!(source, "document produced no chunks");
            }
            for (i, chunk_text) in chunks.into_iter().enumerate() {
                let chunk_id = u32::try_from(i).map_err(|_| {
                    AppError::InvalidInput(format!("{} produced too many chunks", source))
                })?;
                rows.push(Chunk::new(source, chunk_id, chunk_text));
            }
        }
        Self::new(rows)
    }

    /// Chunk every `*.txt` file in `dir`, in file-name order.
    #[instrument(skip(chunker), fields(dir = %dir.display()))]
    pub fn ingest_dir(dir: &Path, chunker: &TextChunker) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AppError::InvalidInput(format!(
                "documents directory not found: {}",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = fs::read_to_string(path)?;
            debug!(source = %name, chars = text.len(), "read document");
            documents.push((name, text));
        }

        let table = Self::from_documents(
            documents.iter().map(|(s, t)| (s.as_str(), t.as_str())),
            chunker,
        )?;
        info!(documents = files.len(), chunks = table.len(), "chunked corpus");
        Ok(table)
    }

    /// Read a chunk table from CSV.
    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::InvalidState(format!(
                "chunk table not found: {} (run `guideline-rag index` first)",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        for column in CHUNK_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(AppError::DataFormat(format!(
                    "{} is missing column '{}'",
                    path.display(),
                    column
                )));
            }
        }

        let rows = reader
            .deserialize::<Chunk>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(rows)
    }

    /// Write the table as CSV, replacing `path` atomically.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for row in &self.rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// SHA-256 over every row, used to tie an index to the table it was built from.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for row in &self.rows {
            hasher.update(row.source.as_bytes());
            hasher.update([0u8]);
            hasher.update(row.chunk_id.to_le_bytes());
            hasher.update([0u8]);
            hasher.update(row.text.as_bytes());
            hasher.update([b'\n']);
        }
        hex::encode(hasher.finalize())
    }

    pub fn rows(&self) -> &[Chunk] {
        &self.rows
    }

    pub fn get(&self, position: usize) -> Option<&Chunk> {
        self.rows.get(position)
    }

    pub fn texts(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ChunkTable {
        ChunkTable::new(vec![
            Chunk::new("asthma.txt", 0, "Use a reliever inhaler, e.g. \"salbutamol\"."),
            Chunk::new("asthma.txt", 1, "Step up if symptoms persist,\nreview in 4 weeks."),
            Chunk::new("uti.txt", 0, "Nitrofurantoin for 3 days."),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_duplicate_pairs() {
        let result = ChunkTable::new(vec![
            Chunk::new("a.txt", 0, "x"),
            Chunk::new("a.txt", 0, "y"),
        ]);
        assert!(matches!(result, Err(AppError::DataFormat(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_rejects_empty_text() {
        let result = ChunkTable::new(vec![Chunk::new("a.txt", 0, "  ")]);
        assert!(matches!(result, Err(AppError::DataFormat(_))));
    }

    #[test]
    fn test_from_documents_numbers_per_source() {
        let chunker = TextChunker::new(20, 0);
        let table = ChunkTable::from_documents(
            [
                ("a.txt", "First sentence here. Second sentence here."),
                ("b.txt", "Only one."),
            ],
            &chunker,
        )
        .unwrap();

        let ids: Vec<(&str, u32)> = table
            .rows()
            .iter()
            .map(|r| (r.source.as_str(), r.chunk_id))
            .collect();
        assert_eq!(ids, vec![("a.txt", 0), ("a.txt", 1), ("b.txt", 0)]);
    }

    #[test]
    fn test_ingest_dir_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "Beta guideline.").unwrap();
        fs::write(dir.path().join("a.txt"), "Alpha guideline.").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let table = ChunkTable::ingest_dir(dir.path(), &TextChunker::default()).unwrap();
        let sources: Vec<&str> = table.rows().iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_ingest_missing_dir() {
        let result = ChunkTable::ingest_dir(Path::new("/no/such/dir"), &TextChunker::default());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_csv_preserves_rows_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("chunks.csv");
        let table = sample();

        table.write_csv(&path).unwrap();
        let loaded = ChunkTable::read_csv(&path).unwrap();

        assert_eq!(loaded, table);
        assert_eq!(loaded.fingerprint(), table.fingerprint());
    }

    #[test]
    fn test_read_csv_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunks.csv");
        fs::write(&path, "source,text\na.txt,hello\n").unwrap();

        let result = ChunkTable::read_csv(&path);
        assert!(matches!(result, Err(AppError::DataFormat(msg)) if msg.contains("chunk_id")));
    }

    #[test]
    fn test_read_csv_bad_chunk_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunks.csv");
        fs::write(&path, "source,chunk_id,text\na.txt,-1,hello\n").unwrap();

        assert!(matches!(ChunkTable::read_csv(&path), Err(AppError::DataFormat(_))));
    }

    #[test]
    fn test_read_csv_missing_file_is_invalid_state() {
        let result = ChunkTable::read_csv(Path::new("/no/such/chunks.csv"));
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = sample();
        let mut rows = a.rows().to_vec();
        rows[2].text.push('!');
        let b = ChunkTable::new(rows).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
