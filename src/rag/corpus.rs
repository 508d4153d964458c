//! The searchable corpus: a chunk table and its vector index, kept in lockstep.
//!
//! Position `i` in the index always refers to row `i` of the table. Both
//! artifacts are written together and the index manifest carries the table's
//! fingerprint, so a table edited or rebuilt on its own is rejected at load.

use crate::rag::embeddings::Embedder;
use crate::rag::table::{Chunk, ChunkTable};
use crate::types::{AppError, Result};
use guideline_index::{load_index, save_index, DistanceMetric, FlatIndex, IndexManifest};
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument, warn};

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Distance to the query under the index metric; lower is closer
    pub distance: f32,
    /// 1-based rank in the result list
    pub rank: usize,
    /// Row of the chunk table (and index position)
    pub position: usize,
}

pub struct Corpus {
    table: ChunkTable,
    index: FlatIndex,
    manifest: IndexManifest,
}

impl Corpus {
    /// Embed every chunk and build the index over them.
    ///
    /// Either the whole corpus is built or an error is returned; no partial
    /// index is produced.
    #[instrument(skip(table, embedder), fields(chunks = table.len(), model = embedder.model_id()))]
    pub async fn build(
        table: ChunkTable,
        embedder: &dyn Embedder,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if table.is_empty() {
            return Err(AppError::InvalidState(
                "cannot build an index from an empty chunk table".to_string(),
            ));
        }

        let embeddings = embedder.encode(&table.texts()).await?;
        if embeddings.len() != table.len() {
            return Err(AppError::DataFormat(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                table.len()
            )));
        }

        let index = FlatIndex::build(&embeddings, metric)?;
        let manifest = IndexManifest::new(table.fingerprint(), embedder.model_id());

        info!(
            vectors = index.len(),
            dimensions = index.dimensions(),
            metric = %metric,
            "built corpus index"
        );

        Ok(Self {
            table,
            index,
            manifest,
        })
    }

    /// Persist the chunk table and index side by side.
    pub async fn save(&self, chunks_path: &Path, index_path: &Path) -> Result<()> {
        self.table.write_csv(chunks_path)?;
        save_index(index_path, &self.index, &self.manifest).await?;
        info!(
            chunks = %chunks_path.display(),
            index = %index_path.display(),
            "saved corpus"
        );
        Ok(())
    }

    /// Load a corpus written by [`Corpus::save`].
    pub async fn load(chunks_path: &Path, index_path: &Path) -> Result<Self> {
        if !index_path.exists() {
            return Err(AppError::InvalidState(format!(
                "index not found: {} (run `guideline-rag index` first)",
                index_path.display()
            )));
        }

        let table = ChunkTable::read_csv(chunks_path)?;
        let (index, manifest) = load_index(index_path).await?;

        if index.len() != table.len() {
            return Err(AppError::DataFormat(format!(
                "index has {} vectors but chunk table has {} rows",
                index.len(),
                table.len()
            )));
        }
        if manifest.fingerprint != table.fingerprint() {
            return Err(AppError::DataFormat(
                "chunk table does not match the table the index was built from; rebuild both"
                    .to_string(),
            ));
        }

        Ok(Self {
            table,
            index,
            manifest,
        })
    }

    /// Embed `query` and return up to `top_k` nearest chunks.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if embedder.model_id() != self.manifest.model {
            warn!(
                index_model = %self.manifest.model,
                query_model = embedder.model_id(),
                "query embedder differs from the model the index was built with"
            );
        }

        let mut embeddings = embedder.encode(&[query.to_string()]).await?;
        let embedding = embeddings.pop().ok_or_else(|| {
            AppError::DataFormat("embedder returned no vector for the query".to_string())
        })?;
        self.search_embedding(&embedding, top_k)
    }

    /// Nearest chunks for an already-embedded query, ascending distance.
    /// Equal distances keep table order.
    pub fn search_embedding(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(AppError::InvalidInput("top_k must be >= 1".to_string()));
        }

        let hits = self.index.search(embedding, top_k)?;
        hits.iter()
            .enumerate()
            .map(|(i, neighbor)| {
                let chunk = self.table.get(neighbor.position).ok_or_else(|| {
                    AppError::Internal(format!(
                        "index position {} has no chunk row",
                        neighbor.position
                    ))
                })?;
                Ok(RetrievedChunk {
                    chunk: chunk.clone(),
                    distance: neighbor.distance,
                    rank: i + 1,
                    position: neighbor.position,
                })
            })
            .collect()
    }

    pub fn table(&self) -> &ChunkTable {
        &self.table
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Embeds each text as its position in a fixed vocabulary of leading words.
    struct KeywordEmbedder;

    const VOCAB: [&str; 4] = ["asthma", "diabetes", "sepsis", "stroke"];

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    VOCAB
                        .iter()
                        .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }

        fn model_id(&self) -> &str {
            "keyword"
        }
    }

    fn table() -> ChunkTable {
        ChunkTable::new(vec![
            Chunk::new("resp.txt", 0, "Asthma: start a reliever."),
            Chunk::new("endo.txt", 0, "Diabetes: check HbA1c every 3 months."),
            Chunk::new("icu.txt", 0, "Sepsis: give antibiotics within 1 hour."),
            Chunk::new("neuro.txt", 0, "Stroke: thrombolysis within 4.5 hours."),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_matching_chunk_first() {
        let corpus = Corpus::build(table(), &KeywordEmbedder, DistanceMetric::Euclidean)
            .await
            .unwrap();

        let hits = corpus.search(&KeywordEmbedder, "sepsis bundle", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.source, "icu.txt");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].rank, 2);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_corpus() {
        let corpus = Corpus::build(table(), &KeywordEmbedder, DistanceMetric::Euclidean)
            .await
            .unwrap();
        let hits = corpus.search(&KeywordEmbedder, "stroke", 50).await.unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn test_ties_keep_table_order() {
        let corpus = Corpus::build(table(), &KeywordEmbedder, DistanceMetric::Euclidean)
            .await
            .unwrap();
        // Query matches nothing: every chunk is at distance 1.
        let hits = corpus.search(&KeywordEmbedder, "gout", 4).await.unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected() {
        let corpus = Corpus::build(table(), &KeywordEmbedder, DistanceMetric::Euclidean)
            .await
            .unwrap();
        let result = corpus.search(&KeywordEmbedder, "asthma", 0).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_table_cannot_build() {
        let result = Corpus::build(
            ChunkTable::default(),
            &KeywordEmbedder,
            DistanceMetric::Euclidean,
        )
        .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_save_and_load_keep_lockstep() {
        let dir = TempDir::new().unwrap();
        let chunks = dir.path().join("chunks.csv");
        let index = dir.path().join("index.bin");

        let corpus = Corpus::build(table(), &KeywordEmbedder, DistanceMetric::Cosine)
            .await
            .unwrap();
        corpus.save(&chunks, &index).await.unwrap();

        let loaded = Corpus::load(&chunks, &index).await.unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.manifest().model, "keyword");
        assert_eq!(loaded.index().metric(), DistanceMetric::Cosine);

        let hits = loaded.search(&KeywordEmbedder, "diabetes", 1).await.unwrap();
        assert_eq!(hits[0].chunk.source, "endo.txt");
    }

    #[tokio::test]
    async fn test_load_rejects_edited_table() {
        let dir = TempDir::new().unwrap();
        let chunks = dir.path().join("chunks.csv");
        let index = dir.path().join("index.bin");

        let corpus = Corpus::build(table(), &KeywordEmbedder, DistanceMetric::Euclidean)
            .await
            .unwrap();
        corpus.save(&chunks, &index).await.unwrap();

        let mut rows = table().rows().to_vec();
        rows[0].text = "Asthma: start a preventer.".to_string();
        ChunkTable::new(rows).unwrap().write_csv(&chunks).unwrap();

        let result = Corpus::load(&chunks, &index).await;
        assert!(matches!(result, Err(AppError::DataFormat(_))));
    }

    #[tokio::test]
    async fn test_load_without_index_is_invalid_state() {
        let dir = TempDir::new().unwrap();
        let result = Corpus::load(&dir.path().join("c.csv"), &dir.path().join("i.bin")).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }
}
