//! Dense text embeddings.
//!
//! The same [`Embedder`] (and model) must be used to build an index and to
//! query it; the model id is recorded in the index manifest for that reason.

use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingConfig, EmbeddingProviderKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Maps texts to fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;
}

/// Create the embedder described by `[embedding]`
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider {
        EmbeddingProviderKind::Ollama => Ok(Box::new(OllamaEmbedder::new(
            config.base_url.clone(),
            config.model.clone(),
            config.batch_size,
            Duration::from_secs(config.timeout_secs),
        )?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderKind::FastEmbed => Ok(Box::new(local::FastEmbedder::new(
            &config.model,
            config.batch_size,
        )?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProviderKind::FastEmbed => Err(AppError::ModelUnavailable(
            "fastembed support requires the local-embeddings feature".to_string(),
        )),
    }
}

// ============= Ollama =============

/// Embeddings from an Ollama server (`/api/embed`).
pub struct OllamaEmbedder {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String, batch_size: usize, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            batch_size: batch_size.max(1),
        })
    }

    async fn encode_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "model": self.model, "input": batch }))
            .send()
            .await
            .map_err(|e| {
                AppError::ModelUnavailable(format!("Ollama embedding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ModelUnavailable(format!(
                "Ollama embedding model '{}' failed ({}): {}",
                self.model, status, text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::DataFormat(format!("Failed to parse embedding response: {}", e))
        })?;

        let embeddings: Vec<Vec<f32>> = body
            .get("embeddings")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AppError::DataFormat(format!("Malformed embeddings: {}", e)))?
            .ok_or_else(|| {
                AppError::DataFormat("embedding response has no 'embeddings' field".to_string())
            })?;

        if embeddings.len() != batch.len() {
            return Err(AppError::DataFormat(format!(
                "requested {} embeddings, received {}",
                batch.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "embedding batch");
            out.extend(self.encode_batch(batch).await?);
        }
        Ok(out)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============= FastEmbed (local) =============

#[cfg(feature = "local-embeddings")]
mod local {
    use super::Embedder;
    use crate::types::{AppError, Result};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn resolve_model(name: &str) -> Result<EmbeddingModel> {
        match name {
            "all-minilm" | "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                Ok(EmbeddingModel::AllMiniLML6V2)
            }
            "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" | "BAAI/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            other => Err(AppError::ModelUnavailable(format!(
                "unsupported fastembed model: {}",
                other
            ))),
        }
    }

    /// In-process ONNX embeddings via fastembed.
    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        model_id: String,
        batch_size: usize,
    }

    impl FastEmbedder {
        pub fn new(model_name: &str, batch_size: usize) -> Result<Self> {
            let model = TextEmbedding::try_new(
                InitOptions::new(resolve_model(model_name)?).with_show_download_progress(true),
            )
            .map_err(|e| AppError::ModelUnavailable(e.to_string()))?;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                model_id: model_name.to_string(),
                batch_size,
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            let batch_size = self.batch_size;
            tokio::task::spawn_blocking(move || {
                model
                    .lock()
                    .embed(texts, Some(batch_size))
                    .map_err(|e| AppError::ModelUnavailable(e.to_string()))
            })
            .await
            .map_err(|e| AppError::Internal(format!("embedding task failed: {}", e)))?
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;
