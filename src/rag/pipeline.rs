//! Query-time pipeline: retrieve, assemble, generate.

use crate::llm::client::{LLMClient, Provider};
use crate::rag::context::ContextAssembler;
use crate::rag::corpus::{Corpus, RetrievedChunk};
use crate::rag::embeddings::{create_embedder, Embedder};
use crate::rag::generation::{GeneratedAnswer, GroundedGenerator};
use crate::types::Result;
use crate::utils::toml_config::RagConfig;
use std::sync::Arc;
use tracing::{info, instrument};

/// Read-only handle over a loaded corpus plus the models that query it.
///
/// Nothing here is mutated after construction, so one pipeline can serve
/// many concurrent questions.
pub struct RagPipeline {
    corpus: Arc<Corpus>,
    embedder: Arc<dyn Embedder>,
    generator: GroundedGenerator,
}

impl RagPipeline {
    pub fn new(corpus: Arc<Corpus>, embedder: Arc<dyn Embedder>, generator: GroundedGenerator) -> Self {
        Self {
            corpus,
            embedder,
            generator,
        }
    }

    /// Load the persisted corpus and connect the configured models.
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let corpus = Corpus::load(&config.paths.chunks, &config.paths.index).await?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let provider = Provider::from_config(config)?;
        let client: Arc<dyn LLMClient> = Arc::from(provider.create_client()?);

        let generator = GroundedGenerator::new(
            client,
            ContextAssembler::new(config.generation.max_context_chars),
            config.generation.params(),
            config.generation.timeout(),
        );
        info!(
            chunks = corpus.len(),
            embedder = embedder.model_id(),
            provider = provider.name(),
            generator = generator.model_name(),
            "pipeline ready"
        );
        Ok(Self::new(Arc::new(corpus), embedder, generator))
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Ranked rows for `query`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.corpus.search(self.embedder.as_ref(), query, top_k).await
    }

    /// Retrieve `top_k` rows and generate a grounded answer.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str, top_k: usize) -> Result<GeneratedAnswer> {
        let hits = self.retrieve(question, top_k).await?;
        self.generator.answer(question, hits).await
    }
}
