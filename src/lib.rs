//! # guideline-rag
//!
//! Grounded question answering over a fixed clinical guideline corpus.
//!
//! ## Overview
//!
//! Cleaned guideline text is split into overlapping, sentence-respecting
//! chunks, embedded, and stored in an exact vector index. At query time the
//! closest chunks are packed into a bounded context and handed to a text
//! generator instructed to answer only from that context, cite its sources,
//! and abstain with a fixed phrase when the evidence is insufficient. Batches
//! of questions can then be scored for citations, abstention and numbers that
//! do not appear in the retrieved evidence.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use guideline_rag::{RagConfig, RagPipeline};
//!
//! #[tokio::main]
//! async fn main() -> guideline_rag::Result<()> {
//!     let config = RagConfig::load("guideline-rag.toml")?;
//!     let pipeline = RagPipeline::from_config(&config).await?;
//!
//!     let answer = pipeline.ask("How long is treatment for genotype 1?", 6).await?;
//!     println!("{}", answer.answer);
//!     for block in &answer.evidence {
//!         println!("  {}", block);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Building a corpus
//!
//! ```rust,ignore
//! use guideline_rag::rag::{chunker::TextChunker, corpus::Corpus, table::ChunkTable};
//!
//! let table = ChunkTable::ingest_dir(&config.paths.documents, &TextChunker::new(500, 50))?;
//! let corpus = Corpus::build(table, embedder.as_ref(), config.retrieval.metric).await?;
//! corpus.save(&config.paths.chunks, &config.paths.index).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-embeddings` | In-process embeddings with fastembed instead of Ollama |
//!
//! ## Modules
//!
//! - [`rag`] - Chunking, chunk table, embeddings, corpus index, context, generation
//! - [`llm`] - Text generation clients (Ollama, OpenAI-compatible)
//! - [`eval`] - Grounding metrics and batch evaluation
//! - [`utils`] - TOML configuration
//! - [`types`] - Error taxonomy
//! - [`cli`] - Command-line interface

/// Command-line interface.
pub mod cli;
/// Grounding metrics, batch evaluation and reports.
pub mod eval;
/// Text generation clients.
pub mod llm;
/// Retrieval-augmented generation pipeline.
pub mod rag;
/// Error taxonomy.
pub mod types;
/// Configuration.
pub mod utils;

pub use eval::{EvaluationRecord, EvaluationReport, Evaluator};
pub use guideline_index::{DistanceMetric, FlatIndex};
pub use llm::{LLMClient, Provider};
pub use rag::corpus::{Corpus, RetrievedChunk};
pub use rag::embeddings::Embedder;
pub use rag::generation::{GeneratedAnswer, GroundedGenerator};
pub use rag::pipeline::RagPipeline;
pub use types::{AppError, Result};
pub use utils::toml_config::RagConfig;
