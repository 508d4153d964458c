//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Sentence-aware chunking with word overlap
//! - [`rag::table`](crate::rag::table) - Typed chunk table and its CSV form
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding providers (Ollama, fastembed)
//! - [`rag::corpus`](crate::rag::corpus) - Chunk table + vector index kept in lockstep
//! - [`rag::context`](crate::rag::context) - Budgeted context assembly
//! - [`rag::generation`](crate::rag::generation) - Prompt template and grounded generation
//! - [`rag::pipeline`](crate::rag::pipeline) - Retrieve, assemble, generate
//!
//! # RAG Pipeline
//!
//! 1. **Chunking** - Guideline text files are split into overlapping chunks
//! 2. **Indexing** - Every chunk is embedded and stored in an exact index
//! 3. **Retrieval** - The question is embedded and the nearest chunks ranked
//! 4. **Assembly** - Top-ranked chunks are packed into a bounded context
//! 5. **Generation** - The model answers from that context, with citations
//!
//! # Example
//!
//! ```ignore
//! use guideline_rag::rag::pipeline::RagPipeline;
//!
//! let pipeline = RagPipeline::from_config(&config).await?;
//! let answer = pipeline.ask("First-line treatment for stage 1 hypertension?", 6).await?;
//! println!("{}", answer.answer);
//! ```

pub mod chunker;
pub mod context;
pub mod corpus;
pub mod embeddings;
pub mod generation;
pub mod pipeline;
pub mod table;
