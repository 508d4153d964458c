//! LLM Provider Clients and Abstractions
//!
//! Generation backends sit behind the [`LLMClient`] trait so the grounded
//! generator never depends on a specific provider.
//!
//! # Supported Providers
//!
//! - `ollama` - Local Ollama server (`/api/generate`)
//! - `openai` - OpenAI API and compatible servers (`/chat/completions`)
//!
//! # Example
//!
//! ```ignore
//! use guideline_rag::llm::{GenerationParams, Provider};
//!
//! let client = Provider::from_config(&config)?.create_client()?;
//! let text = client.generate("What is 2+2?", &GenerationParams::default()).await?;
//! ```

/// Core LLM client trait, decoding policy and provider selection.
pub mod client;
/// Ollama backend.
pub mod ollama;
/// OpenAI-compatible backend.
pub mod openai;

pub use client::{DecodingPolicy, GenerationParams, LLMClient, Provider};
