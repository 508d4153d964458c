//! LLM client abstractions and provider management
//!
//! This module provides a single-turn text generation interface over two
//! backends:
//! - **Ollama**: local inference through `/api/generate`
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint
//!
//! Decoding is selected once from configuration: a temperature of zero means
//! deterministic decoding, anything above means sampling.

use crate::types::{AppError, Result};
use crate::utils::toml_config::{GenerationConfig, GenerationProviderKind, RagConfig};
use async_trait::async_trait;
use std::time::Duration;

/// Seed sent with deterministic requests so repeated runs agree.
pub const DETERMINISTIC_SEED: u64 = 42;

/// Generic LLM client trait for provider abstraction
///
/// All generation backends implement this trait so the grounded generator can
/// swap them without changing pipeline code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion for a fully rendered prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// How tokens are chosen during generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodingPolicy {
    /// Repeatable output. Backends with beam search use `num_beams`;
    /// the others fall back to greedy decoding with a fixed seed.
    Deterministic { num_beams: u32 },
    /// Single-sequence sampling at the given temperature
    Sampling { temperature: f32 },
}

impl DecodingPolicy {
    /// Temperature `0` selects deterministic decoding.
    pub fn from_temperature(temperature: f32, num_beams: u32) -> Self {
        if temperature > 0.0 {
            DecodingPolicy::Sampling { temperature }
        } else {
            DecodingPolicy::Deterministic {
                num_beams: num_beams.max(1),
            }
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, DecodingPolicy::Deterministic { .. })
    }

    /// Temperature to send to backends that only understand temperature
    pub fn temperature(&self) -> f32 {
        match self {
            DecodingPolicy::Deterministic { .. } => 0.0,
            DecodingPolicy::Sampling { temperature } => *temperature,
        }
    }
}

/// Per-call generation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on generated tokens
    pub max_new_tokens: u32,
    pub policy: DecodingPolicy,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            policy: DecodingPolicy::Deterministic { num_beams: 4 },
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     timeout: Duration::from_secs(120),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        timeout: Duration,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    ///     timeout: Duration::from_secs(120),
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        timeout: Duration,
    },
}

impl Provider {
    /// Select the provider described by `[generation]`
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let generation: &GenerationConfig = &config.generation;
        match generation.provider {
            GenerationProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: generation.base_url.clone(),
                model: generation.model.clone(),
                timeout: generation.timeout(),
            }),
            GenerationProviderKind::OpenAI => {
                let api_key = config.generation_api_key()?.ok_or_else(|| {
                    AppError::InvalidInput(
                        "generation.api_key_env must be set for the openai provider".to_string(),
                    )
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: generation.base_url.clone(),
                    model: generation.model.clone(),
                    timeout: generation.timeout(),
                })
            }
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                timeout,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *timeout,
            )?)),

            Provider::Ollama {
                base_url,
                model,
                timeout,
            } => Ok(Box::new(super::ollama::OllamaClient::new(
                base_url.clone(),
                model.clone(),
                *timeout,
            )?)),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

/// Map a transport failure onto the pipeline taxonomy.
///
/// Connection failures mean the backend is not there at all; everything else
/// (timeouts included) is a failed generation call.
pub(crate) fn classify_transport_error(backend: &str, err: reqwest::Error) -> AppError {
    if err.is_connect() {
        AppError::ModelUnavailable(format!("{} is not reachable: {}", backend, err))
    } else if err.is_timeout() {
        AppError::Generation(format!("{} request timed out: {}", backend, err))
    } else {
        AppError::Generation(format!("{} request failed: {}", backend, err))
    }
}
