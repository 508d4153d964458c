//! Mock implementations for testing.
//!
//! Deterministic stand-ins for the embedding and generation backends so the
//! pipeline can be exercised without a model server.

use async_trait::async_trait;
use guideline_rag::llm::{GenerationParams, LLMClient};
use guideline_rag::rag::embeddings::Embedder;
use guideline_rag::types::{AppError, Result};
use parking_lot::Mutex;
use std::time::Duration;

/// Dimensionality of [`HashEmbedder`] vectors.
pub const HASH_DIM: usize = 64;

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Bag-of-words embedder: each lowercased token bumps one hashed bucket and
/// the vector is L2-normalized. Identical texts always embed identically.
#[derive(Clone, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASH_DIM];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[(fnv1a(token) % HASH_DIM as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed(t)).collect())
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }
}

/// Embedder whose backend is always down.
pub struct UnavailableEmbedder;

#[async_trait]
impl Embedder for UnavailableEmbedder {
    async fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::ModelUnavailable("mock embedder offline".to_string()))
    }

    fn model_id(&self) -> &str {
        "offline"
    }
}

/// Scripted generation client.
///
/// Replies are chosen by the first rule whose needle occurs in the prompt's
/// QUESTION section; otherwise the default reply is used. Questions containing
/// `fail_on` produce a generation error. Every prompt is recorded.
pub struct MockGenerator {
    rules: Vec<(String, String)>,
    default_reply: String,
    fail_on: Option<String>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Always reply with `reply`.
    pub fn new(reply: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: reply.to_string(),
            fail_on: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` when the question contains `needle`.
    pub fn with_rule(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), reply.to_string()));
        self
    }

    /// Fail whenever the question contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn question_of(prompt: &str) -> &str {
        prompt
            .split("QUESTION:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nCONTEXT:").next())
            .unwrap_or(prompt)
    }
}

#[async_trait]
impl LLMClient for MockGenerator {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let question = Self::question_of(prompt);
        if let Some(ref needle) = self.fail_on {
            if question.contains(needle.as_str()) {
                return Err(AppError::Generation("Mock LLM failure".to_string()));
            }
        }

        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| question.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone()))
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}
