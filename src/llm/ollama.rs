use crate::llm::client::{
    classify_transport_error, DecodingPolicy, GenerationParams, LLMClient, DETERMINISTIC_SEED,
};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> Value {
        // Ollama has no beam search: deterministic means greedy with a fixed seed.
        let options = match params.policy {
            DecodingPolicy::Deterministic { .. } => json!({
                "num_predict": params.max_new_tokens,
                "temperature": 0.0,
                "top_k": 1,
                "seed": DETERMINISTIC_SEED,
            }),
            DecodingPolicy::Sampling { temperature } => json!({
                "num_predict": params.max_new_tokens,
                "temperature": temperature,
            }),
        };

        json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options,
        })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Ollama generate");

        let response = self
            .http_client
            .post(&url)
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(|e| classify_transport_error("Ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Ollama answers 404 when the model has not been pulled
            if status == StatusCode::NOT_FOUND {
                return Err(AppError::ModelUnavailable(format!(
                    "Ollama model '{}' not found: {}",
                    self.model, text
                )));
            }
            return Err(AppError::Generation(format!(
                "Ollama request failed ({}): {}",
                status, text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse Ollama response: {}", e)))?;

        response_json
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Generation("Ollama response has no 'response' field".to_string())
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OllamaClient {
        OllamaClient::new(
            "http://localhost:11434/".to_string(),
            "llama3.2".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "http://localhost:11434");
    }

    #[test]
    fn test_deterministic_body_is_greedy() {
        let params = GenerationParams {
            max_new_tokens: 64,
            policy: DecodingPolicy::Deterministic { num_beams: 4 },
        };
        let body = client().request_body("hi", &params);
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["options"]["num_predict"], json!(64));
        assert_eq!(body["options"]["top_k"], json!(1));
        assert_eq!(body["options"]["seed"], json!(DETERMINISTIC_SEED));
    }

    #[test]
    fn test_sampling_body_has_temperature() {
        let params = GenerationParams {
            max_new_tokens: 32,
            policy: DecodingPolicy::Sampling { temperature: 0.5 },
        };
        let body = client().request_body("hi", &params);
        assert_eq!(body["options"]["temperature"], json!(0.5));
        assert!(body["options"].get("seed").is_none());
    }
}
