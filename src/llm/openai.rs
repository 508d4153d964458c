use crate::llm::client::{
    classify_transport_error, DecodingPolicy, GenerationParams, LLMClient, DETERMINISTIC_SEED,
};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAIClient {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": params.max_new_tokens,
            "temperature": params.policy.temperature(),
        });
        if let DecodingPolicy::Deterministic { .. } = params.policy {
            body["seed"] = json!(DETERMINISTIC_SEED);
        }
        body
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        debug!(model = %self.model, prompt_chars = prompt.len(), "OpenAI chat completion");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(|e| classify_transport_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                    AppError::ModelUnavailable(format!(
                        "OpenAI model '{}' unavailable ({}): {}",
                        self.model, status, text
                    ))
                }
                _ => AppError::Generation(format!("OpenAI API error ({}): {}", status, text)),
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse OpenAI response: {}", e)))?;

        response_json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Generation("No response from OpenAI".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_deterministic() {
        let client = OpenAIClient::new(
            "sk-test".to_string(),
            "https://api.openai.com/v1/".to_string(),
            "gpt-4o-mini".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        let body = client.request_body(
            "question",
            &GenerationParams {
                max_new_tokens: 100,
                policy: DecodingPolicy::Deterministic { num_beams: 4 },
            },
        );

        assert_eq!(client.api_base, "https://api.openai.com/v1");
        assert_eq!(body["messages"][0]["content"], json!("question"));
        assert_eq!(body["max_tokens"], json!(100));
        assert_eq!(body["temperature"], json!(0.0));
        assert_eq!(body["seed"], json!(DETERMINISTIC_SEED));
    }
}
