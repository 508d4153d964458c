//! Grounded answer generation.
//!
//! The generator renders the assembled context and the question into a fixed
//! instruction template, calls the configured [`LLMClient`] under a timeout,
//! and returns the answer together with the evidence derived from every
//! retrieved row.

use crate::llm::client::{GenerationParams, LLMClient};
use crate::rag::context::{AssembledContext, ContextAssembler};
use crate::rag::corpus::RetrievedChunk;
use crate::types::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// The exact phrase the model is told to use when the context is insufficient.
pub const ABSTAIN_TEXT: &str = "Not enough evidence in the provided guidelines.";

/// Instruction template; `{question}` and `{context}` are substituted.
pub const RAG_PROMPT: &str = r#"You are a clinical question-answering assistant.
Answer ONLY using the information in the CONTEXT. If the answer is not in the context, say:
"Not enough evidence in the provided guidelines."

Rules:
- Be concise and factual.
- Prefer bullet points where helpful.
- Include citations like [source: <file>, chunk: <id>] after the statements they support.
- Do NOT invent facts, medications, or durations not present in the context.
- If multiple options exist, list them with the conditions that apply.

QUESTION:
{question}

CONTEXT:
{context}

Now answer grounded ONLY in the context above.
"#;

/// Substitute question and context into [`RAG_PROMPT`].
///
/// Both slots are filled in a single pass over the template, so placeholder
/// text inside the question or the context is copied through verbatim.
pub fn build_prompt(question: &str, context: &str) -> String {
    let (head, rest) = RAG_PROMPT
        .split_once("{question}")
        .unwrap_or((RAG_PROMPT, ""));
    let (middle, tail) = rest.split_once("{context}").unwrap_or((rest, ""));

    let mut prompt = String::with_capacity(RAG_PROMPT.len() + question.len() + context.len());
    prompt.push_str(head);
    prompt.push_str(question);
    prompt.push_str(middle);
    prompt.push_str(context);
    prompt.push_str(tail);
    prompt
}

/// `"<source> | chunk <id>: <text>"` for a retrieved row.
pub fn evidence_block(hit: &RetrievedChunk) -> String {
    format!(
        "{} | chunk {}: {}",
        hit.chunk.source, hit.chunk.chunk_id, hit.chunk.text
    )
}

/// Answer text plus everything it was grounded on.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    /// One block per retrieved row, not only the rows that fit the context
    pub evidence: Vec<String>,
    pub retrieved: Vec<RetrievedChunk>,
    pub context: AssembledContext,
}

pub struct GroundedGenerator {
    client: Arc<dyn LLMClient>,
    assembler: ContextAssembler,
    params: GenerationParams,
    timeout: Duration,
}

impl GroundedGenerator {
    pub fn new(
        client: Arc<dyn LLMClient>,
        assembler: ContextAssembler,
        params: GenerationParams,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            assembler,
            params,
            timeout,
        }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Generate a grounded answer from ranked rows.
    ///
    /// With no rows the context is empty and the template steers the model
    /// toward abstaining. Backend failures, timeouts and blank output are
    /// errors, never an empty answer.
    #[instrument(skip(self, hits), fields(hits = hits.len(), model = self.client.model_name()))]
    pub async fn answer(&self, question: &str, hits: Vec<RetrievedChunk>) -> Result<GeneratedAnswer> {
        let context = self.assembler.assemble(&hits);
        debug!(
            included = context.included,
            truncated = context.truncated,
            context_chars = context.text.chars().count(),
            "assembled context"
        );

        let prompt = build_prompt(question, &context.text);
        let answer = tokio::time::timeout(self.timeout, self.client.generate(&prompt, &self.params))
            .await
            .map_err(|_| {
                AppError::Generation(format!(
                    "generation timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(AppError::Generation(
                "model returned an empty answer".to_string(),
            ));
        }

        let evidence = hits.iter().map(evidence_block).collect();
        Ok(GeneratedAnswer {
            answer,
            evidence,
            retrieved: hits,
            context,
        })
    }
}
