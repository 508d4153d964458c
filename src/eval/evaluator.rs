//! Per-question and batch grounding evaluation.

use crate::eval::metrics::{has_citation, is_abstention, numeric_consistency, text_metrics};
use crate::rag::corpus::RetrievedChunk;
use crate::rag::generation::GeneratedAnswer;
use crate::rag::pipeline::RagPipeline;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EvaluationConfig, FailurePolicy};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Anything that can answer a question from `top_k` retrieved chunks.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn answer(&self, question: &str, top_k: usize) -> Result<GeneratedAnswer>;
}

#[async_trait]
impl AnswerSource for RagPipeline {
    async fn answer(&self, question: &str, top_k: usize) -> Result<GeneratedAnswer> {
        self.ask(question, top_k).await
    }
}

/// One row of the batch input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationQuestion {
    pub question: String,
    #[serde(default)]
    pub gold: Option<String>,
}

impl EvaluationQuestion {
    pub fn new(question: impl Into<String>, gold: Option<&str>) -> Self {
        Self {
            question: question.into(),
            gold: gold.map(str::to_string),
        }
    }

    /// Gold reference, if present and non-blank.
    pub fn gold(&self) -> Option<&str> {
        self.gold.as_deref().filter(|g| !g.trim().is_empty())
    }
}

/// Evaluation result for a single question.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationRecord {
    pub question: String,
    pub gold: Option<String>,
    pub answer: String,
    pub has_citation: bool,
    pub abstained: bool,
    pub numbers_in_answer: Vec<String>,
    pub numbers_in_evidence: Vec<String>,
    pub numbers_not_in_evidence: Vec<String>,
    /// Only set when a gold reference was given
    pub rouge_l_f: Option<f64>,
    pub bleu: Option<f64>,
    /// Evidence blocks, newline-joined
    pub evidence_used: String,
    /// Set when the question could not be answered
    pub error: Option<String>,
}

impl EvaluationRecord {
    /// Record standing in for a question whose pipeline call failed.
    pub fn failed(question: &EvaluationQuestion, err: &AppError) -> Self {
        Self {
            question: question.question.clone(),
            gold: question.gold.clone(),
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// One retrieved chunk of one evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRow {
    /// 0-based row of the evaluation report this chunk belongs to
    pub eval_row: usize,
    pub rank: usize,
    pub source: String,
    pub chunk_id: u32,
    pub distance: f32,
    pub text: String,
}

impl EvidenceRow {
    fn from_hit(eval_row: usize, hit: &RetrievedChunk) -> Self {
        Self {
            eval_row,
            rank: hit.rank,
            source: hit.chunk.source.clone(),
            chunk_id: hit.chunk.chunk_id,
            distance: hit.distance,
            text: hit.chunk.text.clone(),
        }
    }
}

/// Evaluate one question end to end.
pub async fn evaluate_one(
    question: &EvaluationQuestion,
    source: &dyn AnswerSource,
    top_k: usize,
) -> Result<(EvaluationRecord, Vec<RetrievedChunk>)> {
    let generated = source.answer(&question.question, top_k).await?;
    let record = score_answer(question, &generated);
    Ok((record, generated.retrieved))
}

/// Compute every metric for a generated answer.
pub fn score_answer(question: &EvaluationQuestion, generated: &GeneratedAnswer) -> EvaluationRecord {
    let answer = generated.answer.as_str();
    let numbers = numeric_consistency(answer, &generated.evidence);
    let similarity = question.gold().map(|gold| text_metrics(answer, gold));

    EvaluationRecord {
        question: question.question.clone(),
        gold: question.gold.clone(),
        answer: answer.to_string(),
        has_citation: has_citation(answer),
        abstained: is_abstention(answer),
        numbers_in_answer: numbers.numbers_in_answer,
        numbers_in_evidence: numbers.numbers_in_evidence,
        numbers_not_in_evidence: numbers.numbers_not_in_evidence,
        rouge_l_f: similarity.map(|m| m.rouge_l_f),
        bleu: similarity.map(|m| m.bleu),
        evidence_used: generated.evidence.join("\n"),
        error: None,
    }
}

/// Aggregate figures over a report.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EvaluationSummary {
    pub total: usize,
    pub failed: usize,
    pub with_citation: usize,
    pub abstained: usize,
    /// Answers with at least one number missing from the evidence
    pub unsupported_numbers: usize,
    pub mean_rouge_l_f: Option<f64>,
    pub mean_bleu: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Evaluation and evidence tables for a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub records: Vec<EvaluationRecord>,
    pub evidence: Vec<EvidenceRow>,
}

impl EvaluationReport {
    pub fn summary(&self) -> EvaluationSummary {
        let answered = || self.records.iter().filter(|r| !r.is_failed());
        EvaluationSummary {
            total: self.records.len(),
            failed: self.records.iter().filter(|r| r.is_failed()).count(),
            with_citation: answered().filter(|r| r.has_citation).count(),
            abstained: answered().filter(|r| r.abstained).count(),
            unsupported_numbers: answered()
                .filter(|r| !r.numbers_not_in_evidence.is_empty())
                .count(),
            mean_rouge_l_f: mean(answered().filter_map(|r| r.rouge_l_f)),
            mean_bleu: mean(answered().filter_map(|r| r.bleu)),
        }
    }
}

/// Runs a batch of questions with a failure policy and bounded concurrency.
#[derive(Debug, Clone)]
pub struct Evaluator {
    top_k: usize,
    failure_policy: FailurePolicy,
    concurrency: usize,
}

impl Evaluator {
    pub fn new(top_k: usize, failure_policy: FailurePolicy, concurrency: usize) -> Self {
        Self {
            top_k,
            failure_policy,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(config.top_k, config.failure_policy, config.concurrency)
    }

    /// Evaluate every question. Records and evidence rows follow input order
    /// whatever the concurrency.
    ///
    /// Under [`FailurePolicy::Record`] a failing question yields a record with
    /// `error` set and no evidence rows; under [`FailurePolicy::FailFast`] the
    /// first failure (in input order) aborts the batch.
    #[instrument(skip(self, questions, source), fields(questions = questions.len(), policy = ?self.failure_policy))]
    pub async fn evaluate_batch(
        &self,
        questions: &[EvaluationQuestion],
        source: &dyn AnswerSource,
    ) -> Result<EvaluationReport> {
        let top_k = self.top_k;
        let mut results = stream::iter(questions.iter().enumerate())
            .map(|(row, question)| async move {
                (row, question, evaluate_one(question, source, top_k).await)
            })
            .buffered(self.concurrency);

        let mut report = EvaluationReport::default();
        while let Some((row, question, outcome)) = results.next().await {
            match outcome {
                Ok((record, hits)) => {
                    report
                        .evidence
                        .extend(hits.iter().map(|hit| EvidenceRow::from_hit(row, hit)));
                    report.records.push(record);
                }
                Err(err) => match self.failure_policy {
                    FailurePolicy::FailFast => {
                        warn!(row, error = %err, "evaluation aborted");
                        return Err(err);
                    }
                    FailurePolicy::Record => {
                        warn!(row, error = %err, "question failed; recorded in report");
                        report.records.push(EvaluationRecord::failed(question, &err));
                    }
                },
            }
        }

        let summary = report.summary();
        info!(
            total = summary.total,
            failed = summary.failed,
            with_citation = summary.with_citation,
            abstained = summary.abstained,
            "evaluation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::context::AssembledContext;
    use crate::rag::generation::ABSTAIN_TEXT;
    use crate::rag::table::Chunk;

    fn generated(answer: &str, evidence: &[&str]) -> GeneratedAnswer {
        GeneratedAnswer {
            answer: answer.to_string(),
            evidence: evidence.iter().map(|s| s.to_string()).collect(),
            retrieved: vec![RetrievedChunk {
                chunk: Chunk::new("hcv.txt", 0, "Treat for 12 weeks."),
                distance: 0.25,
                rank: 1,
                position: 0,
            }],
            context: AssembledContext {
                text: String::new(),
                included: 0,
                truncated: false,
            },
        }
    }

    #[test]
    fn test_score_answer_flags() {
        let question = EvaluationQuestion::new("How long?", None);
        let record = score_answer(
            &question,
            &generated(
                "Treat for 12 weeks [source: hcv.txt, chunk: 0] with 90% cure rate",
                &["hcv.txt | chunk 0: Treat for 12 weeks."],
            ),
        );

        assert!(record.has_citation);
        assert!(!record.abstained);
        assert_eq!(record.numbers_not_in_evidence, vec!["90%"]);
        assert_eq!(record.rouge_l_f, None);
        assert_eq!(record.bleu, None);
        assert_eq!(record.evidence_used, "hcv.txt | chunk 0: Treat for 12 weeks.");
    }

    #[test]
    fn test_abstention_record() {
        let question = EvaluationQuestion::new("Dose for X?", Some("   "));
        let record = score_answer(&question, &generated(ABSTAIN_TEXT, &[]));

        assert!(record.abstained);
        assert!(!record.has_citation);
        assert!(record.numbers_in_answer.is_empty());
        // Blank gold is treated as absent
        assert_eq!(record.rouge_l_f, None);
    }

    #[test]
    fn test_similarity_with_gold() {
        let question = EvaluationQuestion::new("How long?", Some("Treat for 12 weeks."));
        let record = score_answer(&question, &generated("Treat for 12 weeks.", &[]));
        assert!((record.rouge_l_f.unwrap() - 1.0).abs() < 1e-9);
        assert!(record.bleu.unwrap() > 0.0);
    }

    #[test]
    fn test_from_config_takes_policy_and_clamps_concurrency() {
        let evaluator = Evaluator::from_config(&EvaluationConfig {
            top_k: 3,
            failure_policy: FailurePolicy::FailFast,
            concurrency: 0,
        });
        assert_eq!(evaluator.top_k, 3);
        assert_eq!(evaluator.failure_policy, FailurePolicy::FailFast);
        assert_eq!(evaluator.concurrency, 1);
    }

    #[test]
    fn test_summary_skips_failed_rows() {
        let ok = EvaluationRecord {
            has_citation: true,
            rouge_l_f: Some(0.5),
            ..EvaluationRecord::default()
        };
        let failed = EvaluationRecord::failed(
            &EvaluationQuestion::new("q", None),
            &AppError::Generation("down".to_string()),
        );
        let report = EvaluationReport {
            records: vec![ok, failed],
            evidence: Vec::new(),
        };

        let summary = report.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.with_citation, 1);
        assert_eq!(summary.mean_rouge_l_f, Some(0.5));
        assert_eq!(summary.mean_bleu, None);
    }
}
