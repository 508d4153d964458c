//! Grounding Evaluation
//!
//! Scores generated answers for citation presence, abstention, numbers not
//! backed by the retrieved evidence and, when a gold answer is available,
//! ROUGE-L and BLEU similarity. Batches are read from and written to CSV.

/// Per-question scoring and batch runner.
pub mod evaluator;
/// Citation, abstention, numeric and similarity metrics.
pub mod metrics;
/// Question table input and report output.
pub mod report;

pub use evaluator::{
    evaluate_one, AnswerSource, EvaluationQuestion, EvaluationRecord, EvaluationReport,
    EvaluationSummary, Evaluator, EvidenceRow,
};
