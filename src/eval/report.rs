//! CSV input and output for batch evaluation.

use crate::eval::evaluator::{EvaluationQuestion, EvaluationRecord, EvaluationReport};
use crate::types::{AppError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the per-question report inside the outputs directory.
pub const RESULTS_FILE: &str = "eval_results.csv";
/// File name of the per-chunk evidence report.
pub const EVIDENCE_FILE: &str = "eval_evidence.csv";

/// Header of [`RESULTS_FILE`].
pub const RESULT_COLUMNS: [&str; 11] = [
    "question",
    "gold",
    "answer",
    "has_citation",
    "abstained",
    "rougeL_f",
    "bleu",
    "numbers_in_answer",
    "numbers_not_in_evidence",
    "evidence_used",
    "error",
];
/// Header of [`EVIDENCE_FILE`].
pub const EVIDENCE_COLUMNS: [&str; 6] = ["eval_row", "rank", "source", "chunk_id", "distance", "text"];

/// Read a question table with a `question` column and an optional `gold` column.
pub fn read_questions(path: &Path) -> Result<Vec<EvaluationQuestion>> {
    if !path.exists() {
        return Err(AppError::InvalidInput(format!(
            "questions file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    if !reader.headers()?.iter().any(|h| h == "question") {
        return Err(AppError::DataFormat(format!(
            "{} has no 'question' column",
            path.display()
        )));
    }

    let questions = reader
        .deserialize::<EvaluationQuestion>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(questions)
}

#[derive(Serialize)]
struct ResultRow<'a> {
    question: &'a str,
    gold: &'a str,
    answer: &'a str,
    has_citation: bool,
    abstained: bool,
    #[serde(rename = "rougeL_f")]
    rouge_l_f: Option<f64>,
    bleu: Option<f64>,
    numbers_in_answer: String,
    numbers_not_in_evidence: String,
    evidence_used: &'a str,
    error: &'a str,
}

impl<'a> From<&'a EvaluationRecord> for ResultRow<'a> {
    fn from(record: &'a EvaluationRecord) -> Self {
        Self {
            question: &record.question,
            gold: record.gold.as_deref().unwrap_or_default(),
            answer: &record.answer,
            has_citation: record.has_citation,
            abstained: record.abstained,
            rouge_l_f: record.rouge_l_f,
            bleu: record.bleu,
            numbers_in_answer: record.numbers_in_answer.join(", "),
            numbers_not_in_evidence: record.numbers_not_in_evidence.join(", "),
            evidence_used: &record.evidence_used,
            error: record.error.as_deref().unwrap_or_default(),
        }
    }
}

/// Serialize `rows` to `path`. An empty table still gets its header line,
/// since csv only derives headers from the first record.
fn write_rows<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write both reports into `dir`, returning their paths.
pub fn write_report(dir: &Path, report: &EvaluationReport) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let results_path = dir.join(RESULTS_FILE);
    let evidence_path = dir.join(EVIDENCE_FILE);

    write_rows(
        &results_path,
        &RESULT_COLUMNS,
        report.records.iter().map(ResultRow::from),
    )?;
    write_rows(&evidence_path, &EVIDENCE_COLUMNS, report.evidence.iter())?;

    Ok((results_path, evidence_path))
}
