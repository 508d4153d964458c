//! Grounding and similarity metrics for generated answers.
//!
//! Grounding checks (citation, abstention, numbers) need only the answer and
//! its evidence. Similarity metrics (ROUGE-L, BLEU) compare against a gold
//! reference and are only computed when one is supplied.

use crate::rag::generation::ABSTAIN_TEXT;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[.*source.*\]").expect("citation pattern is valid"));

// Integer or decimal, optional range with '-' or '–', optional trailing '%'.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+(?:\.\d+)?(?:\s*[-–]\s*\d+(?:\.\d+)?)?(?:%|\b)")
        .expect("number pattern is valid")
});

// ============= Grounding =============

/// True when the answer contains a bracketed span mentioning `source`.
pub fn has_citation(answer: &str) -> bool {
    CITATION.is_match(answer)
}

/// True when the abstention phrase occurs anywhere in the answer, ignoring case.
pub fn is_abstention(answer: &str) -> bool {
    answer
        .to_lowercase()
        .contains(&ABSTAIN_TEXT.to_lowercase())
}

/// Distinct numeric tokens in `text`, sorted.
pub fn extract_numbers(text: &str) -> BTreeSet<String> {
    NUMBER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Numbers in the answer checked against numbers in the evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NumericConsistency {
    pub numbers_in_answer: Vec<String>,
    pub numbers_in_evidence: Vec<String>,
    /// Answer numbers with no match in the evidence
    pub numbers_not_in_evidence: Vec<String>,
}

impl NumericConsistency {
    pub fn is_consistent(&self) -> bool {
        self.numbers_not_in_evidence.is_empty()
    }
}

/// Compare answer numbers against the concatenated evidence blocks.
pub fn numeric_consistency(answer: &str, evidence: &[String]) -> NumericConsistency {
    let in_answer = extract_numbers(answer);
    let in_evidence = extract_numbers(&evidence.join("\n"));
    let missing = in_answer.difference(&in_evidence).cloned().collect();

    NumericConsistency {
        numbers_in_answer: in_answer.into_iter().collect(),
        numbers_in_evidence: in_evidence.into_iter().collect(),
        numbers_not_in_evidence: missing,
    }
}

// ============= Similarity =============

/// Similarity of an answer to its gold reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextMetrics {
    /// ROUGE-L F-measure in [0, 1]
    pub rouge_l_f: f64,
    /// BLEU in [0, 100]
    pub bleu: f64,
}

/// Both similarity scores for one answer/reference pair.
pub fn text_metrics(answer: &str, reference: &str) -> TextMetrics {
    TextMetrics {
        rouge_l_f: rouge_l_f(answer, reference),
        bleu: bleu(answer, reference),
    }
}

static ROUGE_STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Lowercased alphanumeric tokens; tokens longer than three characters are stemmed.
fn rouge_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.len() > 3 {
                ROUGE_STEMMER.stem(t).into_owned()
            } else {
                t.to_string()
            }
        })
        .collect()
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F-measure (longest common subsequence, beta = 1).
pub fn rouge_l_f(answer: &str, reference: &str) -> f64 {
    let hyp = rouge_tokens(answer);
    let reference = rouge_tokens(reference);
    if hyp.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let lcs = lcs_len(&hyp, &reference) as f64;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / hyp.len() as f64;
    let recall = lcs / reference.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

const BLEU_MAX_ORDER: usize = 4;

static TOK_PUNCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\{-\~\[-\x60 -\&\(-\+:-@/])").expect("punctuation pattern is valid")
});
static TOK_PERIOD_COMMA_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^0-9])([\.,])").expect("period pattern is valid"));
static TOK_PERIOD_COMMA_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\.,])([^0-9])").expect("period pattern is valid"));
static TOK_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9])(-)").expect("dash pattern is valid"));

/// mteval-v13a style tokenization: punctuation split off, numbers kept whole.
fn bleu_tokens(text: &str) -> Vec<String> {
    let mut line = text
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if line.contains('&') {
        line = line
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }
    let line = TOK_PUNCT.replace_all(&line, " ${1} ");
    let line = TOK_PERIOD_COMMA_AFTER.replace_all(&line, "${1} ${2} ");
    let line = TOK_PERIOD_COMMA_BEFORE.replace_all(&line, " ${1} ${2}");
    let line = TOK_DASH.replace_all(&line, "${1} ${2} ");
    line.split_whitespace().map(str::to_string).collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// Single-reference BLEU with exponential smoothing and brevity penalty.
pub fn bleu(answer: &str, reference: &str) -> f64 {
    let hyp = bleu_tokens(answer);
    let reference = bleu_tokens(reference);
    let sys_len = hyp.len();
    let ref_len = reference.len();

    let mut precisions = [0.0f64; BLEU_MAX_ORDER];
    let mut smooth = 1.0f64;

    for n in 1..=BLEU_MAX_ORDER {
        let total = sys_len.saturating_sub(n - 1);
        if total == 0 {
            break;
        }
        let hyp_counts = ngram_counts(&hyp, n);
        let ref_counts = ngram_counts(&reference, n);
        let correct: usize = hyp_counts
            .iter()
            .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
            .sum();

        precisions[n - 1] = if correct == 0 {
            smooth *= 2.0;
            100.0 / (smooth * total as f64)
        } else {
            100.0 * correct as f64 / total as f64
        };
    }

    let brevity_penalty = if sys_len < ref_len {
        if sys_len > 0 {
            (1.0 - ref_len as f64 / sys_len as f64).exp()
        } else {
            0.0
        }
    } else {
        1.0
    };

    let log_sum: f64 = precisions
        .iter()
        .map(|&p| if p == 0.0 { -9_999_999_999.0 } else { p.ln() })
        .sum();
    brevity_penalty * (log_sum / BLEU_MAX_ORDER as f64).exp()
}
