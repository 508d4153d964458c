//! Subcommand handlers.

use crate::cli::output::Output;
use crate::cli::Commands;
use crate::eval::report::{read_questions, write_report};
use crate::eval::Evaluator;
use crate::rag::chunker::TextChunker;
use crate::rag::corpus::Corpus;
use crate::rag::embeddings::create_embedder;
use crate::rag::pipeline::RagPipeline;
use crate::rag::table::ChunkTable;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EvaluationConfig, RagConfig};
use std::path::Path;

/// Run one subcommand against a loaded configuration.
pub async fn run(command: Commands, config: &RagConfig, output: &Output) -> Result<()> {
    match command {
        Commands::Chunk => chunk(config, output),
        Commands::Index => index(config, output).await,
        Commands::Ask { question, top_k } => {
            ask(config, output, &question, top_k.unwrap_or(config.retrieval.top_k)).await
        }
        Commands::Search { query, top_k } => {
            search(config, output, &query, top_k.unwrap_or(config.retrieval.top_k)).await
        }
        Commands::Evaluate { questions, top_k } => {
            evaluate(config, output, &questions, top_k).await
        }
        Commands::Config => show_config(config, output),
    }
}

fn chunk(config: &RagConfig, output: &Output) -> Result<()> {
    let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.overlap);
    let table = ChunkTable::ingest_dir(&config.paths.documents, &chunker)?;
    table.write_csv(&config.paths.chunks)?;

    output.success(&format!("Wrote {} chunks", table.len()));
    output.kv("documents", &config.paths.documents.display().to_string());
    output.kv("chunk table", &config.paths.chunks.display().to_string());

    if config.paths.index.exists() {
        output.warning("An index already exists and will be rejected until rebuilt from this chunk table");
        output.hint("Rebuild it before querying:");
        output.command("guideline-rag index");
    }
    Ok(())
}

async fn index(config: &RagConfig, output: &Output) -> Result<()> {
    output.step(1, 3, "Loading chunk table");
    let table = ChunkTable::read_csv(&config.paths.chunks)?;

    output.step(2, 3, &format!("Embedding {} chunks with {}", table.len(), config.embedding.model));
    let embedder = create_embedder(&config.embedding)?;
    let corpus = Corpus::build(table, embedder.as_ref(), config.retrieval.metric).await?;

    output.step(3, 3, "Saving index");
    corpus.save(&config.paths.chunks, &config.paths.index).await?;

    output.success("Index built");
    output.kv("vectors", &corpus.index().len().to_string());
    output.kv("dimensions", &corpus.index().dimensions().to_string());
    output.kv("metric", corpus.index().metric().name());
    output.kv("index", &config.paths.index.display().to_string());
    Ok(())
}

async fn ask(config: &RagConfig, output: &Output, question: &str, top_k: usize) -> Result<()> {
    let pipeline = RagPipeline::from_config(config).await?;
    let generated = pipeline.ask(question, top_k).await?;

    output.header("Answer");
    output.paragraph(&generated.answer);

    if crate::eval::metrics::is_abstention(&generated.answer) {
        output.warning("The model abstained: the retrieved guidelines do not cover this question");
    }
    if generated.context.truncated {
        output.info(&format!(
            "{} of {} retrieved chunks fit the context budget",
            generated.context.included,
            generated.retrieved.len()
        ));
    }

    output.subheader("Evidence");
    for block in &generated.evidence {
        output.list_item(block);
    }
    Ok(())
}

async fn search(config: &RagConfig, output: &Output, query: &str, top_k: usize) -> Result<()> {
    let corpus = Corpus::load(&config.paths.chunks, &config.paths.index).await?;
    let embedder = create_embedder(&config.embedding)?;
    let hits = corpus.search(embedder.as_ref(), query, top_k).await?;

    output.header(&format!("Top {} chunks", hits.len()));
    output.table_header(&["rank", "distance", "source", "chunk"]);
    for hit in &hits {
        let rank = hit.rank.to_string();
        let distance = format!("{:.4}", hit.distance);
        let chunk_id = hit.chunk.chunk_id.to_string();
        output.table_row(&[
            rank.as_str(),
            distance.as_str(),
            hit.chunk.source.as_str(),
            chunk_id.as_str(),
        ]);
    }
    for hit in &hits {
        output.subheader(&format!(
            "[rank {}] {} | chunk {}",
            hit.rank, hit.chunk.source, hit.chunk.chunk_id
        ));
        output.paragraph(&hit.chunk.text);
    }
    Ok(())
}

async fn evaluate(
    config: &RagConfig,
    output: &Output,
    questions_path: &Path,
    top_k: Option<usize>,
) -> Result<()> {
    let questions = read_questions(questions_path)?;
    if questions.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} contains no questions",
            questions_path.display()
        )));
    }

    let pipeline = RagPipeline::from_config(config).await?;
    let evaluation = EvaluationConfig {
        top_k: top_k.unwrap_or(config.evaluation.top_k),
        ..config.evaluation.clone()
    };
    let evaluator = Evaluator::from_config(&evaluation);

    output.info(&format!("Evaluating {} questions", questions.len()));
    let report = evaluator.evaluate_batch(&questions, &pipeline).await?;
    let (results_path, evidence_path) = write_report(&config.paths.outputs, &report)?;

    let summary = report.summary();
    output.header("Evaluation");
    output.kv("questions", &summary.total.to_string());
    output.kv("failed", &summary.failed.to_string());
    output.kv("with citation", &summary.with_citation.to_string());
    output.kv("abstained", &summary.abstained.to_string());
    output.kv("unsupported numbers", &summary.unsupported_numbers.to_string());
    if let Some(rouge) = summary.mean_rouge_l_f {
        output.kv("mean ROUGE-L F", &format!("{:.4}", rouge));
    }
    if let Some(bleu) = summary.mean_bleu {
        output.kv("mean BLEU", &format!("{:.2}", bleu));
    }

    output.created("report", &results_path.display().to_string());
    output.created("evidence", &evidence_path.display().to_string());
    if summary.failed > 0 {
        output.warning(&format!(
            "{} questions failed; see the error column",
            summary.failed
        ));
    }
    Ok(())
}

fn show_config(config: &RagConfig, output: &Output) -> Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| AppError::Internal(format!("Failed to render configuration: {}", e)))?;

    output.success("Configuration is valid");
    output.header("Resolved configuration");
    output.paragraph(&rendered);
    Ok(())
}
