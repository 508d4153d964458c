//! CLI module for guideline-rag
//!
//! Provides command-line interface parsing and handling for the guideline-rag binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// guideline-rag - grounded question answering over clinical guidelines
#[derive(Parser, Debug)]
#[command(
    name = "guideline-rag",
    version,
    about = "Grounded question answering over a fixed clinical guideline corpus",
    long_about = "Chunks cleaned guideline text, builds an exact vector index over it, and answers\n\
                  questions strictly from retrieved passages with inline citations. Batches of\n\
                  questions can be scored for citations, abstention and unsupported numbers.",
    after_help = "EXAMPLES:\n    \
                  guideline-rag chunk                          # Chunk data/guidelines/*.txt\n    \
                  guideline-rag index                          # Embed chunks and build the index\n    \
                  guideline-rag ask \"First-line therapy?\"        # Answer one question\n    \
                  guideline-rag evaluate questions.csv         # Score a batch of questions\n    \
                  guideline-rag --config my.toml search \"dose\"  # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "guideline-rag.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk every *.txt document into the chunk table
    Chunk,

    /// Embed the chunk table and build the vector index
    Index,

    /// Answer a question from the indexed guidelines
    Ask {
        /// The clinical question
        question: String,

        /// Number of chunks to retrieve (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show the chunks nearest to a query
    Search {
        /// Free-text query
        query: String,

        /// Number of chunks to return (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Evaluate a CSV of questions (columns: question, optional gold)
    Evaluate {
        /// Path to the questions CSV
        questions: PathBuf,

        /// Number of chunks to retrieve per question (defaults to evaluation.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show and validate the resolved configuration
    Config,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_top_k() {
        let cli = Cli::try_parse_from(["guideline-rag", "ask", "What dose?", "--top-k", "3"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("guideline-rag.toml"));
        match cli.command {
            Commands::Ask { question, top_k } => {
                assert_eq!(question, "What dose?");
                assert_eq!(top_k, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "guideline-rag",
            "evaluate",
            "questions.csv",
            "--config",
            "custom.toml",
            "--no-color",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert!(cli.no_color);
        assert!(matches!(cli.command, Commands::Evaluate { .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["guideline-rag"]).is_err());
    }
}
