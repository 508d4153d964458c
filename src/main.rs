//! guideline-rag CLI entry point
//!
//! - `guideline-rag chunk` - chunk the guideline documents
//! - `guideline-rag index` - embed chunks and build the index
//! - `guideline-rag ask <question>` - answer from retrieved passages
//! - `guideline-rag search <query>` - show the nearest chunks
//! - `guideline-rag evaluate <csv>` - score a batch of questions
//! - `guideline-rag config` - show the resolved configuration

use guideline_rag::cli::{commands, output::Output, Cli};
use guideline_rag::utils::toml_config::{LoggingConfig, RagConfig};
use guideline_rag::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    // Load .env before the config so api_key_env lookups can see it
    dotenvy::dotenv().ok();

    let config = RagConfig::load(&cli.config)?;
    init_tracing(&config.logging, cli.verbose);

    commands::run(cli.command, &config, output).await
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = logging
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!logging.json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
