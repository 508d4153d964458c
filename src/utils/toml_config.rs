//! TOML-based configuration for guideline-rag
//!
//! All paths, model identifiers and policy knobs come from one explicit
//! configuration file (`guideline-rag.toml` by default). There is no built-in
//! base directory: `[paths]` is required and relative entries are resolved
//! against the directory containing the configuration file.

use crate::llm::client::{DecodingPolicy, GenerationParams};
use guideline_index::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from guideline-rag.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub paths: PathsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

// ============= Paths =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of cleaned `*.txt` guideline documents
    pub documents: PathBuf,

    /// Chunk table (CSV: source, chunk_id, text)
    pub chunks: PathBuf,

    /// Index blob, always rebuilt together with `chunks`
    pub index: PathBuf,

    /// Directory for evaluation reports
    pub outputs: PathBuf,
}

impl PathsConfig {
    fn resolve_against(&mut self, base: &Path) {
        for path in [
            &mut self.documents,
            &mut self.chunks,
            &mut self.index,
            &mut self.outputs,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

// ============= Logging =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Chunking =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Trailing words carried into the next chunk
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    500
}

fn default_overlap() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

// ============= Embedding =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Ollama,
    FastEmbed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProviderKind,

    /// Model identifier; must be the same at build and query time
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> EmbeddingProviderKind {
    EmbeddingProviderKind::Ollama
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_ollama_url(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

// ============= Retrieval =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_top_k() -> usize {
    6
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: DistanceMetric::default(),
        }
    }
}

// ============= Generation =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    Ollama,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: GenerationProviderKind,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Environment variable holding the API key (OpenAI-compatible providers)
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// 0.0 selects deterministic decoding; anything above samples
    #[serde(default)]
    pub temperature: f32,

    /// Beam width for deterministic decoding
    #[serde(default = "default_num_beams")]
    pub num_beams: u32,

    /// Character budget for the assembled context
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Upper bound on a single generation call
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_provider() -> GenerationProviderKind {
    GenerationProviderKind::Ollama
}

fn default_generation_model() -> String {
    "llama3.2".to_string()
}

fn default_max_new_tokens() -> u32 {
    256
}

fn default_num_beams() -> u32 {
    4
}

fn default_max_context_chars() -> usize {
    3500
}

fn default_generation_timeout() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            base_url: default_ollama_url(),
            api_key_env: None,
            max_new_tokens: default_max_new_tokens(),
            temperature: 0.0,
            num_beams: default_num_beams(),
            max_context_chars: default_max_context_chars(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    /// Decoding parameters derived from temperature and beam width
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_new_tokens: self.max_new_tokens,
            policy: DecodingPolicy::from_temperature(self.temperature, self.num_beams),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= Evaluation =============

/// What a batch does when one question fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going; the failing row is kept with its error message
    #[default]
    Record,
    /// Abort the batch on the first failing row
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Questions evaluated at once; report order always follows input order
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            failure_policy: FailurePolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl RagConfig {
    /// Load configuration from a TOML file and resolve relative paths
    /// against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.paths.resolve_against(&base);

        Ok(config)
    }

    /// Parse and validate configuration from TOML text. Paths are left as written.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RagConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate numeric bounds and provider requirements
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 || self.evaluation.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "top_k must be > 0".to_string(),
            ));
        }
        if self.generation.max_context_chars == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_context_chars must be > 0".to_string(),
            ));
        }
        if self.generation.timeout_secs == 0 || self.embedding.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be > 0".to_string(),
            ));
        }
        if !self.generation.temperature.is_finite() || self.generation.temperature < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "generation.temperature must be >= 0, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.num_beams == 0 {
            return Err(ConfigError::ValidationError(
                "generation.num_beams must be >= 1".to_string(),
            ));
        }
        if self.evaluation.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "evaluation.concurrency must be >= 1".to_string(),
            ));
        }

        if self.generation.provider == GenerationProviderKind::OpenAI {
            let env = self.generation.api_key_env.as_deref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "generation.api_key_env is required for the openai provider".to_string(),
                )
            })?;
            self.validate_env_var(env)?;
        }

        if self.embedding.provider == EmbeddingProviderKind::FastEmbed
            && !cfg!(feature = "local-embeddings")
        {
            return Err(ConfigError::ValidationError(
                "embedding.provider = \"fastembed\" requires the local-embeddings feature"
                    .to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// API key for the generation provider, if one is configured
    pub fn generation_api_key(&self) -> Result<Option<String>, ConfigError> {
        match self.generation.api_key_env {
            Some(ref env) => self
                .resolve_env(env)
                .map(Some)
                .ok_or_else(|| ConfigError::MissingEnvVar(env.clone())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[paths]
documents = "data/guidelines"
chunks = "artifacts/chunks.csv"
index = "artifacts/index.bin"
outputs = "outputs"

[logging]
level = "debug"

[chunking]
chunk_size = 400
overlap = 20

[embedding]
provider = "ollama"
model = "nomic-embed-text"

[retrieval]
top_k = 4
metric = "cosine"

[generation]
provider = "ollama"
model = "llama3.2"
temperature = 0.0
max_context_chars = 2000

[evaluation]
failure_policy = "fail_fast"
concurrency = 2
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config = RagConfig::from_toml_str(&create_test_config()).expect("Failed to parse config");

        assert_eq!(config.paths.chunks, PathBuf::from("artifacts/chunks.csv"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.overlap, 20);
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.retrieval.metric, DistanceMetric::Cosine);
        assert_eq!(config.generation.max_context_chars, 2000);
        assert_eq!(config.evaluation.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.evaluation.concurrency, 2);
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::from_toml_str(
            r#"
[paths]
documents = "d"
chunks = "c.csv"
index = "i.bin"
outputs = "o"
"#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.retrieval.metric, DistanceMetric::Euclidean);
        assert_eq!(config.generation.max_new_tokens, 256);
        assert_eq!(config.generation.max_context_chars, 3500);
        assert_eq!(config.generation.timeout_secs, 120);
        assert_eq!(config.evaluation.failure_policy, FailurePolicy::Record);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_paths_section_is_required() {
        let result = RagConfig::from_toml_str("[chunking]\nchunk_size = 10\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_chunk_size() {
        let content = create_test_config().replace("chunk_size = 400", "chunk_size = 0");
        let result = RagConfig::from_toml_str(&content);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("chunk_size")));
    }

    #[test]
    fn test_validation_rejects_negative_temperature() {
        let content = create_test_config().replace("temperature = 0.0", "temperature = -0.5");
        let result = RagConfig::from_toml_str(&content);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("temperature")));
    }

    #[test]
    fn test_openai_requires_api_key_env() {
        let content = create_test_config().replace(
            "provider = \"ollama\"\nmodel = \"llama3.2\"",
            "provider = \"openai\"\nmodel = \"gpt-4o-mini\"",
        );
        let result = RagConfig::from_toml_str(&content);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("api_key_env")));

        let content = content.replace(
            "model = \"gpt-4o-mini\"",
            "model = \"gpt-4o-mini\"\napi_key_env = \"GUIDELINE_RAG_TEST_KEY_THAT_IS_NEVER_SET\"",
        );
        let result = RagConfig::from_toml_str(&content);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name.starts_with("GUIDELINE_RAG_TEST")));
    }

    #[test]
    fn test_decoding_policy_from_temperature() {
        let mut config = RagConfig::from_toml_str(&create_test_config()).unwrap();
        assert_eq!(
            config.generation.params().policy,
            DecodingPolicy::Deterministic { num_beams: 4 }
        );

        config.generation.temperature = 0.7;
        assert_eq!(
            config.generation.params().policy,
            DecodingPolicy::Sampling { temperature: 0.7 }
        );
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("guideline-rag.toml");
        fs::write(&path, create_test_config()).unwrap();

        let config = RagConfig::load(&path).unwrap();
        assert_eq!(config.paths.chunks, dir.path().join("artifacts/chunks.csv"));
        assert_eq!(config.paths.outputs, dir.path().join("outputs"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = RagConfig::load("/definitely/not/here/guideline-rag.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
