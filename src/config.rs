use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_QDRANT_URL: &str = "http://127.0.0.1:6333";
const DEFAULT_EMBEDDING_MODEL: &str = "thenlper/gte-small";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_LLM_MODEL: &str = "meta-llama/Meta-Llama-3.1-405B-Instruct-Turbo";
const DEFAULT_CHUNK_SIZE: usize = 6000;
const DEFAULT_CHUNK_OVERLAP: usize = 100;
const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(8);
const DEFAULT_REGISTRY_PATH: &str = "collections.db";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docket server and CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Vector store backend holding one namespace per collection.
    pub vector_store: VectorStoreBackend,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider settings.
    pub embedding: EmbeddingSettings,
    /// Completion (LLM) provider settings.
    pub llm: LlmSettings,
    /// Maximum words per chunk.
    pub chunk_size: usize,
    /// Words shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Maximum number of summarization calls in flight during one ingestion.
    pub summary_concurrency: usize,
    /// Upper bound for a single collaborator call.
    pub service_timeout: Duration,
    /// Attempts allowed for idempotent collaborator calls.
    pub retry_max_attempts: u32,
    /// Backoff before the first retry; doubles afterwards.
    pub retry_initial_backoff: Duration,
    /// Cap applied to the exponential backoff.
    pub retry_max_backoff: Duration,
    /// Location of the SQLite collection registry.
    pub registry_path: PathBuf,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    /// Remote Qdrant instance.
    Qdrant,
    /// Process-local store; contents vanish on restart.
    Memory,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Any OpenAI-compatible `/embeddings` endpoint.
    OpenAI,
    /// Deterministic byte-hashing embeddings for offline use.
    Hash,
}

/// Supported completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Together AI (OpenAI-compatible chat completions with extended sampling options).
    Together,
    /// Local Ollama runtime.
    Ollama,
}

/// Connection settings for the embedding collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    /// Backend used to produce vectors.
    pub provider: EmbeddingProvider,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Dimensionality of the produced vectors.
    pub dimension: usize,
    /// Base URL of the provider.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
}

/// Connection settings for the completion collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    /// Backend used for summaries and answers.
    pub provider: LlmProvider,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Base URL of the provider.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
}

impl EmbeddingProvider {
    fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://127.0.0.1:11434",
            Self::OpenAI => "https://api.together.xyz/v1",
            Self::Hash => "",
        }
    }
}

impl LlmProvider {
    fn default_base_url(self) -> &'static str {
        match self {
            Self::Together => "https://api.together.xyz/v1",
            Self::Ollama => "http://127.0.0.1:11434",
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vector_store = parse_optional("VECTOR_STORE")?.unwrap_or(VectorStoreBackend::Qdrant);

        let embedding_provider =
            parse_optional("EMBEDDING_PROVIDER")?.unwrap_or(EmbeddingProvider::Ollama);
        let embedding_dimension =
            parse_optional("EMBEDDING_DIMENSION")?.unwrap_or(DEFAULT_EMBEDDING_DIMENSION);
        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        let embedding = EmbeddingSettings {
            provider: embedding_provider,
            model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            dimension: embedding_dimension,
            base_url: load_env_optional("EMBEDDING_URL")
                .unwrap_or_else(|| embedding_provider.default_base_url().to_string()),
            api_key: load_env_optional("EMBEDDING_API_KEY"),
        };

        let llm_provider = parse_optional("LLM_PROVIDER")?.unwrap_or(LlmProvider::Together);
        let llm = LlmSettings {
            provider: llm_provider,
            model: load_env_optional("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            base_url: load_env_optional("LLM_URL")
                .unwrap_or_else(|| llm_provider.default_base_url().to_string()),
            api_key: load_env_optional("LLM_API_KEY")
                .or_else(|| load_env_optional("TOGETHER_API_KEY")),
        };
        if llm.provider == LlmProvider::Together && llm.api_key.is_none() {
            return Err(ConfigError::MissingVariable("LLM_API_KEY".into()));
        }

        let chunk_size = parse_optional("CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        let chunk_overlap = parse_optional("CHUNK_OVERLAP")?.unwrap_or(DEFAULT_CHUNK_OVERLAP);
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }

        let summary_concurrency = parse_optional::<usize>("SUMMARY_CONCURRENCY")?
            .unwrap_or(1)
            .max(1);
        let retry_max_attempts = parse_optional::<u32>("RETRY_MAX_ATTEMPTS")?
            .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
            .max(1);

        Ok(Self {
            vector_store,
            qdrant_url: load_env_optional("QDRANT_URL")
                .unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding,
            llm,
            chunk_size,
            chunk_overlap,
            summary_concurrency,
            service_timeout: Duration::from_secs(
                parse_optional("SERVICE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
            ),
            retry_max_attempts,
            retry_initial_backoff: Duration::from_millis(
                parse_optional("RETRY_BACKOFF_MS")?.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
            retry_max_backoff: MAX_RETRY_BACKOFF,
            registry_path: load_env_optional("REGISTRY_PATH")
                .unwrap_or_else(|| DEFAULT_REGISTRY_PATH.to_string())
                .into(),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl FromStr for VectorStoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "together" => Ok(Self::Together),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vector_store = ?config.vector_store,
        qdrant_url = %config.qdrant_url,
        embedding_provider = ?config.embedding.provider,
        embedding_model = %config.embedding.model,
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
