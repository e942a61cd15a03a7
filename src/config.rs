use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
    /// Chunking parameters would never terminate.
    #[error("CHUNK_OVERLAP ({overlap}) must be smaller than CHUNK_SIZE ({size})")]
    InvalidChunking {
        /// Configured window size.
        size: usize,
        /// Configured overlap.
        overlap: usize,
    },
}

/// Runtime configuration shared by the tool server and the indexing CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend holding the vector collection.
    pub store_backend: StoreBackend,
    /// Directory holding the local SQLite database.
    pub store_path: PathBuf,
    /// Logical name of the single collection holding every corpus.
    pub collection_name: String,
    /// Base URL of the Qdrant instance when the `qdrant` backend is selected.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// API key for the OpenAI embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Characters shared by neighbouring chunk windows.
    pub chunk_overlap: usize,
    /// External command converting rich documents to markdown.
    pub markitdown_command: String,
    /// Default bind host for the HTTP transport.
    pub server_host: String,
    /// Default bind port for the HTTP transport.
    pub server_port: u16,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite database file on the local filesystem.
    Local,
    /// Remote Qdrant instance reached over its REST API.
    Qdrant,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic offline hashing encoder.
    Hash,
}

/// Settings needed to build an embedding client, detached from the global config.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Provider to instantiate.
    pub provider: EmbeddingProvider,
    /// Model identifier.
    pub model: String,
    /// Expected vector length.
    pub dimension: usize,
    /// Ollama base URL.
    pub ollama_url: String,
    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// OpenAI base URL.
    pub openai_base_url: String,
}

pub(crate) const DEFAULT_STORE_PATH: &str = "qdrant_data";
pub(crate) const DEFAULT_COLLECTION: &str = "documents";
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 500;
pub(crate) const DEFAULT_CHUNK_OVERLAP: usize = 50;
/// Default bind address for the HTTP transport.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
/// Default bind port for the HTTP transport.
pub const DEFAULT_SERVER_PORT: u16 = 3001;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            store_backend: parse_env("LOCALRAG_STORE_BACKEND", StoreBackend::Local)?,
            store_path: PathBuf::from(load_env_or("LOCALRAG_STORE_PATH", DEFAULT_STORE_PATH)),
            collection_name: load_env_or("LOCALRAG_COLLECTION", DEFAULT_COLLECTION),
            qdrant_url: load_env_or("QDRANT_URL", "http://127.0.0.1:6333"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_env("EMBEDDING_PROVIDER", EmbeddingProvider::Ollama)?,
            embedding_model: load_env_or("EMBEDDING_MODEL", "all-minilm"),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", 384)?,
            ollama_url: load_env_or("OLLAMA_URL", "http://127.0.0.1:11434"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            chunk_size: parse_env("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
            markitdown_command: load_env_or("MARKITDOWN_COMMAND", "markitdown"),
            server_host: load_env_or("SERVER_HOST", DEFAULT_SERVER_HOST),
            server_port: parse_env("SERVER_PORT", DEFAULT_SERVER_PORT)?,
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".into(),
                value: "0".into(),
            });
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::InvalidChunking {
                size: config.chunk_size,
                overlap: config.chunk_overlap,
            });
        }

        Ok(config)
    }

    /// Extract the embedding-related settings.
    pub fn embedding_settings(&self) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: self.embedding_provider,
            model: self.embedding_model.clone(),
            dimension: self.embedding_dimension,
            ollama_url: self.ollama_url.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_base_url: self.openai_base_url.clone(),
        }
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
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

impl std::str::FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// The configuration installed by [`init_config`], if it has run.
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        backend = ?config.store_backend,
        store_path = %config.store_path.display(),
        collection = %config.collection_name,
        embedding_provider = ?config.embedding_provider,
        dimension = config.embedding_dimension,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse_case_insensitively() {
        assert_eq!("Ollama".parse(), Ok(EmbeddingProvider::Ollama));
        assert_eq!("OPENAI".parse(), Ok(EmbeddingProvider::OpenAI));
        assert_eq!("hash".parse(), Ok(EmbeddingProvider::Hash));
        assert!("bert".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn backends_parse() {
        assert_eq!("local".parse(), Ok(StoreBackend::Local));
        assert_eq!("Qdrant".parse(), Ok(StoreBackend::Qdrant));
        assert!("lance".parse::<StoreBackend>().is_err());
    }
}
