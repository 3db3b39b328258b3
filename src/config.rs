use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the Support KB server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the vector index that stores entry embeddings.
    pub index_url: String,
    /// Optional API key required to access the vector index.
    pub index_api_key: Option<String>,
    /// Base URL of the text-generation endpoint used for extraction and answers.
    pub generation_url: String,
    /// Optional API key sent on generation requests.
    pub generation_api_key: Option<String>,
    /// Model identifier passed to the generation endpoint.
    pub generation_model: String,
    /// Embedding model identifier recorded on indexed entries.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Maximum ranked matches returned by a search.
    pub search_result_limit: usize,
    /// Default page size for file listings.
    pub list_page_size: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            index_url: load_env("INDEX_URL")?,
            index_api_key: load_env_optional("INDEX_API_KEY"),
            generation_url: load_env("GENERATION_URL")?,
            generation_api_key: load_env_optional("GENERATION_API_KEY"),
            generation_model: load_env("GENERATION_MODEL")?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            search_result_limit: load_env_optional("SEARCH_RESULT_LIMIT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SEARCH_RESULT_LIMIT".to_string()))
                })
                .transpose()?
                .unwrap_or(5),
            list_page_size: load_env_optional("LIST_PAGE_SIZE")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("LIST_PAGE_SIZE".to_string()))
                })
                .transpose()?
                .unwrap_or(10),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        index_url = %config.index_url,
        generation_model = %config.generation_model,
        embedding_dimension = config.embedding_dimension,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
