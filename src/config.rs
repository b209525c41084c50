use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 100;
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_SEPARATOR: &str = "\n";
const DEFAULT_TOP_K: usize = 4;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was already installed for this process.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the pdfchat server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Credential for the OpenAI-compatible embedding and chat endpoints.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API (without trailing `/embeddings`).
    pub openai_base_url: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Maximum number of chunks sent per embedding request.
    pub embedding_batch_size: usize,
    /// Chat model identifier used for answers and question condensing.
    pub chat_model: String,
    /// Sampling temperature for chat completions.
    pub chat_temperature: f32,
    /// Rephrase follow-up questions into standalone questions before retrieval.
    pub condense_question: bool,
    /// Maximum chunk length in characters.
    pub text_splitter_chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub text_splitter_chunk_overlap: usize,
    /// Preferred split boundary.
    pub text_splitter_separator: String,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Upper bound on the multipart upload body.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let vars = Vars(&lookup);
        let api_key = vars
            .optional("OPENAI_API_KEY")
            .ok_or_else(|| ConfigurationError::MissingVariable("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            openai_api_key: api_key,
            openai_base_url: vars
                .optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: vars
                .optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_batch_size: vars
                .parse("EMBEDDING_BATCH_SIZE")?
                .unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE),
            chat_model: vars
                .optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chat_temperature: vars
                .parse("CHAT_TEMPERATURE")?
                .unwrap_or(DEFAULT_CHAT_TEMPERATURE),
            condense_question: vars
                .optional("CONDENSE_QUESTION")
                .map(|value| {
                    parse_flag(&value)
                        .ok_or_else(|| ConfigurationError::InvalidValue("CONDENSE_QUESTION".into()))
                })
                .transpose()?
                .unwrap_or(true),
            text_splitter_chunk_size: vars
                .parse("TEXT_SPLITTER_CHUNK_SIZE")?
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            text_splitter_chunk_overlap: vars
                .parse("TEXT_SPLITTER_CHUNK_OVERLAP")?
                .unwrap_or(DEFAULT_CHUNK_OVERLAP),
            // Whitespace is a legitimate separator, so only an empty value falls back.
            text_splitter_separator: lookup("TEXT_SPLITTER_SEPARATOR")
                .filter(|value| !value.is_empty())
                .map(|value| unescape_separator(&value))
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            retrieval_top_k: vars.parse("RETRIEVAL_TOP_K")?.unwrap_or(DEFAULT_TOP_K),
            max_upload_bytes: vars
                .parse("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_port: vars.parse("SERVER_PORT")?,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Value of `key`; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigurationError> {
        self.optional(key)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigurationError::InvalidValue(key.to_string()))
            })
            .transpose()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Translate `\n`, `\t` and `\\` escape sequences so separators can be written in `.env` files.
fn unescape_separator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// Reads `env_file` when given, otherwise a `.env` in the working directory when present.
pub fn init_config(env_file: Option<&std::path::Path>) -> Result<&'static Config, ConfigurationError> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|_| {
                ConfigurationError::InvalidValue(format!("env file {}", path.display()))
            })?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| ConfigurationError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigurationError::AlreadyInitialized)
}
