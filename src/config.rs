//! TOML configuration parsing and validation.
//!
//! The whole process runs off one [`Config`] value built by [`load_config`]
//! at startup and handed by reference to every component constructor.
//! Provider credentials are resolved from the environment here, once, so
//! nothing below this module reads environment variables.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [storage]
//! upload_dir = "./data/uploads"
//! vector_db_path = "./data/vector_store"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [[llm.providers]]
//! name = "groq"
//! base_url = "https://api.groq.com/openai/v1"
//! model = "llama3-70b-8192"
//! api_key_env = "GROQ_API_KEY"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:8501".to_string(),
        "http://127.0.0.1:8501".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root under which each session gets its own upload directory.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory holding the vector store database.
    #[serde(default = "default_vector_db_path")]
    pub vector_db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            vector_db_path: default_vector_db_path(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}
fn default_vector_db_path() -> PathBuf {
    PathBuf::from("./data/vector_store")
}

impl StorageConfig {
    pub fn vector_db_file(&self) -> PathBuf {
        self.vector_db_path.join("vectors.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
        }
    }
}

fn default_timeout_minutes() -> u64 {
    60
}

impl SessionConfig {
    /// Idle timeout. Values too large to express in seconds saturate
    /// rather than wrap.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_test_plan_k")]
    pub test_plan_k: usize,
    #[serde(default = "default_script_k")]
    pub script_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            test_plan_k: default_test_plan_k(),
            script_k: default_script_k(),
        }
    }
}

fn default_test_plan_k() -> usize {
    3
}
fn default_script_k() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `openai`, `hash` or `local`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    /// Vector size; providers fall back to their model's native size.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    /// Resolved from `api_key_env` by [`load_config`].
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: None,
            base_url: default_openai_base_url(),
            api_key_env: default_openai_key_env(),
            api_key: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("text-embedding-3-small".to_string())
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Ordered chat-model providers; the first one with a credential wins.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_providers")]
    pub providers: Vec<LlmProviderConfig>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: default_llm_providers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmProviderConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_llm_providers() -> Vec<LlmProviderConfig> {
    vec![
        LlmProviderConfig {
            name: "groq".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-70b-8192".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            api_key: None,
            temperature: default_temperature(),
        },
        LlmProviderConfig {
            name: "openai".to_string(),
            base_url: default_openai_base_url(),
            model: "gpt-4o".to_string(),
            api_key_env: default_openai_key_env(),
            api_key: None,
            temperature: default_temperature(),
        },
    ]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GenerationConfig {
    /// Render failed generations as the legacy sentinel strings instead of
    /// structured errors.
    #[serde(default)]
    pub sentinel_errors: bool,
}

/// Read, resolve credentials and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    finish_config(config, |name| std::env::var(name).ok())
}

/// Resolve credentials through `lookup` and validate.
///
/// Keys given inline in the file take precedence over the environment.
pub fn finish_config<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    if config.embedding.api_key.is_none() {
        config.embedding.api_key = lookup(&config.embedding.api_key_env).filter(|k| !k.is_empty());
    }
    for provider in &mut config.llm.providers {
        if provider.api_key.is_none() {
            provider.api_key = lookup(&provider.api_key_env).filter(|k| !k.is_empty());
        }
    }
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }
    if let Some(origin) = config.server.cors_origins.iter().find(|o| o.trim() == "*") {
        bail!(
            "server.cors_origins: wildcard origin {:?} is not allowed with credentialed CORS; list explicit origins",
            origin
        );
    }
    if config.retrieval.test_plan_k == 0 || config.retrieval.script_k == 0 {
        bail!("retrieval.test_plan_k and retrieval.script_k must be >= 1");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "openai" | "hash" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai, hash, or local.",
            other
        ),
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        bail!("embedding.model must be specified when provider is 'openai'");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    for provider in &config.llm.providers {
        if !(0.0..=2.0).contains(&provider.temperature) {
            bail!(
                "llm provider '{}': temperature must be in [0.0, 2.0]",
                provider.name
            );
        }
    }

    Ok(())
}
