//! Layered configuration for the engine.
//!
//! Defaults → TOML file → environment variables.
//!
//! # Environment Variables
//!
//! Environment variables are prefixed with `CT_` and use double underscores
//! to separate nested levels:
//! - `CT_CACHE__MAX_FILE_SIZE=2097152` sets `cache.max_file_size`
//! - `CT_AGENT__MAX_ROUNDS=8` sets `agent.max_rounds`
//!
//! `OPENAI_API_KEY`, `MODEL`, `BASE_URL`, `EMBEDDING_URL`, `EMBEDDING_MODEL`
//! are read unprefixed, taking precedence over the config file's
//! `llm`/`embedding` sections.

use std::collections::HashMap;
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k1")]
    pub bm25_k1: f32,

    #[serde(default = "default_b")]
    pub bm25_b: f32,

    #[serde(default = "default_alpha")]
    pub hybrid_alpha: f32,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,

    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    #[serde(default = "default_answer_context_budget")]
    pub answer_context_budget: usize,

    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    #[serde(default = "default_query_deadline_secs")]
    pub query_deadline_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct McpConfig {
    #[serde(default = "default_mcp_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("codetrace")
}
fn default_max_file_size() -> u64 {
    crate::loader::DEFAULT_MAX_FILE_SIZE
}
fn default_k1() -> f32 {
    1.5
}
fn default_b() -> f32 {
    0.75
}
fn default_alpha() -> f32 {
    0.5
}
fn default_top_k() -> usize {
    10
}
fn default_embedding_url() -> String {
    "http://localhost:8080/v1/embeddings".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_batch_size() -> usize {
    crate::embedding::DEFAULT_BATCH_SIZE
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_call_timeout_secs() -> u64 {
    60
}
fn default_max_rounds() -> u32 {
    5
}
fn default_confidence_threshold() -> u8 {
    90
}
fn default_token_budget() -> usize {
    40_000
}
fn default_answer_context_budget() -> usize {
    12_000
}
fn default_max_neighbors() -> usize {
    50
}
fn default_query_deadline_secs() -> u64 {
    300
}
fn default_mcp_port() -> u16 {
    9999
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            mcp: McpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: default_cache_dir(), max_file_size: default_max_file_size() }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bm25_k1: default_k1(),
            bm25_b: default_b(),
            hybrid_alpha: default_alpha(),
            default_top_k: default_top_k(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            confidence_threshold: default_confidence_threshold(),
            token_budget: default_token_budget(),
            answer_context_budget: default_answer_context_budget(),
            max_neighbors: default_max_neighbors(),
            query_deadline_secs: default_query_deadline_secs(),
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self { port: default_mcp_port() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { default: default_log_level(), modules: HashMap::new() }
    }
}

impl EngineConfig {
    /// Loads configuration: defaults, then `.codetrace/config.toml` if
    /// present, then `CT_`-prefixed env vars, then the unprefixed LLM/embedding
    /// env vars (which win over everything else).
    pub fn load() -> Result<Self, figment::Error> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".codetrace/config.toml"));

        let mut config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CT_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()?;

        config.apply_well_known_env();
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        let mut config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CT_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()?;
        config.apply_well_known_env();
        Ok(config)
    }

    /// The one place env vars are read directly, rather than scattered
    /// through constructors.
    fn apply_well_known_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = key;
        }
        if let Ok(model) = std::env::var("MODEL") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(url) = std::env::var("EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
    }

    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".codetrace");
            if config_dir.is_dir() {
                return Some(config_dir.join("config.toml"));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_spec_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.agent.max_rounds, 5);
        assert_eq!(config.agent.confidence_threshold, 90);
        assert_eq!(config.agent.token_budget, 40_000);
        assert_eq!(config.retrieval.bm25_k1, 1.5);
        assert_eq!(config.mcp.port, 9999);
    }

    #[test]
    fn loads_from_toml_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[agent]
max_rounds = 8

[mcp]
port = 8888
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_rounds, 8);
        assert_eq!(config.mcp.port, 8888);
        assert_eq!(config.agent.confidence_threshold, 90);
    }
}
