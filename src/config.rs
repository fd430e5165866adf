//! TOML configuration.
//!
//! Every section except `[db]` may be omitted; defaults match
//! `config/pagetree.example.toml`. Secrets never live in the file: the
//! Notion integration secret and the OpenAI key are read from the
//! environment (a `.env` file is loaded at startup).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pagetree_core::chunk::{OversizeGuard, DEFAULT_MAX_TOKENS, DEFAULT_TOKENS_PER_WORD};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotionConfig {
    #[serde(default = "default_notion_base")]
    pub base_url: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
    /// Name of the environment variable holding the integration secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_notion_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: default_notion_base(),
            version: default_notion_version(),
            secret_env: default_secret_env(),
            timeout_secs: default_notion_timeout(),
            page_size: default_page_size(),
        }
    }
}

fn default_notion_base() -> String {
    "https://api.notion.com".to_string()
}
fn default_notion_version() -> String {
    "2022-06-28".to_string()
}
fn default_secret_env() -> String {
    "NOTION_SECRET".to_string()
}
fn default_notion_timeout() -> u64 {
    10
}
fn default_page_size() -> u32 {
    100
}

impl NotionConfig {
    /// Base URL, with `NOTION_BASE` taking precedence over the file.
    pub fn resolved_base_url(&self) -> String {
        std::env::var("NOTION_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }

    /// API version, with `NOTION_VERSION` taking precedence over the file.
    pub fn resolved_version(&self) -> String {
        std::env::var("NOTION_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.version.clone())
    }

    pub fn secret(&self) -> Result<String> {
        match std::env::var(&self.secret_env) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => bail!("{} environment variable not set", self.secret_env),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_tokens_per_word")]
    pub tokens_per_word: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            tokens_per_word: default_tokens_per_word(),
        }
    }
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
fn default_tokens_per_word() -> f64 {
    DEFAULT_TOKENS_PER_WORD
}

impl ChunkingConfig {
    pub fn guard(&self) -> OversizeGuard {
        OversizeGuard {
            max_tokens: self.max_tokens,
            tokens_per_word: self.tokens_per_word,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: i64,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            candidate_k: default_candidate_k(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    0.6
}
fn default_candidate_k() -> i64 {
    80
}
fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
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
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
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

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8001".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.tokens_per_word <= 0.0 {
        bail!("chunking.tokens_per_word must be > 0");
    }

    // Notion
    if !(1..=100).contains(&config.notion.page_size) {
        bail!("notion.page_size must be in [1, 100]");
    }
    if config.notion.timeout_secs == 0 {
        bail!("notion.timeout_secs must be > 0");
    }

    // Retrieval
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if config.retrieval.candidate_k < 1 {
        bail!("retrieval.candidate_k must be >= 1");
    }
    if config.retrieval.default_top_k < 1
        || config.retrieval.default_top_k > config.retrieval.max_top_k
    {
        bail!("retrieval.default_top_k must be in [1, retrieval.max_top_k]");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.is_enabled() && config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = parse_config("[db]\npath = \"/tmp/x.sqlite\"\n").unwrap();
        assert_eq!(cfg.notion.base_url, "https://api.notion.com");
        assert_eq!(cfg.notion.version, "2022-06-28");
        assert_eq!(cfg.notion.timeout_secs, 10);
        assert_eq!(cfg.chunking.max_tokens, 256);
        assert!((cfg.chunking.tokens_per_word - 1.3).abs() < 1e-9);
        assert_eq!(cfg.retrieval.default_top_k, 5);
        assert_eq!(cfg.server.bind, "0.0.0.0:8001");
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let err = parse_config("[db]\npath = \"x\"\n[retrieval]\nhybrid_alpha = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("hybrid_alpha"));
    }

    #[test]
    fn test_rejects_top_k_above_max() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[retrieval]\ndefault_top_k = 50\nmax_top_k = 10\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_top_k"));
    }

    #[test]
    fn test_rejects_page_size_out_of_range() {
        assert!(parse_config("[db]\npath = \"x\"\n[notion]\npage_size = 0\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[notion]\npage_size = 101\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        let cfg = parse_config(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
        )
        .unwrap();
        assert!(cfg.embedding.is_enabled());
    }

    #[test]
    fn test_local_provider_defaults_model() {
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"local\"\n").is_ok());
    }

    #[test]
    fn test_guard_from_chunking() {
        let cfg = parse_config("[db]\npath = \"x\"\n[chunking]\nmax_tokens = 32\n").unwrap();
        assert_eq!(cfg.chunking.guard().max_tokens, 32);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/pagetree.toml")).is_err());
    }
}
