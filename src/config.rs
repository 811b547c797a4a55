//! TOML configuration parsing and validation.
//!
//! Every section except `[server]` and `[catalog]` has defaults, so a minimal
//! config only needs the bind address and the catalog path. API keys are never
//! read from the file; providers pick them up from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::availability::MAX_AVAILABLE_COURSES;
use crate::chat::{DEFAULT_CLAUDE_MODEL, RETRIEVAL_TOP_K};
use crate::prereq::SIMILARITY_THRESHOLD;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PartitionConfig {
    #[serde(default = "default_partition_provider")]
    pub provider: String,
    #[serde(default = "default_aryn_url")]
    pub url: String,
    #[serde(default = "default_partition_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            provider: default_partition_provider(),
            url: default_aryn_url(),
            timeout_secs: default_partition_timeout_secs(),
        }
    }
}

fn default_partition_provider() -> String {
    "local".to_string()
}
fn default_aryn_url() -> String {
    "https://api.aryn.cloud/v1/document/partition".to_string()
}
fn default_partition_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    /// Pinecone index host, e.g. `https://aryn-abc123.svc.us-east-1.pinecone.io`.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            host: None,
            namespace: None,
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_top_k() -> usize {
    RETRIEVAL_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    DEFAULT_CLAUDE_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdvisorConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Department abbreviations recognised in transcripts. Unset means the
    /// built-in UCSB list.
    #[serde(default)]
    pub departments: Option<Vec<String>>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_results: default_max_results(),
            departments: None,
        }
    }
}

fn default_similarity_threshold() -> f64 {
    SIMILARITY_THRESHOLD
}
fn default_max_results() -> usize {
    MAX_AVAILABLE_COURSES
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

/// Parse a config from TOML text and validate it.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.partition.provider.as_str() {
        "aryn" | "local" => {}
        other => anyhow::bail!(
            "Unknown partition provider: '{}'. Must be aryn or local.",
            other
        ),
    }

    match config.retrieval.provider.as_str() {
        "disabled" => {}
        "pinecone" => {
            if config.retrieval.host.is_none() {
                anyhow::bail!("retrieval.host must be specified when provider is 'pinecone'");
            }
        }
        other => anyhow::bail!(
            "Unknown retrieval provider: '{}'. Must be disabled or pinecone.",
            other
        ),
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.llm.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    if !(0.0..=1.0).contains(&config.advisor.similarity_threshold) {
        anyhow::bail!("advisor.similarity_threshold must be in [0.0, 1.0]");
    }
    if config.advisor.max_results == 0 {
        anyhow::bail!("advisor.max_results must be >= 1");
    }
    if let Some(departments) = &config.advisor.departments {
        if departments.iter().all(|d| d.trim().is_empty()) {
            anyhow::bail!("advisor.departments must list at least one department");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[server]
bind = "127.0.0.1:8000"

[catalog]
path = "data/courses.csv"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.partition.provider, "local");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.llm.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.llm.max_tokens, 1000);
        assert!((config.advisor.similarity_threshold - 0.7).abs() < 1e-12);
        assert_eq!(config.advisor.max_results, 10);
        assert!(config.advisor.departments.is_none());
    }

    #[test]
    fn advisor_departments_override() {
        let text = format!("{MINIMAL}\n[advisor]\ndepartments = [\"CMPSC\", \"MATH\"]\n");
        let config = parse_config(&text).unwrap();
        assert_eq!(
            config.advisor.departments,
            Some(vec!["CMPSC".to_string(), "MATH".to_string()])
        );
    }

    #[test]
    fn rejects_empty_advisor_departments() {
        let text = format!("{MINIMAL}\n[advisor]\ndepartments = [\" \"]\n");
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("advisor.departments"));
    }

    #[test]
    fn pinecone_requires_host() {
        let text = format!("{MINIMAL}\n[retrieval]\nprovider = \"pinecone\"\n");
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("retrieval.host"));
    }

    #[test]
    fn openai_requires_model_and_dims() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"openai\"\n");
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn rejects_unknown_partition_provider() {
        let text = format!("{MINIMAL}\n[partition]\nprovider = \"textract\"\n");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let text = format!("{MINIMAL}\n[advisor]\nsimilarity_threshold = 1.5\n");
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn missing_catalog_section_is_an_error() {
        let err = parse_config("[server]\nbind = \"0.0.0.0:1\"\n").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_config(include_str!("../config/gaucho.example.toml")).unwrap();
        assert_eq!(config.partition.provider, "aryn");
        assert_eq!(config.retrieval.top_k, 3);
    }
}
