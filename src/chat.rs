//! Retrieval-augmented answers about course statistics.
//!
//! The flow is a straight pipeline with no retries or caching:
//! embed the question → nearest-neighbour query against the grade-distribution
//! index → format the matches' metadata as context → ask the language model.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{LlmConfig, RetrievalConfig};
use crate::embedding::{embed_one, Embedder};
use crate::models::IndexMatch;

/// Number of index matches used as context for one question.
pub const RETRIEVAL_TOP_K: usize = 3;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Answer returned when the index has nothing related to the question.
pub const NO_MATCHES_ANSWER: &str = "I couldn't find any relevant information for your query.";

// ============ Vector index ============

/// Nearest-neighbour search over embedded course offerings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>>;
}

/// Used when `retrieval.provider = "disabled"`.
pub struct DisabledIndex;

#[async_trait]
impl VectorIndex for DisabledIndex {
    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<IndexMatch>> {
        anyhow::bail!("Vector index is disabled")
    }
}

/// Pinecone data-plane client (`POST {host}/query`).
///
/// Requires the `PINECONE_API_KEY` environment variable.
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    namespace: Option<String>,
    api_key: String,
}

impl PineconeIndex {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| anyhow::anyhow!("retrieval.host required for Pinecone provider"))?;
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = json!(namespace);
        }

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Pinecone query failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone API error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        parse_pinecone_matches(&json)
    }
}

fn parse_pinecone_matches(json: &Value) -> Result<Vec<IndexMatch>> {
    let Some(matches) = json.get("matches") else {
        return Ok(Vec::new());
    };
    let matches = matches
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: matches is not an array"))?;

    Ok(matches
        .iter()
        .map(|m| IndexMatch {
            id: m["id"].as_str().unwrap_or_default().to_string(),
            score: m["score"].as_f64().unwrap_or_default() as f32,
            metadata: m["metadata"].as_object().cloned().unwrap_or_default(),
        })
        .collect())
}

// ============ Language model ============

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// A hosted model that turns a single user prompt into an answer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Used when `llm.provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured("language model is disabled".into()))
    }
}

/// Anthropic Messages API client.
///
/// Requires the `ANTHROPIC_API_KEY` environment variable.
pub struct ClaudeModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ClaudeModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for ClaudeModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = "https://api.anthropic.com/v1/messages";
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": prompt }],
            }],
        });

        debug!(model = %self.model, "Claude request to {}", url);

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: Value = response.json().await?;
        resp["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Parse("missing content[0].text".into()))
    }
}

// ============ Chat service ============

/// Answers questions using injected embedding, index and model clients.
#[derive(Clone)]
pub struct ChatService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl ChatService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            embedder,
            index,
            model,
            top_k: RETRIEVAL_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn answer(&self, query: &str) -> Result<String> {
        let vector = embed_one(self.embedder.as_ref(), query)
            .await
            .context("failed to embed query")?;
        let matches = self
            .index
            .query(&vector, self.top_k)
            .await
            .context("failed to query vector index")?;

        if matches.is_empty() {
            info!("No index matches for query");
            return Ok(NO_MATCHES_ANSWER.to_string());
        }
        info!(matches = matches.len(), "Retrieved context for query");
        for m in &matches {
            debug!(id = %m.id, score = m.score, "Index match");
        }

        let context = format_context(&matches);
        debug!(%context, "Formatted context");

        let answer = self
            .model
            .complete(&build_prompt(query, &context))
            .await
            .context("language model request failed")?;
        Ok(answer)
    }
}

/// One line per match describing the offering and its grade statistics.
pub fn format_context(matches: &[IndexMatch]) -> String {
    matches
        .iter()
        .map(|m| {
            let field = |key: &str| metadata_text(m.metadata.get(key));
            format!(
                "Course: {}, Instructor: {}, Department: {}, Term: {} {}, \
                 Average GPA: {}, Number of Students: {}",
                field("course"),
                field("instructor"),
                field("dept"),
                field("quarter"),
                field("year"),
                field("avgGPA"),
                field("nLetterStudents"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn metadata_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(Value::String(s)) => s.clone(),
        // Printed as stored: the indexer writes years and counts as floats,
        // so they read "2022.0" and "180.0".
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn build_prompt(query: &str, context: &str) -> String {
    format!("Given this context: {context}\n\nAnswer this question: {query}")
}

pub fn create_index(config: &RetrievalConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledIndex)),
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        other => anyhow::bail!("Unknown retrieval provider: {}", other),
    }
}

pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "anthropic" => Ok(Arc::new(ClaudeModel::new(config)?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}
