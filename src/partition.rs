//! Transcript partitioning: PDF bytes in, typed elements out.
//!
//! Two providers, selected by `[partition].provider`:
//!
//! - **`aryn`** — the hosted DocParse partition API. Tables come back with
//!   cell-level structure, which is what the course-code extractor wants.
//! - **`local`** — offline text extraction with `pdf-extract`. There is no
//!   table detection, so the whole text layer is returned as a single table
//!   element with one row per line.
//!
//! Only table elements are consumed downstream; see
//! [`table_texts`](crate::models::table_texts).

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PartitionConfig;
use crate::models::{TableBlock, TableCell, TranscriptElement};

pub const MIME_PDF: &str = "application/pdf";

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("ARYN_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("partition request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("partition service error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid partition response: {0}")]
    Parse(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Converts a PDF into typed elements.
#[async_trait]
pub trait Partitioner: Send + Sync {
    fn name(&self) -> &str;
    async fn partition(&self, pdf: Vec<u8>) -> Result<Vec<TranscriptElement>, PartitionError>;
}

// ============ Aryn DocParse ============

/// Client for the hosted DocParse partition endpoint.
pub struct ArynPartitioner {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl ArynPartitioner {
    pub fn new(config: &PartitionConfig) -> Result<Self, PartitionError> {
        let api_key = std::env::var("ARYN_API_KEY").map_err(|_| PartitionError::MissingApiKey)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &PartitionConfig, api_key: String) -> Result<Self, PartitionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Partitioner for ArynPartitioner {
    fn name(&self) -> &str {
        "aryn"
    }

    async fn partition(&self, pdf: Vec<u8>) -> Result<Vec<TranscriptElement>, PartitionError> {
        let size = pdf.len();
        let file = reqwest::multipart::Part::bytes(pdf)
            .file_name("transcript.pdf")
            .mime_str(MIME_PDF)?;
        let options = serde_json::json!({ "extract_table_structure": true }).to_string();
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("options", options);

        debug!(bytes = size, url = %self.url, "Sending transcript to partition service");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PartitionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let elements = parse_aryn_response(&body)?;
        info!(elements = elements.len(), "Transcript partitioned");
        Ok(elements)
    }
}

#[derive(Debug, Deserialize)]
struct ArynResponse {
    #[serde(default)]
    elements: Vec<ArynElement>,
}

#[derive(Debug, Deserialize)]
struct ArynElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text_representation: Option<String>,
    #[serde(default)]
    table: Option<ArynTable>,
}

#[derive(Debug, Deserialize)]
struct ArynTable {
    #[serde(default)]
    cells: Vec<ArynCell>,
}

#[derive(Debug, Deserialize)]
struct ArynCell {
    #[serde(default)]
    content: String,
    #[serde(default)]
    rows: Vec<usize>,
    #[serde(default)]
    cols: Vec<usize>,
}

/// Map a DocParse JSON body to transcript elements. Spanning cells are
/// placed at their first row and column.
pub fn parse_aryn_response(body: &str) -> Result<Vec<TranscriptElement>, PartitionError> {
    let response: ArynResponse =
        serde_json::from_str(body).map_err(|e| PartitionError::Parse(e.to_string()))?;

    Ok(response
        .elements
        .into_iter()
        .map(|element| {
            if !element.kind.eq_ignore_ascii_case("table") {
                return TranscriptElement::Other {
                    kind: element.kind,
                    text: element.text_representation.unwrap_or_default(),
                };
            }
            let table = match element.table {
                Some(table) if !table.cells.is_empty() => TableBlock {
                    cells: table
                        .cells
                        .into_iter()
                        .map(|cell| TableCell {
                            row: cell.rows.first().copied().unwrap_or_default(),
                            col: cell.cols.first().copied().unwrap_or_default(),
                            content: cell.content,
                        })
                        .collect(),
                },
                _ => TableBlock::from_lines(element.text_representation.as_deref().unwrap_or("")),
            };
            TranscriptElement::Table(table)
        })
        .collect())
}

// ============ Local pdf-extract ============

/// Offline partitioner backed by the PDF text layer.
pub struct LocalPdfPartitioner;

#[async_trait]
impl Partitioner for LocalPdfPartitioner {
    fn name(&self) -> &str {
        "local"
    }

    async fn partition(&self, pdf: Vec<u8>) -> Result<Vec<TranscriptElement>, PartitionError> {
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&pdf))
            .await
            .map_err(|e| PartitionError::Pdf(e.to_string()))??;

        let table = TableBlock::from_lines(&text);
        if table.cells.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TranscriptElement::Table(table)])
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, PartitionError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| PartitionError::Pdf(e.to_string()))
}

/// Create the configured [`Partitioner`].
pub fn create_partitioner(config: &PartitionConfig) -> anyhow::Result<Arc<dyn Partitioner>> {
    match config.provider.as_str() {
        "aryn" => Ok(Arc::new(ArynPartitioner::new(config)?)),
        "local" => Ok(Arc::new(LocalPdfPartitioner)),
        other => anyhow::bail!("Unknown partition provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::table_texts;

    #[test]
    fn parses_table_cells_and_other_elements() {
        let body = r#"{
            "status": ["ok"],
            "elements": [
                { "type": "Title", "text_representation": "Unofficial Transcript" },
                { "type": "table", "table": { "cells": [
                    { "content": "CMPSC 16", "rows": [0], "cols": [0] },
                    { "content": "Problem Solving I", "rows": [0], "cols": [1] },
                    { "content": "CMPSC 24", "rows": [1], "cols": [0] },
                    { "content": "Problem Solving II", "rows": [1, 2], "cols": [1] }
                ] } }
            ]
        }"#;
        let elements = parse_aryn_response(body).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(matches!(&elements[0], TranscriptElement::Other { kind, .. } if kind == "Title"));
        assert_eq!(
            table_texts(&elements),
            vec!["CMPSC 16 Problem Solving I\nCMPSC 24 Problem Solving II".to_string()]
        );
    }

    #[test]
    fn table_without_cells_falls_back_to_text() {
        let body = r#"{ "elements": [
            { "type": "Table", "text_representation": "MATH 3A 4.0\nMATH 3B 4.0" }
        ] }"#;
        let elements = parse_aryn_response(body).unwrap();
        assert_eq!(
            table_texts(&elements),
            vec!["MATH 3A 4.0\nMATH 3B 4.0".to_string()]
        );
    }

    #[test]
    fn missing_elements_is_empty() {
        assert!(parse_aryn_response("{}").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_aryn_response("<html>").unwrap_err();
        assert!(matches!(err, PartitionError::Parse(_)));
    }

    #[tokio::test]
    async fn local_partitioner_rejects_non_pdf() {
        let err = LocalPdfPartitioner
            .partition(b"not a pdf".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PartitionError::Pdf(_)));
    }
}
