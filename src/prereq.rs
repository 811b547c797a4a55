//! Semantic prerequisite matching.
//!
//! Catalog prerequisite text is free-form ("CMPSC 16 with a grade of C or
//! better", "Computer Science 16"), so it is compared to the student's
//! completed course codes by embedding similarity instead of string equality.
//! A prerequisite is satisfied when its best match among the completed codes
//! scores strictly above the threshold.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::{dot_product, Embedder};

/// Minimum similarity (exclusive) for a completed course to satisfy a
/// prerequisite description.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// True when the description imposes no prerequisite: absent, blank, or
/// "none" in any case.
pub fn has_no_prerequisites(prerequisites: Option<&str>) -> bool {
    match prerequisites.map(str::trim) {
        None | Some("") => true,
        Some(text) => text.eq_ignore_ascii_case("none"),
    }
}

/// Highest similarity between `prerequisite` and any completed-course vector,
/// or `None` when there is nothing to compare against.
pub fn max_similarity(prerequisite: &[f32], completed: &[Vec<f32>]) -> Option<f64> {
    completed
        .iter()
        .map(|c| dot_product(prerequisite, c))
        .max_by(|a, b| a.total_cmp(b))
}

/// Embedded completed-course codes for one transcript.
#[derive(Debug, Clone, Default)]
pub struct CompletedEmbeddings {
    vectors: Vec<Vec<f32>>,
}

impl CompletedEmbeddings {
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }
}

/// Decides prerequisite satisfaction against a set of completed courses.
#[derive(Clone)]
pub struct PrerequisiteMatcher {
    embedder: Arc<dyn Embedder>,
    threshold: f64,
}

impl PrerequisiteMatcher {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_threshold(embedder, SIMILARITY_THRESHOLD)
    }

    pub fn with_threshold(embedder: Arc<dyn Embedder>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    /// Strict comparison: a similarity equal to the threshold does not match.
    pub fn exceeds_threshold(&self, similarity: f64) -> bool {
        similarity > self.threshold
    }

    /// Embed the completed codes once so they can be reused for every
    /// candidate course. An empty list makes no embedding call.
    pub async fn embed_completed(&self, completed: &[String]) -> Result<CompletedEmbeddings> {
        if completed.is_empty() {
            return Ok(CompletedEmbeddings::default());
        }
        let vectors = self.embedder.embed(completed).await?;
        if vectors.len() != completed.len() {
            bail!(
                "expected {} completed-course embeddings, got {}",
                completed.len(),
                vectors.len()
            );
        }
        Ok(CompletedEmbeddings { vectors })
    }

    /// Whether an embedded prerequisite is covered by the completed courses.
    pub fn satisfied_by(&self, prerequisite: &[f32], completed: &CompletedEmbeddings) -> bool {
        max_similarity(prerequisite, &completed.vectors)
            .is_some_and(|best| self.exceeds_threshold(best))
    }

    /// Whether one prerequisite description is satisfied by `completed`.
    pub async fn is_satisfied(
        &self,
        prerequisites: Option<&str>,
        completed: &[String],
    ) -> Result<bool> {
        let completed = self.embed_completed(completed).await?;
        Ok(self.evaluate(&[prerequisites], &completed).await?[0])
    }

    /// Evaluate many prerequisite descriptions against already-embedded
    /// completed courses. Distinct constrained descriptions are embedded in a
    /// single batch; with no completed courses no embedding call is made.
    pub async fn evaluate(
        &self,
        prerequisites: &[Option<&str>],
        completed: &CompletedEmbeddings,
    ) -> Result<Vec<bool>> {
        let mut verdicts: Vec<Option<bool>> = prerequisites
            .iter()
            .map(|p| {
                if has_no_prerequisites(*p) {
                    Some(true)
                } else if completed.is_empty() {
                    Some(false)
                } else {
                    None
                }
            })
            .collect();

        let mut distinct: Vec<String> = Vec::new();
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        for (p, verdict) in prerequisites.iter().zip(&verdicts) {
            if let (Some(text), None) = (*p, verdict) {
                let text = text.trim();
                if !slot_of.contains_key(text) {
                    slot_of.insert(text, distinct.len());
                    distinct.push(text.to_string());
                }
            }
        }

        if !distinct.is_empty() {
            let vectors = self.embedder.embed(&distinct).await?;
            if vectors.len() != distinct.len() {
                bail!(
                    "expected {} prerequisite embeddings, got {}",
                    distinct.len(),
                    vectors.len()
                );
            }
            debug!(
                prerequisites = distinct.len(),
                completed = completed.len(),
                "Scoring prerequisite descriptions"
            );

            for (p, verdict) in prerequisites.iter().zip(verdicts.iter_mut()) {
                if verdict.is_none() {
                    let text = p.map(str::trim).unwrap_or_default();
                    let slot = slot_of[text];
                    *verdict = Some(self.satisfied_by(&vectors[slot], completed));
                }
            }
        }

        Ok(verdicts.into_iter().map(|v| v.unwrap_or(false)).collect())
    }
}
