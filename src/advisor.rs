//! Transcript pipeline: partition the PDF, pull completed course codes out of
//! its tables, then resolve what the student can take next.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::availability::AvailabilityResolver;
use crate::catalog::Catalog;
use crate::course_codes::CourseCodeMatcher;
use crate::models::{table_texts, TranscriptElement, TranscriptReport};
use crate::partition::Partitioner;

#[derive(Clone)]
pub struct Advisor {
    catalog: Arc<Catalog>,
    partitioner: Arc<dyn Partitioner>,
    codes: CourseCodeMatcher,
    resolver: AvailabilityResolver,
}

impl Advisor {
    pub fn new(
        catalog: Arc<Catalog>,
        partitioner: Arc<dyn Partitioner>,
        resolver: AvailabilityResolver,
    ) -> Self {
        Self {
            catalog,
            partitioner,
            codes: CourseCodeMatcher::default(),
            resolver,
        }
    }

    /// Replace the department vocabulary used to recognise course codes.
    pub fn with_course_codes(mut self, codes: CourseCodeMatcher) -> Self {
        self.codes = codes;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Sorted, deduplicated course codes found in the transcript's tables.
    pub async fn completed_courses(&self, pdf: Vec<u8>) -> Result<Vec<String>> {
        let elements = self
            .partitioner
            .partition(pdf)
            .await
            .with_context(|| format!("{} partitioner failed", self.partitioner.name()))?;
        for element in &elements {
            if let TranscriptElement::Other { kind, text } = element {
                debug!(kind = %kind, chars = text.len(), "Skipping non-table element");
            }
        }
        let tables = table_texts(&elements);
        let completed = self.codes.extract(&tables);
        info!(
            tables = tables.len(),
            completed = completed.len(),
            "Extracted completed courses"
        );
        Ok(completed)
    }

    pub async fn report_for(&self, completed: Vec<String>) -> Result<TranscriptReport> {
        let available_courses = self.resolver.resolve(&self.catalog, &completed).await?;
        Ok(TranscriptReport {
            completed_courses: completed,
            available_courses,
        })
    }

    /// Full pipeline for one uploaded transcript.
    pub async fn analyze(&self, pdf: Vec<u8>) -> Result<TranscriptReport> {
        let completed = self.completed_courses(pdf).await?;
        self.report_for(completed).await
    }
}
