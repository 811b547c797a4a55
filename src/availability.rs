//! Course availability resolution.
//!
//! Given the courses a student has completed, picks the catalog courses they
//! can take next: not already completed, prerequisites satisfied, ranked by
//! unit count (highest first) with catalog order breaking ties.

use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

use crate::catalog::Catalog;
use crate::models::{AvailableCourse, CourseRecord};
use crate::prereq::PrerequisiteMatcher;

/// Maximum number of courses returned for one transcript.
pub const MAX_AVAILABLE_COURSES: usize = 10;

/// Resolves available courses against a fixed catalog.
#[derive(Clone)]
pub struct AvailabilityResolver {
    matcher: PrerequisiteMatcher,
    max_results: usize,
}

impl AvailabilityResolver {
    pub fn new(matcher: PrerequisiteMatcher) -> Self {
        Self::with_limit(matcher, MAX_AVAILABLE_COURSES)
    }

    pub fn with_limit(matcher: PrerequisiteMatcher, max_results: usize) -> Self {
        Self {
            matcher,
            max_results,
        }
    }

    /// Courses the student may take next, best first, at most `max_results`.
    ///
    /// A completed course is never returned, whatever its prerequisites say.
    pub async fn resolve(
        &self,
        catalog: &Catalog,
        completed: &[String],
    ) -> Result<Vec<AvailableCourse>> {
        let taken: HashSet<String> = completed.iter().map(|c| c.to_uppercase()).collect();
        let candidates: Vec<&CourseRecord> = catalog
            .courses()
            .iter()
            .filter(|c| !taken.contains(&c.code.to_uppercase()))
            .collect();

        let completed_vectors = self.matcher.embed_completed(completed).await?;
        let prerequisites: Vec<Option<&str>> = candidates
            .iter()
            .map(|c| c.prerequisites.as_deref())
            .collect();
        let verdicts = self
            .matcher
            .evaluate(&prerequisites, &completed_vectors)
            .await?;

        let eligible: Vec<&CourseRecord> = candidates
            .into_iter()
            .zip(verdicts)
            .filter_map(|(course, ok)| ok.then_some(course))
            .collect();

        debug!(
            completed = completed.len(),
            eligible = eligible.len(),
            "Resolved course availability"
        );

        Ok(rank_by_units(eligible, self.max_results))
    }
}

/// Stable sort by units descending, then truncate.
pub fn rank_by_units(mut courses: Vec<&CourseRecord>, limit: usize) -> Vec<AvailableCourse> {
    courses.sort_by(|a, b| b.units.total_cmp(&a.units));
    courses
        .into_iter()
        .take(limit)
        .map(AvailableCourse::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::fake::KeyedEmbedder;
    use std::sync::Arc;

    fn course(code: &str, prereqs: Option<&str>, units: f64) -> CourseRecord {
        CourseRecord {
            code: code.to_string(),
            title: format!("{code} title"),
            prerequisites: prereqs.map(str::to_string),
            description: String::new(),
            units,
            dept: code.split(' ').next().unwrap_or_default().to_string(),
        }
    }

    fn resolver() -> (AvailabilityResolver, Arc<KeyedEmbedder>) {
        let embedder = Arc::new(KeyedEmbedder::new(
            &[
                ("CMPSC 16", vec![1.0, 0.0]),
                ("CMPSC 24", vec![0.8, 0.6]),
                ("CMPSC 16 or equivalent", vec![0.95, 0.05]),
                ("CMPSC 24 with C or better", vec![0.75, 0.66]),
            ],
            vec![0.0, 1.0],
        ));
        let matcher = PrerequisiteMatcher::new(embedder.clone());
        (AvailabilityResolver::new(matcher), embedder)
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn result_codes(courses: &[AvailableCourse]) -> Vec<&str> {
        courses.iter().map(|c| c.code.as_str()).collect()
    }

    #[tokio::test]
    async fn no_completed_courses_returns_unconstrained_only() {
        let catalog = Catalog::from_records(vec![
            course("CMPSC 8", None, 4.0),
            course("CMPSC 24", Some("CMPSC 16 or equivalent"), 4.0),
            course("WRIT 2", Some("None"), 4.0),
            course("MATH 2A", Some(""), 5.0),
        ]);
        let (resolver, embedder) = resolver();

        let available = resolver.resolve(&catalog, &[]).await.unwrap();
        assert_eq!(result_codes(&available), vec!["MATH 2A", "CMPSC 8", "WRIT 2"]);
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn completed_courses_are_always_excluded() {
        let catalog = Catalog::from_records(vec![
            course("CMPSC 16", None, 4.0),
            course("CMPSC 24", Some("CMPSC 16 or equivalent"), 4.0),
        ]);
        let (resolver, _) = resolver();

        let available = resolver
            .resolve(&catalog, &codes(&["CMPSC 16", "CMPSC 24"]))
            .await
            .unwrap();
        assert!(available.is_empty());
    }

    #[tokio::test]
    async fn satisfied_prerequisites_unlock_courses() {
        let catalog = Catalog::from_records(vec![
            course("CMPSC 24", Some("CMPSC 16 or equivalent"), 4.0),
            course("CMPSC 32", Some("CMPSC 24 with C or better"), 4.0),
            course("CMPSC 130A", Some("PSTAT 120A"), 4.0),
        ]);
        let (resolver, _) = resolver();

        let available = resolver
            .resolve(&catalog, &codes(&["CMPSC 16"]))
            .await
            .unwrap();
        assert_eq!(result_codes(&available), vec!["CMPSC 24", "CMPSC 32"]);
    }

    #[tokio::test]
    async fn ranks_by_units_with_stable_ties_and_truncates() {
        let mut records = Vec::new();
        for i in 0..12 {
            let units = if i % 3 == 0 { 5.0 } else { 4.0 };
            records.push(course(&format!("MUS {}", i + 1), None, units));
        }
        let catalog = Catalog::from_records(records);
        let (resolver, _) = resolver();

        let available = resolver.resolve(&catalog, &[]).await.unwrap();
        assert_eq!(available.len(), MAX_AVAILABLE_COURSES);
        assert_eq!(
            result_codes(&available),
            vec![
                "MUS 1", "MUS 4", "MUS 7", "MUS 10", "MUS 2", "MUS 3", "MUS 5", "MUS 6", "MUS 8",
                "MUS 9"
            ]
        );
    }

    #[tokio::test]
    async fn empty_catalog_is_an_empty_result() {
        let (resolver, _) = resolver();
        let available = resolver
            .resolve(&Catalog::default(), &codes(&["CMPSC 16"]))
            .await
            .unwrap();
        assert!(available.is_empty());
    }

    #[test]
    fn rank_respects_limit() {
        let a = course("A 1", None, 1.0);
        let b = course("B 1", None, 3.0);
        let ranked = rank_by_units(vec![&a, &b], 1);
        assert_eq!(result_codes(&ranked), vec!["B 1"]);
    }
}
