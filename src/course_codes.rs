//! Course-code extraction from transcript table text.
//!
//! A course code is a department abbreviation from a closed vocabulary, one
//! space or tab, then 1-3 digits and an optional uppercase letter suffix
//! (`CMPSC 24`, `MATH 4A`, `POL S 1`). Matching is case-sensitive and bounded
//! by word boundaries, so `CMPSC 1234` and `cmpsc 16` are never extracted.
//! Codes broken across a line or padded with extra spaces are not recovered.

use regex::Regex;
use std::collections::BTreeSet;

/// Department abbreviations as printed on UCSB transcripts.
pub const UCSB_DEPARTMENTS: &[&str] = &[
    "ANTH", "ART", "ARTHI", "ARTST", "AS AM", "ASTRO", "BIOE", "BIOL", "BL ST", "BMSE", "C LIT",
    "CH E", "CH ST", "CHEM", "CHIN", "CLASS", "CMPSC", "CMPSCW", "CMPTG", "CNCSP", "COMM", "DANCE",
    "EARTH", "EACS", "ECE", "ECON", "ED", "EEMB", "ENGL", "ENGR", "ENV S", "ES", "ESM", "ESS",
    "FAMST", "FEMST", "FR", "GEOG", "GER", "GLOBL", "GPS", "GREEK", "HEB", "HIST", "INT", "ITAL",
    "JAPAN", "KOR", "LAIS", "LATIN", "LING", "MARSC", "MAT", "MATH", "MATRL", "MCDB", "ME", "MES",
    "MS", "MUS", "PHIL", "PHYS", "POL S", "PORT", "PSTAT", "PSY", "RG ST", "RUSS", "SLAV", "SOC",
    "SPAN", "SHS", "THTR", "TMP", "W&L", "WRIT",
];

/// A compiled matcher for one department vocabulary.
#[derive(Debug, Clone)]
pub struct CourseCodeMatcher {
    departments: Vec<String>,
    /// `None` when the vocabulary is empty.
    pattern: Option<Regex>,
}

impl CourseCodeMatcher {
    /// Compile a matcher for the given department abbreviations.
    ///
    /// # Panics
    ///
    /// Never in practice: every department is escaped before it is placed in
    /// the pattern, so the generated regex is always valid.
    pub fn new<S: AsRef<str>>(departments: &[S]) -> Self {
        let mut departments: Vec<String> = departments
            .iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        // Longest first so "CMPSCW" is tried before "CMPSC".
        departments.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let pattern = (!departments.is_empty()).then(|| {
            let alternatives = departments
                .iter()
                .map(|d| regex::escape(d))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\b({alternatives})[ \t](\d{{1,3}}[A-Z]?)\b"))
                .expect("escaped department pattern is valid")
        });

        Self {
            departments,
            pattern,
        }
    }

    /// The vocabulary this matcher was built from, longest first.
    pub fn departments(&self) -> &[String] {
        &self.departments
    }

    /// Course codes found in one block of text, in order of appearance.
    pub fn find_in(&self, text: &str) -> Vec<String> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let dept = caps.get(1)?;
                let number = caps.get(2)?;
                Some(format!("{} {}", dept.as_str(), number.as_str()))
            })
            .collect()
    }

    /// Sorted, deduplicated course codes across all blocks.
    pub fn extract<S: AsRef<str>>(&self, blocks: &[S]) -> Vec<String> {
        blocks
            .iter()
            .flat_map(|block| self.find_in(block.as_ref()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for CourseCodeMatcher {
    fn default() -> Self {
        Self::new(UCSB_DEPARTMENTS)
    }
}
