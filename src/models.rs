//! Core data models shared by the catalog, the transcript pipeline and the
//! chat flow.

use serde::Serialize;
use std::collections::BTreeMap;

/// One catalog entry. Immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRecord {
    pub code: String,
    pub title: String,
    /// Free-text prerequisite description; `None` means no prerequisites.
    pub prerequisites: Option<String>,
    pub description: String,
    pub units: f64,
    pub dept: String,
}

/// A catalog course the student may take next, in the shape the upload
/// endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableCourse {
    pub code: String,
    pub title: String,
    pub prereqs: Option<String>,
    pub description: String,
    pub units: f64,
}

impl From<&CourseRecord> for AvailableCourse {
    fn from(course: &CourseRecord) -> Self {
        Self {
            code: course.code.clone(),
            title: course.title.clone(),
            prereqs: course.prerequisites.clone(),
            description: course.description.clone(),
            units: course.units,
        }
    }
}

/// Result of running one transcript through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptReport {
    pub completed_courses: Vec<String>,
    pub available_courses: Vec<AvailableCourse>,
}

/// Letter-grade counts for one offering. Missing columns count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GradeCounts {
    #[serde(rename = "Ap")]
    pub a_plus: u32,
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "Am")]
    pub a_minus: u32,
    #[serde(rename = "Bp")]
    pub b_plus: u32,
    #[serde(rename = "B")]
    pub b: u32,
    #[serde(rename = "Bm")]
    pub b_minus: u32,
    #[serde(rename = "Cp")]
    pub c_plus: u32,
    #[serde(rename = "C")]
    pub c: u32,
    #[serde(rename = "Cm")]
    pub c_minus: u32,
    #[serde(rename = "D")]
    pub d: u32,
    #[serde(rename = "F")]
    pub f: u32,
}

/// One quarter's section of a course with its grade distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOffering {
    pub instructor: Option<String>,
    pub quarter: Option<String>,
    pub year: Option<u32>,
    #[serde(rename = "avgGPA")]
    pub avg_gpa: Option<f64>,
    #[serde(rename = "nLetterStudents")]
    pub n_letter_students: Option<u32>,
    pub grades: GradeCounts,
}

/// A catalog course together with every recorded offering, in dataset order.
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseRecord,
    pub offerings: Vec<CourseOffering>,
}

/// A single cell of a partitioned table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
    pub content: String,
}

/// A table region found in a transcript.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableBlock {
    pub cells: Vec<TableCell>,
}

impl TableBlock {
    /// A block with one cell per line of `text`, used when no table
    /// structure is available.
    pub fn from_lines(text: &str) -> Self {
        let cells = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(row, line)| TableCell {
                row,
                col: 0,
                content: line.to_string(),
            })
            .collect();
        Self { cells }
    }

    /// Renders the table as text: cells of a row joined by a space in column
    /// order, rows joined by newlines in row order.
    pub fn to_text(&self) -> String {
        let mut rows: BTreeMap<usize, Vec<&TableCell>> = BTreeMap::new();
        for cell in &self.cells {
            rows.entry(cell.row).or_default().push(cell);
        }

        rows.into_values()
            .map(|mut cells| {
                cells.sort_by_key(|c| c.col);
                cells
                    .iter()
                    .map(|c| c.content.trim())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One element returned by a document partitioner.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptElement {
    Table(TableBlock),
    Other { kind: String, text: String },
}

/// Row-joined text of every table element, in document order. Non-table
/// elements are dropped.
pub fn table_texts(elements: &[TranscriptElement]) -> Vec<String> {
    elements
        .iter()
        .filter_map(|e| match e {
            TranscriptElement::Table(table) => Some(table.to_text()),
            TranscriptElement::Other { .. } => None,
        })
        .collect()
}

/// One nearest-neighbour match returned by the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize, col: usize, content: &str) -> TableCell {
        TableCell {
            row,
            col,
            content: content.to_string(),
        }
    }

    #[test]
    fn table_text_orders_rows_and_columns() {
        let table = TableBlock {
            cells: vec![
                cell(1, 1, "Data Structures"),
                cell(0, 0, "CMPSC 16"),
                cell(1, 0, "CMPSC 24"),
                cell(0, 1, "Intro"),
            ],
        };
        assert_eq!(table.to_text(), "CMPSC 16 Intro\nCMPSC 24 Data Structures");
    }

    #[test]
    fn table_text_skips_blank_cells() {
        let table = TableBlock {
            cells: vec![cell(0, 0, "MATH 3A"), cell(0, 1, "  "), cell(0, 2, "4.0")],
        };
        assert_eq!(table.to_text(), "MATH 3A 4.0");
    }

    #[test]
    fn from_lines_drops_empty_lines() {
        let table = TableBlock::from_lines("CMPSC 8\n\n  MATH 4A  \n");
        assert_eq!(table.cells.len(), 2);
        assert_eq!(table.to_text(), "CMPSC 8\nMATH 4A");
    }

    #[test]
    fn only_tables_contribute_text() {
        let elements = vec![
            TranscriptElement::Other {
                kind: "Title".to_string(),
                text: "CMPSC 999".to_string(),
            },
            TranscriptElement::Table(TableBlock::from_lines("PHYS 1")),
        ];
        assert_eq!(table_texts(&elements), vec!["PHYS 1".to_string()]);
    }

    #[test]
    fn available_course_serializes_prereqs_key() {
        let course = CourseRecord {
            code: "CMPSC 24".to_string(),
            title: "Problem Solving II".to_string(),
            prerequisites: Some("CMPSC 16".to_string()),
            description: "Data structures.".to_string(),
            units: 4.0,
            dept: "CMPSC".to_string(),
        };
        let json = serde_json::to_value(AvailableCourse::from(&course)).unwrap();
        assert_eq!(json["prereqs"], "CMPSC 16");
        assert_eq!(json["units"], 4.0);
        assert!(json.get("dept").is_none());
    }

    #[test]
    fn offering_uses_explorer_field_names() {
        let offering = CourseOffering {
            instructor: Some("CONRAD P T".to_string()),
            quarter: Some("Fall".to_string()),
            year: Some(2022),
            avg_gpa: Some(3.12),
            n_letter_students: Some(180),
            grades: GradeCounts {
                a_plus: 20,
                f: 3,
                ..GradeCounts::default()
            },
        };
        let json = serde_json::to_value(&offering).unwrap();
        assert_eq!(json["avgGPA"], 3.12);
        assert_eq!(json["nLetterStudents"], 180);
        assert_eq!(json["grades"]["Ap"], 20);
        assert_eq!(json["grades"]["Bm"], 0);
        assert_eq!(json["grades"]["F"], 3);
    }
}
