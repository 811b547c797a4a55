//! Course catalog loaded from a static CSV dataset.
//!
//! The dataset is the same `courses.csv` the course explorer ships: one row
//! per course offering, so a course code usually appears once per quarter and
//! instructor. Course details (title, prerequisites, units) come from the
//! first row for a code; later rows only contribute their offering and are
//! counted in a warning. Every offering is kept for course lookups.
//!
//! Recognised columns (extra columns are ignored):
//!
//! | Column | Aliases | Required |
//! |--------|---------|----------|
//! | `course` | `code` | yes |
//! | `coursetitle` | `title` | no |
//! | `prereqs` | `prerequisites` | no |
//! | `description` | | no |
//! | `units` | | no (blank is 0) |
//! | `dept` | | no (derived from the code) |
//! | `instructor`, `quarter`, `year` | | no |
//! | `avgGPA`, `nLetterStudents` | | no |
//! | `Ap`, `A`, `Am`, `Bp`, `B`, `Bm`, `Cp`, `C`, `Cm`, `D`, `F` | | no (blank is 0) |

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{CourseDetail, CourseOffering, CourseRecord, GradeCounts};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to open catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog row {row}: {source}")]
    Csv {
        row: u64,
        #[source]
        source: csv::Error,
    },
    #[error("catalog row {row}: course code is empty")]
    EmptyCode { row: u64 },
    #[error("catalog row {row}: invalid units value '{value}'")]
    InvalidUnits { row: u64, value: String },
    #[error("catalog row {row}: invalid {column} value '{value}'")]
    InvalidNumber {
        row: u64,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(alias = "code")]
    course: String,
    #[serde(default, alias = "title")]
    coursetitle: Option<String>,
    #[serde(default, alias = "prerequisites")]
    prereqs: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    dept: Option<String>,
    #[serde(default)]
    instructor: Option<String>,
    #[serde(default)]
    quarter: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default, rename = "avgGPA")]
    avg_gpa: Option<String>,
    #[serde(default, rename = "nLetterStudents")]
    n_letter_students: Option<String>,
    #[serde(default, rename = "Ap")]
    a_plus: Option<String>,
    #[serde(default, rename = "A")]
    a: Option<String>,
    #[serde(default, rename = "Am")]
    a_minus: Option<String>,
    #[serde(default, rename = "Bp")]
    b_plus: Option<String>,
    #[serde(default, rename = "B")]
    b: Option<String>,
    #[serde(default, rename = "Bm")]
    b_minus: Option<String>,
    #[serde(default, rename = "Cp")]
    c_plus: Option<String>,
    #[serde(default, rename = "C")]
    c: Option<String>,
    #[serde(default, rename = "Cm")]
    c_minus: Option<String>,
    #[serde(default, rename = "D")]
    d: Option<String>,
    #[serde(default, rename = "F")]
    f: Option<String>,
}

/// In-memory, read-only course catalog keyed by course code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: Vec<CourseRecord>,
    /// Parallel to `courses`.
    offerings: Vec<Vec<CourseOffering>>,
    by_code: HashMap<String, usize>,
    duplicates_dropped: usize,
}

impl Catalog {
    /// Load the catalog CSV at `path`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            courses = catalog.len(),
            "Loaded course catalog"
        );
        Ok(catalog)
    }

    /// Parse catalog rows from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (idx, result) in csv_reader.deserialize::<CatalogRow>().enumerate() {
            // Header is line 1.
            let row = idx as u64 + 2;
            let raw = result.map_err(|source| CatalogError::Csv { row, source })?;
            let offering = row_to_offering(&raw, row);
            let record = row_to_record(raw, row)?;
            entries.push((record, offering?));
        }

        Ok(Self::from_entries(entries))
    }

    /// Build a catalog from already-parsed records, keeping the first record
    /// for each code.
    pub fn from_records(records: Vec<CourseRecord>) -> Self {
        Self::from_entries(records.into_iter().map(|record| (record, None)))
    }

    fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (CourseRecord, Option<CourseOffering>)>,
    {
        let mut courses = Vec::new();
        let mut offerings: Vec<Vec<CourseOffering>> = Vec::new();
        let mut by_code = HashMap::new();
        let mut duplicates_dropped = 0;

        for (record, offering) in entries {
            let key = code_key(&record.code);
            let idx = match by_code.get(&key) {
                Some(&idx) => {
                    duplicates_dropped += 1;
                    idx
                }
                None => {
                    by_code.insert(key, courses.len());
                    courses.push(record);
                    offerings.push(Vec::new());
                    courses.len() - 1
                }
            };
            offerings[idx].extend(offering);
        }

        if duplicates_dropped > 0 {
            warn!(
                dropped = duplicates_dropped,
                "Catalog contains duplicate course codes; keeping the first row's details for each"
            );
        }

        Self {
            courses,
            offerings,
            by_code,
            duplicates_dropped,
        }
    }

    /// All courses in dataset order.
    pub fn courses(&self) -> &[CourseRecord] {
        &self.courses
    }

    /// Look up a course by code, ignoring case and extra whitespace.
    pub fn get(&self, code: &str) -> Option<&CourseRecord> {
        self.by_code
            .get(&code_key(code))
            .map(|&idx| &self.courses[idx])
    }

    /// Every recorded offering of `code`, in dataset order.
    pub fn offerings(&self, code: &str) -> &[CourseOffering] {
        self.by_code
            .get(&code_key(code))
            .map(|&idx| self.offerings[idx].as_slice())
            .unwrap_or_default()
    }

    /// The course and its offerings, for the course explorer.
    pub fn detail(&self, code: &str) -> Option<CourseDetail> {
        let &idx = self.by_code.get(&code_key(code))?;
        Some(CourseDetail {
            course: self.courses[idx].clone(),
            offerings: self.offerings[idx].clone(),
        })
    }

    /// Sorted, unique department codes.
    pub fn departments(&self) -> Vec<String> {
        self.courses
            .iter()
            .map(|c| c.dept.clone())
            .filter(|d| !d.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of rows dropped because their code was already present.
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

fn row_to_record(raw: CatalogRow, row: u64) -> Result<CourseRecord, CatalogError> {
    let code = normalize_code(&raw.course);
    if code.is_empty() {
        return Err(CatalogError::EmptyCode { row });
    }

    let units = match raw.units.as_deref().map(str::trim) {
        None | Some("") => 0.0,
        Some(value) => match value.parse::<f64>() {
            // `+ 0.0` turns "-0" into 0.0 so it ranks equal to other zeros.
            Ok(units) if units.is_finite() && units >= 0.0 => units + 0.0,
            _ => {
                return Err(CatalogError::InvalidUnits {
                    row,
                    value: value.to_string(),
                })
            }
        },
    };

    let dept = raw
        .dept
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| department_of(&code).to_string());

    Ok(CourseRecord {
        title: raw.coursetitle.unwrap_or_default(),
        prerequisites: raw.prereqs.filter(|p| !p.is_empty()),
        description: raw.description.unwrap_or_default(),
        units,
        dept,
        code,
    })
}

/// The offering described by a row, or `None` when the row carries no
/// offering columns.
fn row_to_offering(raw: &CatalogRow, row: u64) -> Result<Option<CourseOffering>, CatalogError> {
    let count = |column, value: &Option<String>| {
        parse_count(column, value.as_deref(), row).map(Option::unwrap_or_default)
    };
    let grades = GradeCounts {
        a_plus: count("Ap", &raw.a_plus)?,
        a: count("A", &raw.a)?,
        a_minus: count("Am", &raw.a_minus)?,
        b_plus: count("Bp", &raw.b_plus)?,
        b: count("B", &raw.b)?,
        b_minus: count("Bm", &raw.b_minus)?,
        c_plus: count("Cp", &raw.c_plus)?,
        c: count("C", &raw.c)?,
        c_minus: count("Cm", &raw.c_minus)?,
        d: count("D", &raw.d)?,
        f: count("F", &raw.f)?,
    };

    let offering = CourseOffering {
        instructor: non_empty(&raw.instructor),
        quarter: non_empty(&raw.quarter),
        year: parse_count("year", raw.year.as_deref(), row)?,
        avg_gpa: parse_gpa(raw.avg_gpa.as_deref(), row)?,
        n_letter_students: parse_count("nLetterStudents", raw.n_letter_students.as_deref(), row)?,
        grades,
    };

    let empty = offering.instructor.is_none()
        && offering.quarter.is_none()
        && offering.year.is_none()
        && offering.avg_gpa.is_none()
        && offering.n_letter_students.is_none()
        && offering.grades == GradeCounts::default();
    Ok((!empty).then_some(offering))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

/// Whole, non-negative numbers. Accepts `"180"` and `"180.0"`, since the
/// dataset is exported with float columns.
fn parse_count(
    column: &'static str,
    value: Option<&str>,
    row: u64,
) -> Result<Option<u32>, CatalogError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match value.parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&n) => {
            Ok(Some(n as u32))
        }
        _ => Err(CatalogError::InvalidNumber {
            row,
            column,
            value: value.to_string(),
        }),
    }
}

fn parse_gpa(value: Option<&str>, row: u64) -> Result<Option<f64>, CatalogError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match value.parse::<f64>() {
        Ok(gpa) if (0.0..=4.0).contains(&gpa) => Ok(Some(gpa)),
        _ => Err(CatalogError::InvalidNumber {
            row,
            column: "avgGPA",
            value: value.to_string(),
        }),
    }
}

/// Collapse runs of whitespace to a single space.
fn normalize_code(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn code_key(code: &str) -> String {
    normalize_code(code).to_uppercase()
}

/// Everything before the final space-separated token: `"POL S 1"` → `"POL S"`.
fn department_of(code: &str) -> &str {
    code.rsplit_once(' ').map(|(dept, _)| dept).unwrap_or(code)
}
