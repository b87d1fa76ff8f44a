//! Table extraction: source document → one [`ExtractedTable`] per category.
//!
//! A class progress export carries three tables, each under its own title
//! line. [`PdfTableExtractor`] pulls the page text out with pdfium and
//! [`parse_tables_from_text`] cuts it into tables:
//!
//! ```text
//! Student Level by Skill              ← title starts a table
//! Student    grammar    listening     ← first line after it is the header
//! Alice      B1         A2            ← rows until a blank line or next title
//! ```
//!
//! Fields are separated by tabs or by two or more spaces, so single spaces
//! inside a student name survive. Rows shorter than the header are padded
//! with missing cells (weeks that have not happened yet). A title that
//! repeats on a later page with the same header continues the table.
//!
//! [`JsonTableExtractor`] reads the same structure from a JSON file, which
//! is handy for re-running a batch without the PDF.

use crate::error::ReportError;
use crate::pipeline::input;
use crate::table::Cell;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The three tables every progress export must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableCategory {
    /// Columns are skills, cells are levels. Its rows define the roster.
    StudentLevelBySkill,
    /// Columns are skills, cells are completed-assignment counts.
    TotalAssignmentsBySkill,
    /// Columns are week numbers, cells are submission counts.
    AssignmentsSubmittedByWeek,
}

impl TableCategory {
    pub const ALL: [TableCategory; 3] = [
        TableCategory::StudentLevelBySkill,
        TableCategory::TotalAssignmentsBySkill,
        TableCategory::AssignmentsSubmittedByWeek,
    ];

    /// Stable key used in JSON files and error messages.
    pub fn key(self) -> &'static str {
        match self {
            TableCategory::StudentLevelBySkill => "student_level_by_skill",
            TableCategory::TotalAssignmentsBySkill => "total_assignments_by_skill",
            TableCategory::AssignmentsSubmittedByWeek => "assignments_submitted_by_week",
        }
    }

    /// Title line that introduces the table in the source document.
    pub fn title(self) -> &'static str {
        match self {
            TableCategory::StudentLevelBySkill => "Student Level by Skill",
            TableCategory::TotalAssignmentsBySkill => "Total Assignments by Skill",
            TableCategory::AssignmentsSubmittedByWeek => "Assignments Submitted by Week",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Match a title line, ignoring case, surrounding space and a trailing colon.
    pub fn from_title(line: &str) -> Option<Self> {
        let line = line.trim().trim_end_matches(':').trim_end();
        Self::ALL
            .into_iter()
            .find(|c| c.title().eq_ignore_ascii_case(line))
    }
}

impl fmt::Display for TableCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One table as extracted: `header[0]` labels the name column, every row's
/// first cell is the student name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Extracted tables by category.
pub type ExtractedTables = HashMap<TableCategory, ExtractedTable>;

/// Produces the category tables for a source document.
pub trait TableExtractor: Send + Sync {
    fn extract(&self, source: &Path) -> Result<ExtractedTables, ReportError>;
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Extracts tables from the text layer of a PDF via pdfium.
///
/// Blocking; call it from `spawn_blocking` inside async code.
#[derive(Debug, Clone, Default)]
pub struct PdfTableExtractor {
    pub password: Option<String>,
    /// libpdfium file, or the directory containing it.
    pub library_path: Option<PathBuf>,
}

impl TableExtractor for PdfTableExtractor {
    fn extract(&self, source: &Path) -> Result<ExtractedTables, ReportError> {
        let path = input::resolve_source(source)?;
        let text = self.read_text(&path)?;
        let tables = parse_tables_from_text(&text)?;
        info!(
            "Extracted {} tables from {}",
            tables.len(),
            path.display()
        );
        Ok(tables)
    }
}

impl PdfTableExtractor {
    /// Concatenated text of every page, pages separated by a newline.
    pub fn read_text(&self, pdf_path: &Path) -> Result<String, ReportError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let password = self.password.as_deref();

        let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    ReportError::WrongPassword {
                        path: pdf_path.to_path_buf(),
                    }
                } else {
                    ReportError::PasswordRequired {
                        path: pdf_path.to_path_buf(),
                    }
                }
            } else {
                ReportError::CorruptPdf {
                    path: pdf_path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let mut text = String::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let page_text = page.text().map_err(|e| ReportError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;
            text.push_str(&page_text.all());
            text.push('\n');
        }
        debug!("Read {} chars of text from {}", text.len(), pdf_path.display());
        Ok(text)
    }
}

/// Bind libpdfium from, in order: `location`, `PDFIUM_LIB_PATH`, the working
/// directory, the system library path.
fn bind_pdfium(location: Option<&Path>) -> Result<Pdfium, ReportError> {
    let explicit = location
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(loc) => {
            let file = if loc.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&loc)
            } else {
                loc
            };
            debug!("Binding pdfium from {}", file.display());
            Pdfium::bind_to_library(&file)
        }
        None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ReportError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

// ── Text parsing ─────────────────────────────────────────────────────────

static RE_FIELD_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+|\s{2,}").unwrap());

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    RE_FIELD_SEP.split(line.trim()).map(str::trim)
}

/// Interpret one extracted field.
///
/// Blank, `-`, `–`, `—`, `n/a`, `na` and `nan` are missing; finite numbers
/// are numeric; anything else is text.
pub fn parse_cell(field: &str) -> Cell {
    let field = field.trim();
    if field.is_empty()
        || matches!(field, "-" | "–" | "—")
        || field.eq_ignore_ascii_case("n/a")
        || field.eq_ignore_ascii_case("na")
    {
        return Cell::Missing;
    }
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::number(v),
        Ok(v) if v.is_nan() => Cell::Missing,
        _ => Cell::text(field),
    }
}

/// Cut document text into category tables. See the module docs for the layout.
pub fn parse_tables_from_text(text: &str) -> Result<ExtractedTables, ReportError> {
    let mut tables = ExtractedTables::new();
    let mut current: Option<(TableCategory, ExtractedTable)> = None;

    for raw in text.lines() {
        let line = raw.trim();

        if let Some(category) = TableCategory::from_title(line) {
            finish_table(&mut tables, current.take())?;
            current = Some((category, ExtractedTable::default()));
            continue;
        }

        let Some((category, table)) = current.as_mut() else {
            continue;
        };

        if line.is_empty() {
            if !table.rows.is_empty() {
                finish_table(&mut tables, current.take())?;
            }
            continue;
        }

        if table.header.is_empty() {
            table.header = split_fields(line).map(str::to_string).collect();
            continue;
        }

        let mut cells: Vec<Cell> = split_fields(line).map(parse_cell).collect();
        if cells.len() > table.header.len() {
            return Err(ReportError::InvalidTable {
                table: category.key().to_string(),
                detail: format!(
                    "row '{}' has {} fields but the header has {}",
                    line,
                    cells.len(),
                    table.header.len()
                ),
            });
        }
        cells.resize(table.header.len(), Cell::Missing);
        table.rows.push(cells);
    }
    finish_table(&mut tables, current.take())?;

    Ok(tables)
}

fn finish_table(
    tables: &mut ExtractedTables,
    done: Option<(TableCategory, ExtractedTable)>,
) -> Result<(), ReportError> {
    let Some((category, table)) = done else {
        return Ok(());
    };
    if table.header.is_empty() {
        warn!("Table '{}' has a title but no content; skipping", category);
        return Ok(());
    }

    match tables.get_mut(&category) {
        None => {
            debug!("Parsed table '{}': {} rows", category, table.rows.len());
            tables.insert(category, table);
        }
        Some(existing) if existing.header == table.header => {
            debug!("Continuing table '{}' with {} rows", category, table.rows.len());
            existing.rows.extend(table.rows);
        }
        Some(_) => {
            return Err(ReportError::InvalidTable {
                table: category.key().to_string(),
                detail: "appears twice with different headers".into(),
            });
        }
    }
    Ok(())
}

// ── JSON ─────────────────────────────────────────────────────────────────

/// Reads tables from a JSON object keyed by [`TableCategory::key`].
///
/// ```json
/// { "student_level_by_skill": { "header": ["name", "grammar"], "rows": [["Alice", "B1"]] } }
/// ```
///
/// Keys that are not a known category are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTableExtractor;

impl TableExtractor for JsonTableExtractor {
    fn extract(&self, source: &Path) -> Result<ExtractedTables, ReportError> {
        let raw = std::fs::read_to_string(source).map_err(|e| ReportError::TablesReadFailed {
            path: source.to_path_buf(),
            detail: e.to_string(),
        })?;
        tables_from_json(&raw).map_err(|e| match e {
            ReportError::TablesReadFailed { detail, .. } => ReportError::TablesReadFailed {
                path: source.to_path_buf(),
                detail,
            },
            other => other,
        })
    }
}

/// Decode tables from JSON text.
pub fn tables_from_json(raw: &str) -> Result<ExtractedTables, ReportError> {
    let by_key: IndexMap<String, ExtractedTable> =
        serde_json::from_str(raw).map_err(|e| ReportError::TablesReadFailed {
            path: PathBuf::new(),
            detail: e.to_string(),
        })?;

    let mut tables = ExtractedTables::new();
    for (key, table) in by_key {
        match TableCategory::from_key(&key) {
            Some(category) => {
                tables.insert(category, table);
            }
            None => debug!("Ignoring table '{}'", key),
        }
    }
    Ok(tables)
}

/// Encode tables as pretty JSON, keys in category order.
pub fn tables_to_json(tables: &ExtractedTables) -> Result<String, ReportError> {
    let ordered: BTreeMap<TableCategory, &ExtractedTable> =
        tables.iter().map(|(k, v)| (*k, v)).collect();
    let by_key: IndexMap<&str, &ExtractedTable> =
        ordered.into_iter().map(|(k, v)| (k.key(), v)).collect();
    serde_json::to_string_pretty(&by_key)
        .map_err(|e| ReportError::Internal(format!("tables JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Class progress report — Term 2

Student Level by Skill
Student        grammar    vocabulary    listening
Alice Smith    B1         A2            B2
Bob Jones      A2         A2            -

Total Assignments by Skill
Student\tgrammar\tvocabulary\tlistening
Alice Smith\t4\t7\t2
Bob Jones\t1\t3\t0

Assignments Submitted by Week:
Student        1    2    3    4
Alice Smith    3    n/a  5
Bob Jones      1    2    2    4
";

    #[test]
    fn categories_round_trip_key_and_title() {
        for c in TableCategory::ALL {
            assert_eq!(TableCategory::from_key(c.key()), Some(c));
            assert_eq!(TableCategory::from_title(&c.title().to_uppercase()), Some(c));
        }
        assert_eq!(TableCategory::from_title("Student Level"), None);
    }

    #[test]
    fn parse_cell_kinds() {
        assert_eq!(parse_cell("3"), Cell::number(3.0));
        assert_eq!(parse_cell(" 2.5 "), Cell::number(2.5));
        assert_eq!(parse_cell("B1"), Cell::text("B1"));
        for missing in ["", "-", "—", "N/A", "na", "NaN"] {
            assert_eq!(parse_cell(missing), Cell::Missing, "{missing:?}");
        }
    }

    #[test]
    fn parses_all_three_tables() {
        let tables = parse_tables_from_text(SAMPLE).unwrap();
        assert_eq!(tables.len(), 3);

        let levels = &tables[&TableCategory::StudentLevelBySkill];
        assert_eq!(levels.header, ["Student", "grammar", "vocabulary", "listening"]);
        assert_eq!(levels.rows.len(), 2);
        assert_eq!(levels.rows[0][0], Cell::text("Alice Smith"));
        assert_eq!(levels.rows[1][3], Cell::Missing);

        let counts = &tables[&TableCategory::TotalAssignmentsBySkill];
        assert_eq!(counts.rows[1], vec![Cell::text("Bob Jones"), Cell::number(1.0), Cell::number(3.0), Cell::number(0.0)]);
    }

    #[test]
    fn short_rows_are_padded_with_missing() {
        let tables = parse_tables_from_text(SAMPLE).unwrap();
        let weeks = &tables[&TableCategory::AssignmentsSubmittedByWeek];
        assert_eq!(
            weeks.rows[0],
            vec![Cell::text("Alice Smith"), Cell::number(3.0), Cell::Missing, Cell::number(5.0), Cell::Missing]
        );
    }

    #[test]
    fn long_rows_are_rejected() {
        let text = "Student Level by Skill\nStudent  grammar\nAlice  B1  B2\n";
        let err = parse_tables_from_text(text).unwrap_err();
        assert!(matches!(err, ReportError::InvalidTable { table, .. } if table == "student_level_by_skill"));
    }

    #[test]
    fn repeated_title_continues_table() {
        // Page break (form feed) between the two halves.
        let text = "Student Level by Skill\nStudent  grammar\nAlice  B1\n\x0c\n\
                    Student Level by Skill\nStudent  grammar\nBob  A2\n";
        let tables = parse_tables_from_text(text).unwrap();
        assert_eq!(tables[&TableCategory::StudentLevelBySkill].rows.len(), 2);
    }

    #[test]
    fn json_round_trip_ignores_unknown_keys() {
        let tables = parse_tables_from_text(SAMPLE).unwrap();
        let json = tables_to_json(&tables).unwrap();
        assert!(json.find("student_level_by_skill") < json.find("assignments_submitted_by_week"));

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["class_notes"] = serde_json::json!({ "header": ["x"], "rows": [] });
        let back = tables_from_json(&value.to_string()).unwrap();
        assert_eq!(back, tables);
    }

    #[test]
    fn json_extractor_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, "not json").unwrap();
        let err = JsonTableExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, ReportError::TablesReadFailed { path: p, .. } if p == path));
    }
}
