//! One student's report: skill matrix, weekly assignments, weekly mean.
//!
//! A [`StudentReport`] is immutable once built. [`StudentReport::render`]
//! produces a standalone HTML document; [`StudentReport::render_to_image`]
//! stages that document and hands it to a [`Rasterizer`].

use crate::error::ReportError;
use crate::pipeline::markup::to_markup;
use crate::pipeline::rasterize::{rasterize_markup, Rasterizer};
use crate::table::{Cell, Series, Table, Value};
use image::ImageFormat;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Row label of the skill-level row.
pub const LEVEL: &str = "level";
/// Row label of the assignment-count row, in both rendered tables.
pub const UNITS: &str = "units";
/// Column-index name of the skill matrix.
pub const SKILL_INDEX: &str = "skill";
/// Index name of the assignment series.
pub const WEEK_INDEX: &str = "week";
/// Label printed ahead of the weekly mean.
pub const MEAN_UNITS_TEXT: &str = "Avg units completed e/ wk of semester";

const REPORT_STYLE: &str = "<style>
        table, th, td {
            border: 1px solid #d3d3d3;
            border-collapse: collapse;
            font-family: Arial, Helvetica, sans-serif;
        }
        th {
            text-align: center;
            padding: 6px;
            background-color: #f9f9f9;
        }
        td {
            text-align: left;
            padding: 5px;
        }
        p {
            font-family: Arial, Helvetica, sans-serif;
            font-size: 90%;
        }
        </style>
";

// ── Skill display names ──────────────────────────────────────────────────

/// Short display names for long skill labels.
///
/// Lookups fall back to the original name, so only the skills that need
/// abbreviating are listed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillDisplayNames {
    names: IndexMap<String, String>,
}

impl Default for SkillDisplayNames {
    fn default() -> Self {
        Self::from_pairs([("grammar", "gram"), ("vocabulary", "vocab")])
    }
}

impl SkillDisplayNames {
    /// No renames at all.
    pub fn empty() -> Self {
        Self {
            names: IndexMap::new(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn insert(&mut self, skill: impl Into<String>, display: impl Into<String>) {
        self.names.insert(skill.into(), display.into());
    }

    /// The display name of `skill`, or `skill` itself when unmapped.
    pub fn display<'a>(&'a self, skill: &'a str) -> &'a str {
        match self.names.get(skill) {
            Some(short) => short.as_str(),
            None => skill,
        }
    }
}

// ── Skill matrix ─────────────────────────────────────────────────────────

/// Two rows (`level`, `units`) by skill.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillMatrix {
    table: Table,
}

impl SkillMatrix {
    /// Stack a student's level and unit-count series. Skills missing from
    /// one of the two series get a missing cell in that row.
    pub fn new(levels: &Series, units: &Series) -> Result<Self, ReportError> {
        let table =
            Table::stack([(LEVEL, levels), (UNITS, units)])?.with_column_name(SKILL_INDEX);
        Ok(Self { table })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The matrix with the `level` row dropped and skills renamed for display.
    pub fn units_for_display(&self, names: &SkillDisplayNames) -> Result<Table, ReportError> {
        Ok(self
            .table
            .drop_row(LEVEL)?
            .rename_columns(|skill| names.display(skill).to_string()))
    }
}

// ── Assignment series ────────────────────────────────────────────────────

/// Weekly submission counts, indexed by week. Present cells are numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSeries {
    series: Series,
}

impl AssignmentSeries {
    /// Validate `series` for `student` and name its index `week`.
    ///
    /// # Errors
    /// [`ReportError::InvalidCell`] when a present cell is not a number.
    pub fn new(student: &str, series: Series) -> Result<Self, ReportError> {
        for (label, cell) in series.iter() {
            if let Cell::Present(Value::Text(text)) = cell {
                return Err(ReportError::InvalidCell {
                    student: student.to_string(),
                    label: label.to_string(),
                    value: text.clone(),
                });
            }
        }
        Ok(Self {
            series: series.with_index_name(WEEK_INDEX),
        })
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Number of weeks, missing ones included.
    pub fn weeks(&self) -> usize {
        self.series.len()
    }

    /// Mean submissions per week with missing weeks counted as zero.
    ///
    /// Every week is in the denominator: `[3, missing, 5]` → `8 / 3`.
    /// An empty series yields `0.0`.
    pub fn mean_units_per_week(&self) -> f64 {
        if self.series.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .series
            .iter()
            .map(|(_, cell)| cell.as_number().unwrap_or(0.0))
            .sum();
        total / self.series.len() as f64
    }

    /// One row labelled `units`, one column per week.
    pub fn to_row_table(&self) -> Result<Table, ReportError> {
        self.series.to_column_table(UNITS).transpose()
    }
}

// ── Student report ───────────────────────────────────────────────────────

/// Everything needed to render one student's report.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentReport {
    name: String,
    skills: SkillMatrix,
    assignments: AssignmentSeries,
    skill_display: SkillDisplayNames,
}

impl StudentReport {
    pub fn new(
        name: impl Into<String>,
        skills: SkillMatrix,
        assignments: AssignmentSeries,
    ) -> Self {
        Self {
            name: name.into(),
            skills,
            assignments,
            skill_display: SkillDisplayNames::default(),
        }
    }

    pub fn with_skill_display(mut self, names: SkillDisplayNames) -> Self {
        self.skill_display = names;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skills(&self) -> &SkillMatrix {
        &self.skills
    }

    pub fn assignments(&self) -> &AssignmentSeries {
        &self.assignments
    }

    /// Full-precision weekly mean; recomputed on every call.
    pub fn mean_units_per_week(&self) -> f64 {
        self.assignments.mean_units_per_week()
    }

    /// Render the report as a standalone HTML document.
    pub fn render(&self) -> Result<String, ReportError> {
        let assignment_table = to_markup(&self.assignments.to_row_table()?, "html")?;
        let mean = self.mean_units_per_week();
        let skill_table = to_markup(
            &self.skills.units_for_display(&self.skill_display)?,
            "html",
        )?;

        let parts = [
            REPORT_STYLE.to_string(),
            "<br/>".to_string(),
            assignment_table,
            "<br/>".to_string(),
            skill_table,
            paragraph(&format!("{MEAN_UNITS_TEXT}: {mean:.1}")),
        ];
        Ok(parts.join("\n"))
    }

    /// Render the report and rasterise it into `staging_dir`.
    ///
    /// The staged `.html` file is deleted before this returns, whether or
    /// not rasterisation succeeded. The returned image path shares the
    /// staged file's stem.
    pub fn render_to_image(
        &self,
        rasterizer: &dyn Rasterizer,
        staging_dir: &Path,
        format: ImageFormat,
    ) -> Result<PathBuf, ReportError> {
        let html = self.render()?;
        let image = rasterize_markup(&html, rasterizer, staging_dir, format)?;
        debug!("Rendered report for {} → {}", self.name, image.display());
        Ok(image)
    }
}

fn paragraph(text: &str) -> String {
    format!("<p>{}</p>", crate::pipeline::markup::escape(text))
}
