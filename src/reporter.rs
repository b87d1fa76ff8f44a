//! Reshape the extracted tables into one [`StudentReport`] per student.
//!
//! Every source table is "wide": one row per student, one column per skill
//! or week. The reporter re-keys each table by student name, then joins the
//! three by name. The level-by-skill table is the roster: its rows decide
//! who gets a report and in which order. A roster name missing from either
//! of the other two tables stops the batch before any image is written.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::pipeline::extract::{ExtractedTable, ExtractedTables, TableCategory};
use crate::report::{AssignmentSeries, SkillMatrix, StudentReport};
use crate::table::{Cell, Series};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Student name → that student's row as a series.
pub type StudentSeries = IndexMap<String, Series>;

/// Builds and renders reports for a whole class.
#[derive(Debug, Clone, Default)]
pub struct StudentReporter {
    config: ReportConfig,
}

impl StudentReporter {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Assemble a report per roster student, in roster order. No rendering.
    ///
    /// # Errors
    /// * [`ReportError::MissingRequiredTable`] — a category is absent
    /// * [`ReportError::MissingStudentData`] — a roster name is absent from
    ///   another table
    /// * [`ReportError::DuplicateStudent`] / [`ReportError::InvalidTable`] —
    ///   a table cannot be re-keyed
    /// * [`ReportError::InvalidCell`] — a weekly count is not a number
    pub fn create_student_reports(
        &self,
        tables: &ExtractedTables,
    ) -> Result<Vec<StudentReport>, ReportError> {
        // Every category must be present before any of them is re-keyed.
        let levels = required(tables, TableCategory::StudentLevelBySkill)?;
        let units = required(tables, TableCategory::TotalAssignmentsBySkill)?;
        let weeks = required(tables, TableCategory::AssignmentsSubmittedByWeek)?;

        let levels = rekey(TableCategory::StudentLevelBySkill, levels)?;
        let units = rekey(TableCategory::TotalAssignmentsBySkill, units)?;
        let weeks = rekey(TableCategory::AssignmentsSubmittedByWeek, weeks)?;

        let reports = levels
            .iter()
            .map(|(name, level)| self.assemble(name, level, &units, &weeks))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Assembled {} student reports", reports.len());
        Ok(reports)
    }

    /// Assemble every report, then render each to an image in roster order.
    ///
    /// Returns student name → image path, in roster order. The first
    /// rendering failure aborts the batch; images already written stay on
    /// disk.
    pub fn generate_images(
        &self,
        tables: &ExtractedTables,
    ) -> Result<IndexMap<String, PathBuf>, ReportError> {
        let reports = self.create_student_reports(tables)?;
        self.render_images(&reports)
    }

    /// Render already-assembled reports to images.
    pub fn render_images(
        &self,
        reports: &[StudentReport],
    ) -> Result<IndexMap<String, PathBuf>, ReportError> {
        let start = Instant::now();
        let rasterizer = self.config.rasterizer();
        let staging_dir = self.config.staging_dir();
        let format = self.config.image_format;
        let total = reports.len();
        let cb = self.config.progress_callback.as_ref();

        if let Some(cb) = cb {
            cb.on_batch_start(total);
        }

        let mut images = IndexMap::with_capacity(total);
        for (i, report) in reports.iter().enumerate() {
            if let Some(cb) = cb {
                cb.on_student_start(report.name(), i + 1, total);
            }
            match report.render_to_image(rasterizer.as_ref(), &staging_dir, format) {
                Ok(path) => {
                    if let Some(cb) = cb {
                        cb.on_student_complete(report.name(), &path);
                    }
                    images.insert(report.name().to_string(), path);
                }
                Err(e) => {
                    if let Some(cb) = cb {
                        cb.on_student_error(report.name(), &e.to_string());
                    }
                    return Err(e);
                }
            }
        }

        if let Some(cb) = cb {
            cb.on_batch_complete(total);
        }
        info!(
            "Rendered {} report images in {}ms",
            images.len(),
            start.elapsed().as_millis()
        );
        Ok(images)
    }

    fn assemble(
        &self,
        name: &str,
        level: &Series,
        units: &StudentSeries,
        weeks: &StudentSeries,
    ) -> Result<StudentReport, ReportError> {
        let units = lookup(units, name, TableCategory::TotalAssignmentsBySkill)?;
        let weeks = lookup(weeks, name, TableCategory::AssignmentsSubmittedByWeek)?;

        let skills = SkillMatrix::new(level, units)?;
        let assignments = AssignmentSeries::new(name, weeks.clone())?;
        debug!(
            "Assembled {}: {} skills, {} weeks",
            name,
            skills.table().columns().len(),
            assignments.weeks()
        );

        Ok(StudentReport::new(name, skills, assignments)
            .with_skill_display(self.config.skill_display.clone()))
    }
}

fn required(
    tables: &ExtractedTables,
    category: TableCategory,
) -> Result<&ExtractedTable, ReportError> {
    tables
        .get(&category)
        .ok_or_else(|| ReportError::MissingRequiredTable {
            table: category.key().to_string(),
        })
}

fn lookup<'a>(
    series: &'a StudentSeries,
    name: &str,
    category: TableCategory,
) -> Result<&'a Series, ReportError> {
    series.get(name).ok_or_else(|| ReportError::MissingStudentData {
        student: name.to_string(),
        table: category.key().to_string(),
    })
}

/// Re-key a wide table by student name.
///
/// Each row becomes a series over `header[1..]`, keyed by the row's first
/// cell. Pure transposition; nothing is aggregated.
pub fn rekey(
    category: TableCategory,
    table: &ExtractedTable,
) -> Result<StudentSeries, ReportError> {
    let invalid = |detail: String| ReportError::InvalidTable {
        table: category.key().to_string(),
        detail,
    };

    let Some((_, labels)) = table.header.split_first() else {
        return Err(invalid("header is empty".into()));
    };
    for (i, label) in labels.iter().enumerate() {
        if labels[..i].contains(label) {
            return Err(invalid(format!("column '{label}' appears twice")));
        }
    }

    let mut out = StudentSeries::with_capacity(table.rows.len());
    for (row_no, row) in table.rows.iter().enumerate() {
        if row.len() != table.header.len() {
            return Err(invalid(format!(
                "row {} has {} cells but the header has {}",
                row_no + 1,
                row.len(),
                table.header.len()
            )));
        }
        let (name_cell, values) = row
            .split_first()
            .ok_or_else(|| invalid(format!("row {} is empty", row_no + 1)))?;
        let name = match name_cell {
            Cell::Missing => {
                return Err(invalid(format!("row {} has no student name", row_no + 1)))
            }
            present => present.to_string(),
        };
        if out.contains_key(&name) {
            return Err(ReportError::DuplicateStudent {
                student: name,
                table: category.key().to_string(),
            });
        }

        let series = Series::from_pairs(labels.iter().cloned().zip(values.iter().cloned()));
        out.insert(name, series);
    }
    Ok(out)
}
