//! # pathways-report
//!
//! Turn a class progress export into one report image per student.
//!
//! The export holds three wide tables (skill levels, assignment counts per
//! skill, submissions per week), each with one row per student. This crate
//! re-keys them by student, joins them, and renders every student's slice as
//! a small HTML document, which an external program then rasterises.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate the file is a readable PDF
//!  ├─ 2. Extract   page text via pdfium → three category tables
//!  ├─ 3. Re-key    one series per student per table
//!  ├─ 4. Join      skill matrix + weekly series per roster student
//!  ├─ 5. Markup    styled HTML: weekly table, skill table, weekly mean
//!  └─ 6. Raster    staged .html → wkhtmltoimage → flattened PNG
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pathways_report::{create_images_from_pdf, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReportConfig::default();
//!     let images = create_images_from_pdf("class-progress.pdf", &config).await?;
//!     for (student, image) in &images {
//!         println!("{student} → {}", image.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Tables that already exist in memory skip extraction:
//!
//! ```rust,no_run
//! use pathways_report::{ExtractedTables, ReportConfig, StudentReporter};
//!
//! # fn tables() -> ExtractedTables { ExtractedTables::new() }
//! let reporter = StudentReporter::new(ReportConfig::default());
//! let images = reporter.generate_images(&tables())?;
//! # Ok::<(), pathways_report::ReportError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pathways-report` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod reporter;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReportConfigBuilder};
pub use error::ReportError;
pub use generate::{create_images_from_pdf, create_images_from_pdf_sync, create_images_with};
pub use pipeline::extract::{
    ExtractedTable, ExtractedTables, JsonTableExtractor, PdfTableExtractor, TableCategory,
    TableExtractor,
};
pub use pipeline::markup::{to_markup, TableFormat};
pub use pipeline::rasterize::{CommandRasterizer, Rasterizer};
pub use progress::{NoopProgressCallback, ProgressCallback, ReportProgressCallback};
pub use report::{AssignmentSeries, SkillDisplayNames, SkillMatrix, StudentReport};
pub use reporter::StudentReporter;
pub use table::{Cell, Series, Table, Value};
