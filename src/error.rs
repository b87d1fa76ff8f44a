//! Error types for the pathways-report library.
//!
//! Every failure is fatal for the batch: a report set with one student
//! silently missing is worse than no report set, so nothing here is
//! downgraded to a warning. The groups below follow the pipeline order:
//!
//! * input — the source PDF or JSON tables could not be read
//! * assembly — the extracted tables do not join up per student
//! * rendering — markup could not be produced or rasterised
//!
//! The CLI wraps these with `anyhow::Context`; library callers can match on
//! the variant to decide what to tell the user.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pathways-report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the executable, install it system-wide,\n\
or set PDFIUM_LIB_PATH to the directory that contains it.\n"
    )]
    PdfiumBindingFailed(String),

    /// A serialized tables file could not be read or decoded.
    #[error("Failed to read tables from '{path}': {detail}")]
    TablesReadFailed { path: PathBuf, detail: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// One of the three required table categories is absent.
    #[error("Required table '{table}' is missing from the extracted tables")]
    MissingRequiredTable { table: String },

    /// A roster student is absent from one of the other required tables.
    #[error("Student '{student}' is on the roster but missing from table '{table}'")]
    MissingStudentData { student: String, table: String },

    /// The same student name appears twice in one table.
    #[error("Student '{student}' appears more than once in table '{table}'")]
    DuplicateStudent { student: String, table: String },

    /// A table is structurally unusable (ragged row, missing name, no header).
    #[error("Table '{table}' is malformed: {detail}")]
    InvalidTable { table: String, detail: String },

    /// A cell that must be numeric holds text.
    #[error("Student '{student}': value '{value}' for '{label}' is not a number")]
    InvalidCell {
        student: String,
        label: String,
        value: String,
    },

    /// A row label was requested that the table does not contain.
    #[error("Table has no row labelled '{label}'")]
    UnknownRow { label: String },

    /// Two rows of one table would share a label.
    #[error("Table already has a row labelled '{label}'")]
    DuplicateRow { label: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The table renderer was asked for a format it does not implement.
    #[error("Unsupported table format '{format}' (only 'html' is implemented)")]
    UnsupportedFormat { format: String },

    /// The markup could not be staged on disk for the rasterizer.
    #[error("Failed to stage markup at '{path}': {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rasterizer failed to turn markup into an image.
    #[error("Rasterisation failed for '{path}': {detail}")]
    RasterizationFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
