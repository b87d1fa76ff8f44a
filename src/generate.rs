//! Top-level entry points: source document → report image per student.
//!
//! pdfium and the external rasteriser both block, so the async entry point
//! runs extraction and the rendering batch on tokio's blocking pool, one
//! after the other. Students are still rendered strictly in sequence.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::pipeline::extract::{ExtractedTables, PdfTableExtractor, TableExtractor};
use crate::reporter::StudentReporter;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Extract the three tables from a progress PDF and render every student's
/// report to an image.
///
/// # Returns
/// Student name → image path, in roster order.
///
/// # Errors
/// Any extraction, assembly, or rendering error; the batch stops at the
/// first one.
///
/// # Example
/// ```rust,no_run
/// use pathways_report::{create_images_from_pdf, ReportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let images = create_images_from_pdf("class-progress.pdf", &ReportConfig::default()).await?;
/// for (student, image) in &images {
///     println!("{student}: {}", image.display());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn create_images_from_pdf(
    source: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<IndexMap<String, PathBuf>, ReportError> {
    let extractor = PdfTableExtractor {
        password: config.pdf_password.clone(),
        library_path: config.pdfium_library_path.clone(),
    };
    create_images_with(Arc::new(extractor), source, config).await
}

/// Like [`create_images_from_pdf`], with a caller-supplied extractor.
pub async fn create_images_with(
    extractor: Arc<dyn TableExtractor>,
    source: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<IndexMap<String, PathBuf>, ReportError> {
    let total_start = Instant::now();
    let source = source.as_ref().to_path_buf();
    info!("Generating reports from {}", source.display());

    let tables = extract_tables(extractor, source).await?;

    let reporter = StudentReporter::new(config.clone());
    let images = tokio::task::spawn_blocking(move || reporter.generate_images(&tables))
        .await
        .map_err(|e| ReportError::Internal(format!("Render task panicked: {}", e)))??;

    info!(
        "Generated {} report images in {}ms",
        images.len(),
        total_start.elapsed().as_millis()
    );
    Ok(images)
}

/// Synchronous wrapper around [`create_images_from_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn create_images_from_pdf_sync(
    source: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<IndexMap<String, PathBuf>, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(create_images_from_pdf(source, config))
}

/// Run `extractor` on the blocking pool.
pub async fn extract_tables(
    extractor: Arc<dyn TableExtractor>,
    source: PathBuf,
) -> Result<ExtractedTables, ReportError> {
    tokio::task::spawn_blocking(move || extractor.extract(&source))
        .await
        .map_err(|e| ReportError::Internal(format!("Extraction task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_pdf_is_reported_before_binding_pdfium() {
        let err = create_images_from_pdf("/definitely/not/here.pdf", &ReportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::FileNotFound { .. }));
    }

    #[test]
    fn sync_wrapper_propagates_errors() {
        let dir = tempfile::tempdir().unwrap();
        let not_pdf = dir.path().join("tables.pdf");
        std::fs::write(&not_pdf, b"PK\x03\x04").unwrap();
        let err = create_images_from_pdf_sync(&not_pdf, &ReportConfig::default()).unwrap_err();
        assert!(matches!(err, ReportError::NotAPdf { .. }));
    }
}
