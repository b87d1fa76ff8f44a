//! Markup rasterisation: staged `.html` → image file.
//!
//! ## Staging
//!
//! External HTML renderers (`wkhtmltoimage` and friends) read from a path,
//! not from memory. [`StagedMarkup`] writes the markup into a uniquely named
//! [`tempfile::NamedTempFile`]; the file is deleted when the guard drops, so
//! every exit path (success, rasteriser error, panic) cleans up. The image
//! is written next to it with the same stem and is *not* owned by the guard.
//!
//! ## Flattening
//!
//! Renderers may emit transparent backgrounds, which look broken in chat
//! clients and mail previews. [`flatten_image`] composites the image over a
//! solid background and re-encodes it in the requested format.

use crate::error::ReportError;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Renders a markup file into an image file.
///
/// Implementations must leave an image at `image_path` on `Ok(())`. Any
/// failure is reported as an error; callers handle staging cleanup.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, markup_path: &Path, image_path: &Path) -> Result<(), ReportError>;
}

/// A rasteriser that shells out to an HTML-to-image program.
///
/// Runs `program [args…] <markup_path> <image_path>`, then flattens the
/// result over `background` when one is set.
#[derive(Debug, Clone)]
pub struct CommandRasterizer {
    pub program: String,
    pub args: Vec<String>,
    pub background: Option<[u8; 3]>,
    pub format: ImageFormat,
}

impl Default for CommandRasterizer {
    fn default() -> Self {
        Self {
            program: "wkhtmltoimage".to_string(),
            args: vec!["--quiet".to_string()],
            background: Some([255, 255, 255]),
            format: ImageFormat::Png,
        }
    }
}

impl Rasterizer for CommandRasterizer {
    fn rasterize(&self, markup_path: &Path, image_path: &Path) -> Result<(), ReportError> {
        debug!(
            "Running {} on {} → {}",
            self.program,
            markup_path.display(),
            image_path.display()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(markup_path)
            .arg(image_path)
            .output()
            .map_err(|e| ReportError::RasterizationFailed {
                path: markup_path.to_path_buf(),
                detail: format!("could not run '{}': {e}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReportError::RasterizationFailed {
                path: markup_path.to_path_buf(),
                detail: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        if !image_path.exists() {
            return Err(ReportError::RasterizationFailed {
                path: markup_path.to_path_buf(),
                detail: format!("{} produced no image", self.program),
            });
        }

        if let Some(bg) = self.background {
            flatten_image(image_path, bg, self.format)?;
        }
        Ok(())
    }
}

/// Composite the image at `path` over a solid `background` and rewrite it
/// in `format`.
pub fn flatten_image(
    path: &Path,
    background: [u8; 3],
    format: ImageFormat,
) -> Result<(), ReportError> {
    let fail = |detail: String| ReportError::RasterizationFailed {
        path: path.to_path_buf(),
        detail,
    };

    let rgba = image::open(path)
        .map_err(|e| fail(format!("cannot decode rendered image: {e}")))?
        .to_rgba8();

    let [br, bg, bb] = background.map(u32::from);
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u32::from(a);
        let mix = |fg: u8, back: u32| ((u32::from(fg) * a + back * (255 - a) + 127) / 255) as u8;
        Rgb([mix(r, br), mix(g, bg), mix(b, bb)])
    });

    flat.save_with_format(path, format)
        .map_err(|e| fail(format!("cannot re-encode image: {e}")))?;
    debug!("Flattened {} ({}x{})", path.display(), flat.width(), flat.height());
    Ok(())
}

/// The file extension used for images of `format`.
pub fn image_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("png")
}

// ── Staging ──────────────────────────────────────────────────────────────

/// Markup written to a uniquely named temporary `.html` file.
///
/// Dropping the guard deletes the file.
pub struct StagedMarkup {
    file: NamedTempFile,
}

/// How many staged names to try before giving up on a free image name.
const STAGING_ATTEMPTS: usize = 8;

fn staging_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("student-report-").suffix(".html");
    builder
}

impl StagedMarkup {
    /// Write `markup` to a fresh `student-report-*.html` file in `dir`.
    pub fn write(dir: &Path, markup: &str) -> Result<Self, ReportError> {
        Self::write_with(&staging_builder(), dir, markup)
    }

    /// Like [`StagedMarkup::write`], but only accepts a staged name whose
    /// sibling image path for `format` does not exist yet.
    ///
    /// `tempfile` reserves the `.html` name only, so an image left over from
    /// an earlier run may share the stem.
    pub fn write_for_image(
        dir: &Path,
        markup: &str,
        format: ImageFormat,
    ) -> Result<Self, ReportError> {
        Self::write_for_image_with(&staging_builder(), dir, markup, format)
    }

    fn write_for_image_with(
        builder: &tempfile::Builder<'_, '_>,
        dir: &Path,
        markup: &str,
        format: ImageFormat,
    ) -> Result<Self, ReportError> {
        for _ in 0..STAGING_ATTEMPTS {
            let staged = Self::write_with(builder, dir, markup)?;
            let image = staged.image_path(format);
            if !image.exists() {
                return Ok(staged);
            }
            debug!("{} already exists; restaging", image.display());
        }
        Err(ReportError::StagingFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "no staged name with a free image path",
            ),
        })
    }

    fn write_with(
        builder: &tempfile::Builder<'_, '_>,
        dir: &Path,
        markup: &str,
    ) -> Result<Self, ReportError> {
        let mut file = builder
            .tempfile_in(dir)
            .map_err(|e| ReportError::StagingFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;

        file.write_all(markup.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ReportError::StagingFailed {
                path: file.path().to_path_buf(),
                source: e,
            })?;

        debug!("Staged {} bytes at {}", markup.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Sibling path with the same stem and the image extension.
    pub fn image_path(&self, format: ImageFormat) -> PathBuf {
        self.path().with_extension(image_extension(format))
    }

    /// Delete the staged file now, surfacing any I/O error.
    pub fn close(self) -> Result<(), ReportError> {
        let path = self.file.path().to_path_buf();
        self.file
            .close()
            .map_err(|e| ReportError::StagingFailed { path, source: e })
    }
}

/// Stage `markup`, rasterise it next to the staged file, and clean up.
///
/// The staged markup never outlives this call. If rasterisation fails, a
/// partially written image is removed before the error is returned.
pub fn rasterize_markup(
    markup: &str,
    rasterizer: &dyn Rasterizer,
    staging_dir: &Path,
    format: ImageFormat,
) -> Result<PathBuf, ReportError> {
    let staged = StagedMarkup::write_for_image(staging_dir, markup, format)?;
    let image_path = staged.image_path(format);

    if let Err(e) = rasterizer.rasterize(staged.path(), &image_path) {
        if image_path.exists() {
            if let Err(rm) = std::fs::remove_file(&image_path) {
                warn!("Could not remove partial image {}: {rm}", image_path.display());
            }
        }
        // `staged` drops here and deletes the markup.
        return Err(e);
    }

    // The image is done; a leftover .html is not worth losing it over.
    if let Err(e) = staged.close() {
        warn!("{e}");
    }
    Ok(image_path)
}
