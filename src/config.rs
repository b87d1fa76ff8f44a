//! Configuration types for report generation.
//!
//! All behaviour is controlled through [`ReportConfig`], built via its
//! [`ReportConfigBuilder`]. The defaults reproduce the classic setup:
//! `wkhtmltoimage` on `$PATH`, PNG output flattened onto white, staging in
//! the system temp directory, and the standard skill abbreviations.

use crate::error::ReportError;
use crate::pipeline::rasterize::{CommandRasterizer, Rasterizer};
use crate::progress::ProgressCallback;
use crate::report::SkillDisplayNames;
use image::ImageFormat;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for turning extracted tables into report images.
///
/// # Example
/// ```rust
/// use pathways_report::ReportConfig;
///
/// let config = ReportConfig::builder()
///     .rasterizer_program("wkhtmltoimage")
///     .staging_dir(std::env::temp_dir())
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Directory that receives staged markup and the rendered images.
    /// If None, uses [`std::env::temp_dir`].
    pub staging_dir: Option<PathBuf>,

    /// Pre-constructed rasteriser. Takes precedence over `rasterizer_program`.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// External HTML-to-image program. Default: `wkhtmltoimage`.
    pub rasterizer_program: String,

    /// Arguments placed before the input and output paths. Default: `--quiet`.
    pub rasterizer_args: Vec<String>,

    /// Output image format; PNG and JPEG are supported. Default: PNG.
    pub image_format: ImageFormat,

    /// Background the rendered image is flattened onto. `None` keeps the
    /// rasteriser output untouched. Default: white.
    pub flatten_background: Option<[u8; 3]>,

    /// Display names applied to skill columns. Default: grammar → gram,
    /// vocabulary → vocab.
    pub skill_display: SkillDisplayNames,

    /// PDF user password for encrypted documents.
    pub pdf_password: Option<String>,

    /// Directory containing libpdfium. If None, checks `PDFIUM_LIB_PATH`,
    /// then the working directory, then the system library path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional per-student progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let raster = CommandRasterizer::default();
        Self {
            staging_dir: None,
            rasterizer: None,
            rasterizer_program: raster.program,
            rasterizer_args: raster.args,
            image_format: raster.format,
            flatten_background: raster.background,
            skill_display: SkillDisplayNames::default(),
            pdf_password: None,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("staging_dir", &self.staging_dir)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("rasterizer_program", &self.rasterizer_program)
            .field("rasterizer_args", &self.rasterizer_args)
            .field("image_format", &self.image_format)
            .field("flatten_background", &self.flatten_background)
            .field("skill_display", &self.skill_display)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// The directory staged markup and images are written to.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// The rasteriser to use: the injected one, or a [`CommandRasterizer`]
    /// assembled from the program settings.
    pub fn rasterizer(&self) -> Arc<dyn Rasterizer> {
        match self.rasterizer {
            Some(ref r) => Arc::clone(r),
            None => Arc::new(CommandRasterizer {
                program: self.rasterizer_program.clone(),
                args: self.rasterizer_args.clone(),
                background: self.flatten_background,
                format: self.image_format,
            }),
        }
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn rasterizer_program(mut self, program: impl Into<String>) -> Self {
        self.config.rasterizer_program = program.into();
        self
    }

    pub fn rasterizer_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.rasterizer_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn flatten_background(mut self, rgb: Option<[u8; 3]>) -> Self {
        self.config.flatten_background = rgb;
        self
    }

    pub fn skill_display(mut self, names: SkillDisplayNames) -> Self {
        self.config.skill_display = names;
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.rasterizer.is_none() && c.rasterizer_program.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "rasterizer program must not be empty".into(),
            ));
        }
        if !matches!(c.image_format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(ReportError::InvalidConfig(format!(
                "image format must be png or jpeg, got {:?}",
                c.image_format
            )));
        }
        if let Some(ref dir) = c.staging_dir {
            if !dir.is_dir() {
                return Err(ReportError::InvalidConfig(format!(
                    "staging directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}
