//! CLI binary for pathways-report.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReportConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use pathways_report::generate::extract_tables;
use pathways_report::{
    create_images_with, JsonTableExtractor, PdfTableExtractor, ProgressCallback, ReportConfig,
    ReportProgressCallback, SkillDisplayNames, StudentReporter, TableExtractor,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar across the roster plus one log line
/// per rendered student.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-student wall-clock start times.
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` reports the roster size.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading tables…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} students  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, name: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(name))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ReportProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total} student reports…"))
        ));
    }

    fn on_student_start(&self, name: &str, _index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(name.to_string(), Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_student_complete(&self, name: &str, image: &Path) {
        let secs = self.elapsed_secs(name);
        self.bar.println(format!(
            "  {} {:<24}  {}  {}",
            green("✓"),
            name,
            dim(&image.display().to_string()),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_student_error(&self, name: &str, error: &str) {
        let secs = self.elapsed_secs(name);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<24}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_batch_complete(&self, total: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} reports rendered",
                green("✔"),
                bold(&total.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render one image per student from a progress export
  pathways-report class-progress.pdf

  # Collect the images as <student>.png in a folder
  pathways-report class-progress.pdf --output-dir reports/

  # Skip the PDF and read pre-extracted tables
  pathways-report --tables tables.json --output-dir reports/

  # Inspect the generated HTML without rasterising
  pathways-report --html-only class-progress.pdf

  # JPEG output through a custom rasteriser
  pathways-report --format jpeg --rasterizer /opt/wk/bin/wkhtmltoimage \
      --rasterizer-arg=--width --rasterizer-arg=600 class-progress.pdf

TABLES JSON:
  { "student_level_by_skill":        { "header": [...], "rows": [[...]] },
    "total_assignments_by_skill":    { "header": [...], "rows": [[...]] },
    "assignments_submitted_by_week": { "header": [...], "rows": [[...]] } }

  The first column of every table holds the student name. null cells are
  missing values.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  PATHWAYS_RASTERIZER     Rasteriser program (default: wkhtmltoimage)
  PATHWAYS_STAGING_DIR    Where staged .html files and images are written
  RUST_LOG                Overrides the log filter
"#;

/// Render one progress-report image per student.
#[derive(Parser, Debug)]
#[command(
    name = "pathways-report",
    version,
    about = "Render one progress-report image per student from a class progress export",
    long_about = "Reads the level-by-skill, assignments-by-skill and assignments-by-week \
tables from a class progress PDF (or a JSON dump of them), builds one HTML report per \
student, and rasterises each report with an external HTML-to-image program.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Progress export PDF.
    #[arg(required_unless_present = "tables")]
    input: Option<PathBuf>,

    /// Read pre-extracted tables from this JSON file instead of a PDF.
    #[arg(long, env = "PATHWAYS_TABLES", conflicts_with = "input")]
    tables: Option<PathBuf>,

    /// Directory for staged markup and rendered images.
    #[arg(long, env = "PATHWAYS_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Copy each image to `<DIR>/<student>.<ext>`.
    #[arg(short, long, env = "PATHWAYS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// HTML-to-image program.
    #[arg(long, env = "PATHWAYS_RASTERIZER", default_value = "wkhtmltoimage")]
    rasterizer: String,

    /// Extra argument for the rasteriser, placed before the input/output
    /// paths. Repeatable. Replaces the default `--quiet`.
    #[arg(long = "rasterizer-arg", allow_hyphen_values = true)]
    rasterizer_args: Vec<String>,

    /// Output image format.
    #[arg(long, env = "PATHWAYS_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Keep the rasteriser's output as-is instead of flattening it onto white.
    #[arg(long, env = "PATHWAYS_NO_FLATTEN")]
    no_flatten: bool,

    /// Show a skill under another column name, as `SKILL=SHORT`. Repeatable.
    #[arg(long = "skill-name", value_parser = parse_skill_name)]
    skill_names: Vec<(String, String)>,

    /// Start from full skill names instead of the built-in abbreviations.
    #[arg(long)]
    full_skill_names: bool,

    /// PDF user password for encrypted exports.
    #[arg(long, env = "PATHWAYS_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the student → image mapping as JSON.
    #[arg(long, env = "PATHWAYS_JSON")]
    json: bool,

    /// Print each student's HTML to stdout; nothing is rasterised.
    #[arg(long)]
    html_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PATHWAYS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PATHWAYS_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "PATHWAYS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for image::ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => image::ImageFormat::Png,
            FormatArg::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.html_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let (extractor, source) = source_of(&cli)?;

    // ── HTML-only mode ───────────────────────────────────────────────────
    if cli.html_only {
        let config = build_config(&cli, None)?;
        let tables = extract_tables(extractor, source)
            .await
            .context("Failed to read tables")?;
        let reports = StudentReporter::new(config)
            .create_student_reports(&tables)
            .context("Failed to assemble reports")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for report in &reports {
            let markup = report
                .render()
                .with_context(|| format!("Failed to render report for {}", report.name()))?;
            writeln!(handle, "<!-- {} -->\n{}\n", report.name(), markup)
                .context("Failed to write to stdout")?;
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ReportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let mut images = create_images_with(extractor, &source, &config)
        .await
        .context("Report generation failed")?;

    if let Some(ref dir) = cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        let dests = output_paths(dir, &images)?;
        for ((_, path), dest) in images.iter_mut().zip(dests) {
            std::fs::copy(&*path, &dest).with_context(|| {
                format!("Failed to copy {} to {}", path.display(), dest.display())
            })?;
            *path = dest;
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&images).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            for (student, path) in &images {
                println!("{student}\t{}", path.display());
            }
        }
        eprintln!(
            "{}  {} students  {}ms",
            green("✔"),
            images.len(),
            start.elapsed().as_millis()
        );
    }

    Ok(())
}

/// Pick the extractor and the path it reads.
fn source_of(cli: &Cli) -> Result<(Arc<dyn TableExtractor>, PathBuf)> {
    if let Some(ref tables) = cli.tables {
        return Ok((Arc::new(JsonTableExtractor), tables.clone()));
    }
    let input = cli
        .input
        .clone()
        .context("Either a PDF path or --tables is required")?;
    let extractor = PdfTableExtractor {
        password: cli.password.clone(),
        library_path: cli.pdfium_lib.clone(),
    };
    Ok((Arc::new(extractor), input))
}

/// Map CLI args to `ReportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .rasterizer_program(cli.rasterizer.clone())
        .image_format(cli.format.into());

    if !cli.rasterizer_args.is_empty() {
        builder = builder.rasterizer_args(cli.rasterizer_args.iter().cloned());
    }
    if cli.no_flatten {
        builder = builder.flatten_background(None);
    }
    if cli.full_skill_names || !cli.skill_names.is_empty() {
        builder = builder.skill_display(skill_display(cli));
    }
    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.pdf_password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn skill_display(cli: &Cli) -> SkillDisplayNames {
    let mut names = if cli.full_skill_names {
        SkillDisplayNames::empty()
    } else {
        SkillDisplayNames::default()
    };
    for (skill, short) in &cli.skill_names {
        names.insert(skill.clone(), short.clone());
    }
    names
}

/// Parse `--skill-name SKILL=SHORT`.
fn parse_skill_name(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((skill, short)) if !skill.trim().is_empty() && !short.trim().is_empty() => {
            Ok((skill.trim().to_string(), short.trim().to_string()))
        }
        _ => Err(format!("expected SKILL=SHORT, got '{s}'")),
    }
}

/// Destination for every image, in roster order. Fails before anything is
/// copied if two students would land on the same file.
fn output_paths(dir: &Path, images: &IndexMap<String, PathBuf>) -> Result<Vec<PathBuf>> {
    let mut claimed: HashMap<PathBuf, &str> = HashMap::with_capacity(images.len());
    let mut dests = Vec::with_capacity(images.len());
    for (student, image) in images {
        let dest = output_path(dir, student, image);
        if let Some(other) = claimed.insert(dest.clone(), student) {
            anyhow::bail!(
                "Students '{}' and '{}' both map to {}",
                other,
                student,
                dest.display()
            );
        }
        dests.push(dest);
    }
    Ok(dests)
}

/// `<dir>/<student>.<ext>`, with path separators in the name replaced.
fn output_path(dir: &Path, student: &str, image: &Path) -> PathBuf {
    let stem: String = student
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let ext = image.extension().and_then(|e| e.to_str()).unwrap_or("png");
    dir.join(format!("{stem}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(names: &[&str]) -> IndexMap<String, PathBuf> {
        names
            .iter()
            .map(|n| (n.to_string(), PathBuf::from("/staging/student-report-x.png")))
            .collect()
    }

    #[test]
    fn skill_names_extend_or_replace_the_defaults() {
        let cli = Cli::parse_from(["pathways-report", "x.pdf", "--skill-name", "listening=listen"]);
        let names = skill_display(&cli);
        assert_eq!(names.display("grammar"), "gram");
        assert_eq!(names.display("listening"), "listen");

        let cli = Cli::parse_from([
            "pathways-report",
            "x.pdf",
            "--full-skill-names",
            "--skill-name",
            "reading=read",
        ]);
        let names = skill_display(&cli);
        assert_eq!(names.display("grammar"), "grammar");
        assert_eq!(names.display("reading"), "read");
    }

    #[test]
    fn skill_name_needs_both_halves() {
        assert!(parse_skill_name("grammar").is_err());
        assert!(parse_skill_name("=gram").is_err());
        assert_eq!(
            parse_skill_name(" grammar = g ").unwrap(),
            ("grammar".to_string(), "g".to_string())
        );
    }

    #[test]
    fn output_path_replaces_separators() {
        let dest = output_path(Path::new("out"), "A/B:C", Path::new("/s/r.jpg"));
        assert_eq!(dest, Path::new("out").join("A_B_C.jpg"));
    }

    #[test]
    fn output_paths_follow_roster_order() {
        let dests = output_paths(Path::new("out"), &images(&["Bob", "Alice"])).unwrap();
        assert_eq!(
            dests,
            [Path::new("out/Bob.png"), Path::new("out/Alice.png")]
        );
    }

    #[test]
    fn colliding_names_are_rejected() {
        let err = output_paths(Path::new("out"), &images(&["A/B", "A_B"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'A/B'") && msg.contains("'A_B'"), "got: {msg}");
    }
}
