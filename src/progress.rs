//! Progress-callback trait for per-student report events.
//!
//! Inject an [`Arc<dyn ReportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to observe a
//! batch as each student's image is produced. The CLI uses this to drive a
//! terminal progress bar; a chat bot could use it to post reports as soon as
//! each one exists.
//!
//! # Example
//!
//! ```rust
//! use pathways_report::{ReportConfig, ReportProgressCallback};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ReportProgressCallback for Printer {
//!     fn on_student_complete(&self, name: &str, image: &Path) {
//!         eprintln!("{name}: {}", image.display());
//!     }
//! }
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ReportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the reporter as it renders each student.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Students are processed sequentially, in roster
/// order.
pub trait ReportProgressCallback: Send + Sync {
    /// Called once, after all reports are assembled and before any image is
    /// rendered.
    fn on_batch_start(&self, total_students: usize) {
        let _ = total_students;
    }

    /// Called just before a student's report is rasterised.
    ///
    /// # Arguments
    /// * `name`  — student name
    /// * `index` — 1-indexed position in the roster
    /// * `total` — roster size
    fn on_student_start(&self, name: &str, index: usize, total: usize) {
        let _ = (name, index, total);
    }

    /// Called when a student's image has been written.
    fn on_student_complete(&self, name: &str, image: &Path) {
        let _ = (name, image);
    }

    /// Called when a student's image failed; the batch stops afterwards.
    fn on_student_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every student has an image.
    fn on_batch_complete(&self, total_students: usize) {
        let _ = total_students;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn ReportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl ReportProgressCallback for Log {
        fn on_batch_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }

        fn on_student_complete(&self, name: &str, _image: &Path) {
            self.0.lock().unwrap().push(format!("done {name}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_student_start("Alice", 1, 2);
        cb.on_student_complete("Alice", Path::new("/tmp/a.png"));
        cb.on_student_error("Bob", "rasteriser missing");
        cb.on_batch_complete(2);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let log = Log::default();
        log.on_batch_start(1);
        log.on_student_start("Alice", 1, 1);
        log.on_student_complete("Alice", Path::new("/tmp/a.png"));
        assert_eq!(*log.0.lock().unwrap(), vec!["start 1", "done Alice"]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(3);
        cb.on_batch_complete(3);
    }
}
