//! Input validation: make sure the source path is a readable PDF.
//!
//! pdfium reports a missing file, a permissions problem and a non-PDF all
//! as the same opaque load error. Checking up front lets us say which one
//! it was.

use crate::error::ReportError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable, and starts with `%PDF`.
pub fn resolve_source(path: &Path) -> Result<PathBuf, ReportError> {
    if !path.exists() {
        return Err(ReportError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ReportError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ReportError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ReportError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved source PDF: {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file() {
        let err = resolve_source(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ReportError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"name,grammar\n").unwrap();
        let err = resolve_source(f.path()).unwrap_err();
        assert!(matches!(err, ReportError::NotAPdf { magic, .. } if &magic == b"name"));
    }

    #[test]
    fn pdf_magic_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_source(f.path()).unwrap(), f.path());
    }
}
