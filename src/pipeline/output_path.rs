//! Output destination policy.
//!
//! Directory precedence, highest first:
//!
//! 1. the override directory (`M2P_OUTPUT_DIR` or the config),
//! 2. the directory of a caller-supplied path,
//! 3. the user's home directory.
//!
//! Collision suffixing is a best-effort check for a single writer. Two
//! processes racing for the same name can both pick it; the driver's
//! create-new write then fails the loser instead of overwriting.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Md2PdfError;
use crate::request::{OutputRequest, DEFAULT_OUTPUT_FILENAME};

/// Where one conversion writes its PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub directory: PathBuf,
    pub filename: String,
    /// Absolute and free at the moment it was resolved.
    pub resolved_path: PathBuf,
}

/// Resolve the destination, create its directory and pick a free name.
pub fn resolve(
    requested: Option<&OutputRequest>,
    override_dir: Option<&Path>,
    home_dir: Option<&Path>,
) -> Result<OutputTarget, Md2PdfError> {
    let (caller_dir, raw_name) = split_request(requested);

    let directory = match (override_dir, caller_dir, home_dir) {
        (Some(dir), _, _) => dir.to_path_buf(),
        (None, Some(dir), _) => dir,
        (None, None, Some(home)) => home.to_path_buf(),
        (None, None, None) => {
            return Err(Md2PdfError::InvalidConfig(
                "No output directory: no home directory found and none was given".into(),
            ))
        }
    };
    let directory = absolute(&directory)?;

    std::fs::create_dir_all(&directory).map_err(|source| Md2PdfError::Filesystem {
        path: directory.clone(),
        source,
    })?;

    let filename = with_pdf_suffix(&raw_name);
    let resolved_path = ensure_unique(&directory.join(&filename));
    debug!(path = %resolved_path.display(), "Output path resolved");

    Ok(OutputTarget {
        directory,
        filename,
        resolved_path,
    })
}

/// Caller's directory (if the request implies one) and the bare file name.
fn split_request(requested: Option<&OutputRequest>) -> (Option<PathBuf>, String) {
    let Some(req) = requested else {
        return (None, DEFAULT_OUTPUT_FILENAME.to_string());
    };
    let path = Path::new(req.as_str());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string());

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);
    let caller_dir = match req {
        OutputRequest::Path(_) => Some(parent.unwrap_or_else(|| PathBuf::from("."))),
        OutputRequest::Filename(_) => parent,
    };
    (caller_dir, name)
}

fn absolute(dir: &Path) -> Result<PathBuf, Md2PdfError> {
    std::path::absolute(dir).map_err(|source| Md2PdfError::Filesystem {
        path: dir.to_path_buf(),
        source,
    })
}

/// Append `.pdf` unless the name already ends with it, in any case.
pub fn with_pdf_suffix(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}

/// `path` itself if free, otherwise the first free `stem-N.ext` for N = 1, 2, …
pub fn ensure_unique(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|n| dir.join(format!("{stem}-{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_case_insensitive() {
        assert_eq!(with_pdf_suffix("report"), "report.pdf");
        assert_eq!(with_pdf_suffix("report.pdf"), "report.pdf");
        assert_eq!(with_pdf_suffix("REPORT.PDF"), "REPORT.PDF");
        assert_eq!(with_pdf_suffix("notes.md"), "notes.md.pdf");
    }

    #[test]
    fn default_is_home_output_pdf() {
        let home = tempfile::tempdir().unwrap();
        let target = resolve(None, None, Some(home.path())).unwrap();
        assert_eq!(target.resolved_path, home.path().join("output.pdf"));
        assert_eq!(target.filename, "output.pdf");
    }

    #[test]
    fn override_beats_caller_path() {
        let over = tempfile::tempdir().unwrap();
        let caller = tempfile::tempdir().unwrap();
        let req = OutputRequest::Path(caller.path().join("doc.pdf").display().to_string());
        let target = resolve(Some(&req), Some(over.path()), None).unwrap();
        assert_eq!(target.resolved_path, over.path().join("doc.pdf"));
    }

    #[test]
    fn caller_path_beats_home() {
        let home = tempfile::tempdir().unwrap();
        let caller = tempfile::tempdir().unwrap();
        let req = OutputRequest::Path(caller.path().join("doc").display().to_string());
        let target = resolve(Some(&req), None, Some(home.path())).unwrap();
        assert_eq!(target.resolved_path, caller.path().join("doc.pdf"));
    }

    #[test]
    fn bare_filename_lands_in_home() {
        let home = tempfile::tempdir().unwrap();
        let req = OutputRequest::Filename("summary".into());
        let target = resolve(Some(&req), None, Some(home.path())).unwrap();
        assert_eq!(target.resolved_path, home.path().join("summary.pdf"));
    }

    #[test]
    fn missing_directories_are_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let target = resolve(None, Some(&nested), None).unwrap();
        assert!(nested.is_dir());
        assert_eq!(target.directory, nested);
    }

    #[test]
    fn collisions_get_incrementing_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("output.pdf");
        assert_eq!(ensure_unique(&base), base);

        std::fs::write(&base, b"x").unwrap();
        let first = ensure_unique(&base);
        assert_eq!(first, dir.path().join("output-1.pdf"));
        assert_eq!(ensure_unique(&base), first);

        std::fs::write(&first, b"x").unwrap();
        assert_eq!(ensure_unique(&base), dir.path().join("output-2.pdf"));
    }

    #[test]
    fn no_directory_anywhere_is_an_error() {
        assert!(resolve(None, None, None).is_err());
    }

    #[test]
    fn unwritable_directory_is_a_filesystem_error() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = resolve(None, Some(&file.join("sub")), None).unwrap_err();
        assert!(matches!(err, Md2PdfError::Filesystem { .. }));
    }
}
