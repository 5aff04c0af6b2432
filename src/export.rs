//! Guarded export writes.
//!
//! Filenames are validated before the filesystem is touched and the write is
//! staged through a temp file in the export directory, so a failed write never
//! leaves a partial export behind.
use crate::canonical::CanonicalEncoder;
use crate::envelope::SignedDiff;
use crate::error::TrustError;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9._-]+$").expect("valid export filename regex"))
}

/// Reject filenames outside `^[a-z0-9._-]+$` and dot-only traversal names.
pub fn validate_export_filename(filename: &str) -> Result<(), TrustError> {
    if !filename_pattern().is_match(filename) || filename == "." || filename.starts_with("..") {
        return Err(TrustError::UnsafeFilename {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

/// Write `data` to `export_dir/filename`, returning the written path.
pub fn safe_write_export(
    export_dir: &Path,
    filename: &str,
    data: &str,
) -> Result<PathBuf, TrustError> {
    validate_export_filename(filename)?;
    let relative = Path::new(filename);
    let escapes = relative.is_absolute()
        || relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(TrustError::PathEscape {
            path: relative.to_path_buf(),
        });
    }

    let dest = export_dir.join(relative);
    let io_err = |source: std::io::Error| TrustError::Io {
        path: dest.clone(),
        source,
    };
    fs::create_dir_all(export_dir).map_err(|source| TrustError::Io {
        path: export_dir.to_path_buf(),
        source,
    })?;
    let mut staged = NamedTempFile::new_in(export_dir).map_err(io_err)?;
    staged.write_all(data.as_bytes()).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    staged.persist(&dest).map_err(|err| io_err(err.error))?;

    tracing::info!(path = %dest.display(), bytes = data.len(), "export written");
    Ok(dest)
}

/// Canonicalize an envelope and write it as an export file.
pub fn write_signed_export(
    export_dir: &Path,
    filename: &str,
    envelope: &SignedDiff,
    encoder: &CanonicalEncoder,
) -> Result<PathBuf, TrustError> {
    safe_write_export(export_dir, filename, &encoder.encode(envelope))
}
