//! Error taxonomy for the envelope, export, and guard boundaries.
//!
//! Canonicalization and diffing never fail; only key handling, export writes,
//! verification, and guard rejections surface as `TrustError`.
use crate::guard::RejectionCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the trust pipeline.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Signing key material is not a 64-byte Ed25519 secret key.
    #[error("invalid signing key: expected 64 bytes (seed || public key), got {len}")]
    InvalidKey {
        /// Length of the supplied key material.
        len: usize,
    },

    /// The public half of a 64-byte secret key does not match its seed.
    #[error("invalid signing key: public key does not match seed")]
    KeyMismatch,

    /// Verification key material is neither a 32-byte public key nor a
    /// 64-byte secret key.
    #[error("invalid verification key: expected 32 or 64 bytes, got {len}")]
    InvalidPublicKey {
        /// Length of the supplied key material.
        len: usize,
    },

    /// Verification of a signed export failed.
    #[error("tampered export: {reason}")]
    TamperedExport {
        /// What failed during verification.
        reason: String,
    },

    /// Export filename is outside `^[a-z0-9._-]+$` or is a dot name.
    #[error("unsafe export filename {filename:?}")]
    UnsafeFilename {
        /// The rejected filename.
        filename: String,
    },

    /// Resolved export path leaves the export directory.
    #[error("export path escapes export directory: {}", path.display())]
    PathEscape {
        /// The offending relative path.
        path: PathBuf,
    },

    /// The intent guard rejected a candidate edit.
    #[error("edit rejected ({code}): {message}")]
    Rejected {
        /// Machine-readable rejection code.
        code: RejectionCode,
        /// Human-readable reason.
        message: String,
    },

    /// Filesystem failure while writing an export.
    #[error("write {}: {source}", path.display())]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl TrustError {
    pub(crate) fn tampered(reason: impl Into<String>) -> Self {
        TrustError::TamperedExport {
            reason: reason.into(),
        }
    }
}
