//! Error model shared by every source and the secure decorator.

use liftoff_schema::ManifestError;
use thiserror::Error;

/// Why an artifact was rejected by signature verification.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The manifest has no entry for the requested path.
    #[error("no manifest entry")]
    MissingEntry,
    /// The manifest entry is not a well-formed signature.
    #[error("malformed signature")]
    MalformedSignature,
    /// The content does not match the recorded signature.
    #[error("signature mismatch")]
    Mismatch,
}

/// Errors produced by [`Source`](crate::Source) implementations.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Filesystem failure in a backend or while reading back retrieved content.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested relative path does not exist in the source.
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Directory traversal failed.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The zip archive is unreadable or corrupt.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote backend answered, but not with something usable.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A walk visitor asked to stop.
    #[error("Walk aborted: {0}")]
    Aborted(String),

    /// The signature manifest could not be parsed.
    #[error("Failed to load signature manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// The retrieved artifact is not authenticated by the manifest.
    #[error("Signature verification failed for {path}: {reason}")]
    Verification {
        /// Relative path that was requested.
        path: String,
        /// What went wrong.
        reason: VerificationFailure,
    },

    /// An operation was called in a state that does not allow it.
    #[error("Invalid operation: {0}")]
    Usage(String),
}

impl SourceError {
    /// Create a verification failure for `path`.
    pub fn verification(path: impl Into<String>, reason: VerificationFailure) -> Self {
        Self::Verification {
            path: path.into(),
            reason,
        }
    }

    /// True when an artifact was rejected by signature checks.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification { .. })
    }

    /// True when the error originated in the wrapped backend.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::NotFound(_)
                | Self::Walk(_)
                | Self::Archive(_)
                | Self::Http(_)
                | Self::Remote(_)
                | Self::Aborted(_)
        )
    }
}
