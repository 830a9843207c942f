//! Signature manifest parsing.
//!
//! A manifest (`signatures.json`) is a flat JSON object mapping each
//! artifact's relative path to its detached signature:
//!
//! ```json
//! { "bin/tool": "q5N0...==", "README.md": "Zm9v...==" }
//! ```
//!
//! Paths are matched byte-for-byte. No separator normalization happens on
//! lookup, so consumers must request artifacts using the same `/`-separated
//! form the release was signed with.

use crate::signature::SignatureValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing a manifest document.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The document is not JSON shaped as a path -> signature object.
    #[error("Invalid manifest document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The manifest file could not be read or written.
    #[error("Manifest IO error at {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// The trusted mapping from relative artifact path to detached signature.
///
/// Immutable once loaded for a session; the builder-style [`Manifest::insert`]
/// exists for the offline signing step that produces the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, SignatureValue>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a manifest from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] if the bytes are not a JSON object
    /// whose values are all strings.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = std::fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    /// Render the manifest as pretty-printed JSON with keys in sorted order.
    ///
    /// # Errors
    ///
    /// Serialization of a string map cannot fail in practice; the error is
    /// surfaced for completeness.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Atomically persist the manifest to `path`.
    ///
    /// The document is first written next to the target and then renamed so
    /// that readers never observe a partially written manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or the rename fails.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = self.to_json_pretty()?;
        let io_err = |source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        };

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).map_err(io_err)?;
        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_err(e));
        }
        Ok(())
    }

    /// Exact-match lookup of a relative artifact path.
    pub fn lookup(&self, path: &str) -> Option<&SignatureValue> {
        self.entries.get(path)
    }

    /// Record (or replace) the signature for `path`.
    pub fn insert(&mut self, path: impl Into<String>, signature: SignatureValue) {
        self.entries.insert(path.into(), signature);
    }

    /// Iterate over signed paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of signed artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists no artifacts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
