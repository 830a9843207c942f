//! Command implementations.
//!
//! Every command is synchronous; `main` runs them on a blocking worker.

pub mod fetch;
pub mod keygen;
pub mod latest;
pub mod sign;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use liftoff_core::sources;
use liftoff_core::{PublicKey, SecureSource, Source, SourceError, source::list_files};
use liftoff_schema::MANIFEST_FILE_NAME;

/// Resolve `--public-key` (a key file or an inline key).
pub(crate) fn trusted_key(value: &str) -> Result<PublicKey> {
    PublicKey::from_setting(value).context("Failed to load public key")
}

/// Open `location` behind signature verification.
pub(crate) fn open_secure(
    location: &str,
    asset: Option<&str>,
    token: Option<&str>,
    public_key: &str,
) -> Result<SecureSource<Box<dyn Source>>> {
    let key = trusted_key(public_key)?;
    let mut source = SecureSource::new(sources::from_location(location, asset, token)?, key);
    source
        .open()
        .with_context(|| format!("Failed to open {location}"))?;
    Ok(source)
}

/// Outcome of retrieving a whole release.
#[derive(Debug, Default)]
pub(crate) struct Transfer {
    pub(crate) delivered: Vec<String>,
    pub(crate) rejected: Vec<(String, SourceError)>,
}

impl Transfer {
    pub(crate) fn total(&self) -> usize {
        self.delivered.len() + self.rejected.len()
    }
}

/// Retrieve every file `source` lists (other than the manifest) into `dest`,
/// keeping relative paths. Per-artifact failures are collected, not fatal.
pub(crate) fn retrieve_all<S: Source + ?Sized>(source: &S, dest: &Path) -> Result<Transfer> {
    let files = list_files(source).context("Failed to list release contents")?;
    let mut transfer = Transfer::default();

    for path in files {
        if path == MANIFEST_FILE_NAME {
            continue;
        }
        match source.retrieve(&path, &dest.join(&path)) {
            Ok(()) => transfer.delivered.push(path),
            Err(e) if e.is_verification() || matches!(e, SourceError::NotFound(_)) => {
                transfer.rejected.push((path, e));
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to retrieve {path}")),
        }
    }
    Ok(transfer)
}
