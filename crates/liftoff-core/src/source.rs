//! The capability contract every update source implements.
//!
//! A source is a session-oriented view over a tree of artifacts addressed
//! by `/`-separated relative paths. Sources know nothing about signatures;
//! authenticity is layered on by [`SecureSource`](crate::SecureSource).

use std::path::{Component, Path};

use crate::error::SourceError;

/// One entry yielded while walking a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes when known (files only).
    pub size: Option<u64>,
}

impl Entry {
    /// A file entry.
    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size,
        }
    }

    /// A directory entry.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: None,
        }
    }
}

/// What a walk visitor receives: an entry, or the error hit while reaching it.
pub type WalkResult = Result<Entry, SourceError>;

/// A backend that can supply update artifacts.
///
/// Call [`open`](Source::open) before anything else, and
/// [`close`](Source::close) when done. `close` must be safe to call even if
/// `open` failed part way, and calling it twice is harmless.
///
/// Whether overlapping `retrieve` calls on one open source are safe is up to
/// each implementation and is documented on it.
pub trait Source: Send + Sync {
    /// Establish the backend session (directory handle, archive, network).
    fn open(&mut self) -> Result<(), SourceError>;

    /// Release session resources. Best effort and idempotent.
    fn close(&mut self) -> Result<(), SourceError>;

    /// Opaque identifier of the newest artifact set.
    fn latest_version(&self) -> Result<String, SourceError>;

    /// Visit every entry under the root, in a backend-defined order.
    ///
    /// Traversal errors are handed to the visitor rather than returned
    /// directly, so the visitor decides whether to skip or abort. An error
    /// returned by the visitor stops the walk and is returned unchanged.
    fn walk(
        &self,
        visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
    ) -> Result<(), SourceError>;

    /// Copy the artifact at `src` to `dest`, replacing any existing file.
    fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn open(&mut self) -> Result<(), SourceError> {
        (**self).open()
    }
    fn close(&mut self) -> Result<(), SourceError> {
        (**self).close()
    }
    fn latest_version(&self) -> Result<String, SourceError> {
        (**self).latest_version()
    }
    fn walk(
        &self,
        visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        (**self).walk(visitor)
    }
    fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError> {
        (**self).retrieve(src, dest)
    }
}

/// Collect the relative paths of every file (not directory) in a source.
///
/// Traversal errors abort the collection.
///
/// # Errors
///
/// Returns the first traversal error, or any error from the backend walk.
pub fn list_files<S: Source + ?Sized>(source: &S) -> Result<Vec<String>, SourceError> {
    let mut files = Vec::new();
    source.walk(&mut |entry| {
        let entry = entry?;
        if !entry.is_dir {
            files.push(entry.path);
        }
        Ok(())
    })?;
    Ok(files)
}

/// Render a relative filesystem path in the `/`-separated form sources use.
pub(crate) fn to_slash_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a requested relative path stays inside the source root.
pub(crate) fn is_contained(relative: &str) -> bool {
    !relative.is_empty()
        && Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
