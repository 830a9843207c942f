use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use liftoff_schema::VERSION_FILE_NAME;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::SourceError;
use crate::source::{Entry, Source, WalkResult, is_contained};

/// Serves artifacts from the entries of a zip archive.
///
/// The archive handle is shared, so overlapping `retrieve` calls serialize
/// on an internal lock rather than interleaving reads.
pub struct ZipSource {
    path: PathBuf,
    archive: Mutex<Option<ZipArchive<File>>>,
}

impl std::fmt::Debug for ZipSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ZipSource {
    /// Create a source over the archive at `path`. Nothing is read until `open`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive: Mutex::new(None),
        }
    }

    /// Location of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_archive<T>(
        &self,
        f: impl FnOnce(&mut ZipArchive<File>) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let mut guard = self.archive.lock().unwrap_or_else(PoisonError::into_inner);
        let archive = guard
            .as_mut()
            .ok_or_else(|| SourceError::Usage("zip source is not open".to_string()))?;
        f(archive)
    }
}

fn entry_not_found(err: ZipError, name: &str) -> SourceError {
    match err {
        ZipError::FileNotFound => SourceError::NotFound(name.to_string()),
        other => SourceError::Archive(other),
    }
}

impl Source for ZipSource {
    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SourceError::NotFound(self.path.display().to_string())
            } else {
                SourceError::Io(e)
            }
        })?;
        let archive = ZipArchive::new(file)?;
        tracing::debug!(
            "Opened zip source {} ({} entries)",
            self.path.display(),
            archive.len()
        );
        *self.archive.get_mut().unwrap_or_else(PoisonError::into_inner) = Some(archive);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        *self.archive.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn latest_version(&self) -> Result<String, SourceError> {
        self.with_archive(|archive| {
            let mut entry = archive
                .by_name(VERSION_FILE_NAME)
                .map_err(|e| entry_not_found(e, VERSION_FILE_NAME))?;
            let mut raw = String::new();
            entry.read_to_string(&mut raw)?;
            let version = raw.trim();
            if version.is_empty() {
                return Err(SourceError::NotFound(format!("{VERSION_FILE_NAME} is empty")));
            }
            Ok(version.to_string())
        })
    }

    fn walk(
        &self,
        visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        // Snapshot the listing first so the visitor can call `retrieve`
        // without contending for the archive lock.
        let items: Vec<WalkResult> = self.with_archive(|archive| {
            let mut items = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let item = match archive.by_index(i) {
                    Ok(file) => {
                        let name = file.name().trim_end_matches('/').to_string();
                        if !is_contained(&name) {
                            tracing::debug!("Skipping unsafe archive entry {name:?}");
                            continue;
                        }
                        if file.is_dir() {
                            Ok(Entry::dir(name))
                        } else {
                            Ok(Entry::file(name, Some(file.size())))
                        }
                    }
                    Err(e) => Err(SourceError::Archive(e)),
                };
                items.push(item);
            }
            Ok(items)
        })?;

        for item in items {
            visitor(item)?;
        }
        Ok(())
    }

    fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError> {
        self.with_archive(|archive| {
            let mut entry = archive.by_name(src).map_err(|e| entry_not_found(e, src))?;
            if entry.is_dir() {
                return Err(SourceError::NotFound(src.to_string()));
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(dest)?;
            io::copy(&mut entry, &mut out)?;
            Ok(())
        })
    }
}
