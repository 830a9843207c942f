use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use liftoff_schema::VERSION_FILE_NAME;
use walkdir::WalkDir;

use crate::error::SourceError;
use crate::source::{Entry, Source, WalkResult, is_contained, to_slash_path};

/// Serves artifacts from a directory on disk.
///
/// Overlapping `retrieve` calls are safe as long as they target distinct
/// destinations; the backend holds no session state.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    /// Create a source rooted at `root`. Nothing is touched until `open`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory artifacts are served from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, src: &str) -> Result<PathBuf, SourceError> {
        // Sanitize path to prevent escaping the root
        if !is_contained(src) {
            return Err(SourceError::NotFound(src.to_string()));
        }
        let path = self.root.join(src);
        if !path.is_file() {
            return Err(SourceError::NotFound(src.to_string()));
        }
        Ok(path)
    }
}

fn not_found_or_io(err: io::Error, what: &str) -> SourceError {
    if err.kind() == io::ErrorKind::NotFound {
        SourceError::NotFound(what.to_string())
    } else {
        SourceError::Io(err)
    }
}

impl Source for LocalSource {
    fn open(&mut self) -> Result<(), SourceError> {
        let meta = fs::metadata(&self.root)
            .map_err(|e| not_found_or_io(e, &self.root.display().to_string()))?;
        if !meta.is_dir() {
            return Err(SourceError::NotFound(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        tracing::debug!("Opened local source at {}", self.root.display());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn latest_version(&self) -> Result<String, SourceError> {
        let raw = fs::read_to_string(self.root.join(VERSION_FILE_NAME))
            .map_err(|e| not_found_or_io(e, VERSION_FILE_NAME))?;
        let version = raw.trim();
        if version.is_empty() {
            return Err(SourceError::NotFound(format!("{VERSION_FILE_NAME} is empty")));
        }
        Ok(version.to_string())
    }

    fn walk(
        &self,
        visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let item = entry.map_err(SourceError::from).map(|e| {
                let relative = to_slash_path(e.path().strip_prefix(&self.root).unwrap_or(e.path()));
                if e.file_type().is_dir() {
                    Entry::dir(relative)
                } else {
                    Entry::file(relative, e.metadata().ok().map(|m| m.len()))
                }
            });
            visitor(item)?;
        }
        Ok(())
    }

    fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError> {
        let path = self.resolve(src)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        // Copying a file onto itself truncates it first
        if matches!((path.canonicalize(), dest.canonicalize()), (Ok(from), Ok(to)) if from == to) {
            tracing::debug!("{src} is already at {}", dest.display());
            return Ok(());
        }
        fs::copy(&path, dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::list_files;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("subfolder")).unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        fs::write(dir.path().join("subfolder/testfile.txt"), b"nested").unwrap();
        fs::write(dir.path().join(VERSION_FILE_NAME), b"1.4.2\n").unwrap();
        dir
    }

    #[test]
    fn walk_reports_relative_slash_paths() {
        let dir = fixture();
        let mut source = LocalSource::new(dir.path());
        source.open().unwrap();

        let mut seen = Vec::new();
        source
            .walk(&mut |entry| {
                let entry = entry?;
                seen.push((entry.path, entry.is_dir));
                Ok(())
            })
            .unwrap();

        assert!(seen.contains(&("subfolder".to_string(), true)));
        assert!(seen.contains(&("subfolder/testfile.txt".to_string(), false)));
        assert!(seen.contains(&("a.txt".to_string(), false)));
        assert!(!seen.iter().any(|(p, _)| p.is_empty()));
    }

    #[test]
    fn visitor_error_stops_walk() {
        let dir = fixture();
        let source = LocalSource::new(dir.path());

        let mut visits = 0;
        let err = source
            .walk(&mut |_| {
                visits += 1;
                Err(SourceError::Aborted("enough".into()))
            })
            .unwrap_err();

        assert_eq!(visits, 1);
        assert!(matches!(err, SourceError::Aborted(ref m) if m == "enough"));
    }

    #[test]
    fn retrieve_copies_and_overwrites() {
        let dir = fixture();
        let out = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path());

        let dest = out.path().join("deep/copy.txt");
        source.retrieve("subfolder/testfile.txt", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"nested");

        source.retrieve("a.txt", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"alpha");
    }

    #[test]
    fn retrieve_onto_the_source_file_leaves_it_intact() {
        let dir = fixture();
        let source = LocalSource::new(dir.path());

        source.retrieve("a.txt", &dir.path().join("a.txt")).unwrap();
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"alpha");

        // Same file reached through a different spelling
        let dotted = dir.path().join("subfolder/../a.txt");
        source.retrieve("a.txt", &dotted).unwrap();
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"alpha");
    }

    #[test]
    fn retrieve_missing_or_escaping_path_is_not_found() {
        let dir = fixture();
        let out = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path().join("subfolder"));
        let dest = out.path().join("x");

        assert!(matches!(
            source.retrieve("nope.txt", &dest),
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(
            source.retrieve("../a.txt", &dest),
            Err(SourceError::NotFound(_))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn latest_version_reads_version_file() {
        let dir = fixture();
        let source = LocalSource::new(dir.path());
        assert_eq!(source.latest_version().unwrap(), "1.4.2");

        let bare = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalSource::new(bare.path()).latest_version(),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn open_rejects_missing_root_and_files() {
        let dir = fixture();
        assert!(LocalSource::new(dir.path().join("missing")).open().is_err());
        assert!(LocalSource::new(dir.path().join("a.txt")).open().is_err());
    }

    #[test]
    fn list_files_skips_directories() {
        let dir = fixture();
        let mut files = list_files(&LocalSource::new(dir.path())).unwrap();
        files.sort();
        assert_eq!(files, vec!["VERSION", "a.txt", "subfolder/testfile.txt"]);
    }
}
