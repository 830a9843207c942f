//! Signature-verifying source decorator.
//!
//! [`SecureSource`] wraps any [`Source`] and refuses to hand out an artifact
//! unless its content matches the detached signature recorded for it in the
//! source's `signatures.json`, checked against a caller-supplied public key.
//!
//! Session lifecycle:
//!
//! ```text
//! Unopened --open--> Opening --ok--> Ready --close--> Closed
//!                       |                               |
//!                       +--err--> OpenFailed            +--open--> Opening
//! ```
//!
//! The manifest is fetched through the wrapped source itself and is not
//! signed. Anyone able to rewrite the source can therefore rewrite the
//! manifest too; the decorator only guarantees that every artifact it
//! returns matches the manifest it loaded.

use std::fs;
use std::io;
use std::path::Path;

use liftoff_schema::{MANIFEST_FILE_NAME, Manifest};

use crate::error::{SourceError, VerificationFailure};
use crate::keys::PublicKey;
use crate::source::{Source, WalkResult};

/// Where a [`SecureSource`] is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `open` has not been called.
    Unopened,
    /// `open` is in progress.
    Opening,
    /// The manifest is loaded; retrievals are allowed.
    Ready,
    /// `open` failed; the session is unusable.
    OpenFailed,
    /// The session was closed and may be reopened.
    Closed,
}

#[derive(Debug)]
enum Session {
    Unopened,
    Opening,
    Ready(Manifest),
    OpenFailed,
    Closed,
}

/// A [`Source`] decorator that verifies every retrieved artifact.
///
/// One instance holds one session. `open` takes `&mut self`, so opening
/// cannot race with anything else on the same instance; once `Ready`,
/// `retrieve` only reads the manifest and may be called from several threads
/// if the wrapped source allows overlapping retrievals.
#[derive(Debug)]
pub struct SecureSource<S> {
    inner: S,
    public_key: PublicKey,
    manifest_name: String,
    session: Session,
}

impl<S: Source> SecureSource<S> {
    /// Wrap `inner`, trusting signatures made by the holder of `public_key`.
    pub fn new(inner: S, public_key: PublicKey) -> Self {
        Self {
            inner,
            public_key,
            manifest_name: MANIFEST_FILE_NAME.to_string(),
            session: Session::Unopened,
        }
    }

    /// Read the manifest from `name` instead of `signatures.json`.
    ///
    /// Stacked decorators need distinct names: the inner one must list the
    /// outer one's manifest as an ordinary signed artifact.
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match self.session {
            Session::Unopened => SessionState::Unopened,
            Session::Opening => SessionState::Opening,
            Session::Ready(_) => SessionState::Ready,
            Session::OpenFailed => SessionState::OpenFailed,
            Session::Closed => SessionState::Closed,
        }
    }

    /// The manifest loaded by `open`, while the session is ready.
    pub fn manifest(&self) -> Option<&Manifest> {
        match &self.session {
            Session::Ready(manifest) => Some(manifest),
            _ => None,
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the decorator, returning the wrapped source.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn ready(&self, operation: &str) -> Result<&Manifest, SourceError> {
        self.manifest().ok_or_else(|| {
            SourceError::Usage(format!(
                "{operation} called on a secure source in state {:?}",
                self.state()
            ))
        })
    }

    fn load_manifest(&mut self) -> Result<Manifest, SourceError> {
        self.inner.open()?;

        // Dropped on every return path, removing the download
        let scratch = tempfile::tempdir()?;
        let manifest_path = scratch.path().join("manifest.json");
        self.inner.retrieve(&self.manifest_name, &manifest_path)?;
        Ok(Manifest::load(&manifest_path)?)
    }

    fn reject(&self, src: &str, dest: &Path, reason: VerificationFailure) -> SourceError {
        tracing::warn!("Rejected {src}: {reason}");
        discard(dest);
        SourceError::verification(src, reason)
    }
}

/// Remove a tainted destination. Missing files are fine.
fn discard(dest: &Path) {
    let removed = match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir(dest),
        _ => fs::remove_file(dest),
    };
    match removed {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!("Failed to remove unverified {}: {e}", dest.display()),
    }
}

impl<S: Source> Source for SecureSource<S> {
    fn open(&mut self) -> Result<(), SourceError> {
        match self.session {
            Session::Unopened | Session::Closed => {}
            _ => {
                return Err(SourceError::Usage(format!(
                    "open called on a secure source in state {:?}",
                    self.state()
                )));
            }
        }

        self.session = Session::Opening;
        match self.load_manifest() {
            Ok(manifest) => {
                tracing::debug!("Loaded signature manifest with {} entries", manifest.len());
                self.session = Session::Ready(manifest);
                Ok(())
            }
            Err(e) => {
                self.session = Session::OpenFailed;
                Err(e)
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if !matches!(self.session, Session::OpenFailed) {
            self.session = Session::Closed;
        }
        self.inner.close()
    }

    fn latest_version(&self) -> Result<String, SourceError> {
        self.ready("latest_version")?;
        self.inner.latest_version()
    }

    fn walk(
        &self,
        visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        self.ready("walk")?;
        self.inner.walk(visitor)
    }

    fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError> {
        let manifest = self.ready("retrieve")?;

        self.inner.retrieve(src, dest)?;

        let Some(signature) = manifest.lookup(src) else {
            return Err(self.reject(src, dest, VerificationFailure::MissingEntry));
        };

        let content = match fs::read(dest) {
            Ok(content) => content,
            Err(e) => {
                discard(dest);
                return Err(e.into());
            }
        };

        match self.public_key.verify(&content, signature) {
            Ok(()) => {
                tracing::debug!("Verified {src}");
                Ok(())
            }
            Err(reason) => Err(self.reject(src, dest, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::source::Entry;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source recording how it is driven.
    #[derive(Default)]
    struct MemorySource {
        files: BTreeMap<String, Vec<u8>>,
        fail_open: bool,
        opens: AtomicUsize,
        closes: AtomicUsize,
        retrieved: Mutex<Vec<String>>,
        destinations: Mutex<Vec<(String, PathBuf)>>,
        /// Deliver this path as an empty directory instead of a file.
        directory_for: Option<String>,
    }

    impl MemorySource {
        fn with(files: &[(&str, &[u8])]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| ((*p).to_string(), c.to_vec()))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl Source for MemorySource {
        fn open(&mut self) -> Result<(), SourceError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(SourceError::Remote("backend down".into()));
            }
            Ok(())
        }
        fn close(&mut self) -> Result<(), SourceError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn latest_version(&self) -> Result<String, SourceError> {
            Ok("9.9.9".into())
        }
        fn walk(
            &self,
            visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
        ) -> Result<(), SourceError> {
            for (path, content) in &self.files {
                visitor(Ok(Entry::file(path.clone(), Some(content.len() as u64))))?;
            }
            Ok(())
        }
        fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError> {
            self.retrieved.lock().unwrap().push(src.to_string());
            self.destinations
                .lock()
                .unwrap()
                .push((src.to_string(), dest.to_path_buf()));
            if self.directory_for.as_deref() == Some(src) {
                fs::create_dir_all(dest)?;
                return Ok(());
            }
            let content = self
                .files
                .get(src)
                .ok_or_else(|| SourceError::NotFound(src.to_string()))?;
            fs::write(dest, content)?;
            Ok(())
        }
    }

    fn signed_source(pair: &KeyPair, files: &[(&str, &[u8])]) -> MemorySource {
        let mut manifest = Manifest::new();
        for (path, content) in files {
            manifest.insert(*path, pair.sign(content));
        }
        let json = manifest.to_json_pretty().unwrap();
        let mut source = MemorySource::with(files);
        source
            .files
            .insert(MANIFEST_FILE_NAME.to_string(), json.into_bytes());
        source
    }

    #[test]
    fn lifecycle_states() {
        let pair = KeyPair::generate().unwrap();
        let mut secure = SecureSource::new(signed_source(&pair, &[]), pair.public_key());
        assert_eq!(secure.state(), SessionState::Unopened);

        secure.open().unwrap();
        assert_eq!(secure.state(), SessionState::Ready);
        assert!(matches!(secure.open(), Err(SourceError::Usage(_))));

        secure.close().unwrap();
        assert_eq!(secure.state(), SessionState::Closed);
        secure.close().unwrap();
        assert_eq!(secure.inner().closes.load(Ordering::SeqCst), 2);

        secure.open().unwrap();
        assert_eq!(secure.state(), SessionState::Ready);
    }

    #[test]
    fn operations_require_ready() {
        let pair = KeyPair::generate().unwrap();
        let secure = SecureSource::new(signed_source(&pair, &[]), pair.public_key());
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            secure.retrieve("a.txt", &dir.path().join("a")),
            Err(SourceError::Usage(_))
        ));
        assert!(matches!(secure.latest_version(), Err(SourceError::Usage(_))));
        assert!(matches!(
            secure.walk(&mut |_| Ok(())),
            Err(SourceError::Usage(_))
        ));
        // Nothing reached the backend
        assert!(secure.inner().retrieved.lock().unwrap().is_empty());
    }

    #[test]
    fn backend_open_failure_is_terminal() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(&pair, &[]);
        source.fail_open = true;
        let mut secure = SecureSource::new(source, pair.public_key());

        assert!(matches!(secure.open(), Err(SourceError::Remote(_))));
        assert_eq!(secure.state(), SessionState::OpenFailed);
        assert!(matches!(secure.open(), Err(SourceError::Usage(_))));
        assert_eq!(secure.inner().opens.load(Ordering::SeqCst), 1);

        // Close is still allowed and reaches the backend
        secure.close().unwrap();
        assert_eq!(secure.state(), SessionState::OpenFailed);
        assert_eq!(secure.inner().closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_manifest_fails_open() {
        let pair = KeyPair::generate().unwrap();
        let mut secure = SecureSource::new(
            MemorySource::with(&[("a.txt", b"alpha".as_slice())]),
            pair.public_key(),
        );
        assert!(matches!(secure.open(), Err(SourceError::NotFound(_))));
        assert_eq!(secure.state(), SessionState::OpenFailed);
    }

    #[test]
    fn malformed_manifest_fails_open() {
        let pair = KeyPair::generate().unwrap();
        let source = MemorySource::with(&[(MANIFEST_FILE_NAME, b"[1, 2, 3]".as_slice())]);
        let mut secure = SecureSource::new(source, pair.public_key());
        assert!(matches!(secure.open(), Err(SourceError::Manifest(_))));
        assert!(secure.manifest().is_none());
    }

    /// Directory `open` downloaded the manifest into.
    fn manifest_scratch_dir(secure: &SecureSource<MemorySource>) -> PathBuf {
        let destinations = secure.inner().destinations.lock().unwrap();
        let (_, dest) = destinations
            .iter()
            .find(|(src, _)| src == MANIFEST_FILE_NAME)
            .expect("manifest was never requested");
        dest.parent().unwrap().to_path_buf()
    }

    #[test]
    fn open_removes_manifest_download_on_success() {
        let pair = KeyPair::generate().unwrap();
        let mut secure = SecureSource::new(
            signed_source(&pair, &[("a.txt", b"alpha".as_slice())]),
            pair.public_key(),
        );
        secure.open().unwrap();
        assert!(!manifest_scratch_dir(&secure).exists());
    }

    #[test]
    fn open_removes_manifest_download_when_parsing_fails() {
        let pair = KeyPair::generate().unwrap();
        let source = MemorySource::with(&[(MANIFEST_FILE_NAME, b"{broken".as_slice())]);
        let mut secure = SecureSource::new(source, pair.public_key());
        assert!(matches!(secure.open(), Err(SourceError::Manifest(_))));
        assert!(!manifest_scratch_dir(&secure).exists());
    }

    #[test]
    fn open_removes_manifest_download_when_retrieve_fails() {
        let pair = KeyPair::generate().unwrap();
        let source = MemorySource::with(&[("a.txt", b"alpha".as_slice())]);
        let mut secure = SecureSource::new(source, pair.public_key());
        assert!(matches!(secure.open(), Err(SourceError::NotFound(_))));
        assert!(!manifest_scratch_dir(&secure).exists());
    }

    #[test]
    fn unreadable_delivery_is_discarded() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(&pair, &[("a.txt", b"alpha".as_slice())]);
        source.directory_for = Some("a.txt".into());
        let mut secure = SecureSource::new(source, pair.public_key());
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");
        assert!(matches!(
            secure.retrieve("a.txt", &dest),
            Err(SourceError::Io(_))
        ));
        assert!(!dest.exists());
        assert_eq!(secure.state(), SessionState::Ready);
    }

    #[test]
    fn delegates_version_and_walk() {
        let pair = KeyPair::generate().unwrap();
        let mut secure = SecureSource::new(
            signed_source(&pair, &[("a.txt", b"alpha".as_slice())]),
            pair.public_key(),
        );
        secure.open().unwrap();

        assert_eq!(secure.latest_version().unwrap(), "9.9.9");
        let mut paths = Vec::new();
        secure
            .walk(&mut |entry| {
                paths.push(entry?.path);
                Ok(())
            })
            .unwrap();
        assert_eq!(paths, vec!["a.txt", MANIFEST_FILE_NAME]);
    }

    #[test]
    fn verified_retrieve_keeps_content() {
        let pair = KeyPair::generate().unwrap();
        let mut secure = SecureSource::new(
            signed_source(&pair, &[("a.txt", b"alpha".as_slice())]),
            pair.public_key(),
        );
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");
        secure.retrieve("a.txt", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"alpha");
    }

    #[test]
    fn tampered_content_is_removed() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(&pair, &[("a.txt", b"alpha".as_slice())]);
        source.files.insert("a.txt".into(), b"alphA".to_vec());
        let mut secure = SecureSource::new(source, pair.public_key());
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");
        let err = secure.retrieve("a.txt", &dest).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Verification {
                reason: VerificationFailure::Mismatch,
                ..
            }
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn unlisted_artifact_is_removed() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(&pair, &[("a.txt", b"alpha".as_slice())]);
        source.files.insert("b.txt".into(), b"beta".to_vec());
        let mut secure = SecureSource::new(source, pair.public_key());
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("b.txt");
        let err = secure.retrieve("b.txt", &dest).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Verification {
                reason: VerificationFailure::MissingEntry,
                ..
            }
        ));
        assert!(!dest.exists());
        // The backend was still asked for it
        assert!(secure.inner().retrieved.lock().unwrap().contains(&"b.txt".to_string()));
    }

    #[test]
    fn backend_retrieve_error_passes_through() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(&pair, &[("a.txt", b"alpha".as_slice())]);
        source.files.remove("a.txt");
        let mut secure = SecureSource::new(source, pair.public_key());
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            secure.retrieve("a.txt", &dir.path().join("a.txt")),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn wrong_public_key_rejects_everything() {
        let signer = KeyPair::generate().unwrap();
        let stranger = KeyPair::generate().unwrap();
        let mut secure = SecureSource::new(
            signed_source(&signer, &[("a.txt", b"alpha".as_slice())]),
            stranger.public_key(),
        );
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");
        assert!(secure.retrieve("a.txt", &dest).unwrap_err().is_verification());
        assert!(!dest.exists());
    }

    #[test]
    fn failure_does_not_poison_session() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(
            &pair,
            &[("a.txt", b"alpha".as_slice()), ("b.txt", b"beta".as_slice())],
        );
        source.files.insert("a.txt".into(), b"evil".to_vec());
        let mut secure = SecureSource::new(source, pair.public_key());
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        assert!(secure.retrieve("a.txt", &dir.path().join("a")).is_err());
        secure.retrieve("b.txt", &dir.path().join("b")).unwrap();
        assert_eq!(secure.state(), SessionState::Ready);
    }

    #[test]
    fn retrieve_is_idempotent() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(
            &pair,
            &[("good", b"ok".as_slice()), ("bad", b"orig".as_slice())],
        );
        source.files.insert("bad".into(), b"changed".to_vec());
        let mut secure = SecureSource::new(source, pair.public_key());
        secure.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            assert!(secure.retrieve("good", &dir.path().join("good")).is_ok());
            assert!(secure.retrieve("bad", &dir.path().join("bad")).is_err());
            assert!(!dir.path().join("bad").exists());
        }
    }

    #[test]
    fn custom_manifest_name() {
        let pair = KeyPair::generate().unwrap();
        let mut source = signed_source(&pair, &[("a.txt", b"alpha".as_slice())]);
        let json = source.files.remove(MANIFEST_FILE_NAME).unwrap();
        source.files.insert("release.sigs".into(), json);

        let mut default_name = SecureSource::new(source, pair.public_key());
        assert!(default_name.open().is_err());

        let source = default_name.into_inner();
        let mut secure = SecureSource::new(source, pair.public_key()).with_manifest_name("release.sigs");
        secure.open().unwrap();
        let dir = tempfile::tempdir().unwrap();
        secure.retrieve("a.txt", &dir.path().join("a.txt")).unwrap();
    }

    #[test]
    fn decorator_can_wrap_a_decorator() {
        let release = KeyPair::generate().unwrap();
        let countersign = KeyPair::generate().unwrap();

        // Outer manifest, signed by the countersigning key
        let mut outer_manifest = Manifest::new();
        outer_manifest.insert("a.txt", countersign.sign(b"alpha"));
        let outer_json = outer_manifest.to_json_pretty().unwrap().into_bytes();

        // Inner manifest lists both the artifact and the outer manifest
        let source = signed_source(
            &release,
            &[
                ("a.txt", b"alpha".as_slice()),
                ("outer.json", outer_json.as_slice()),
            ],
        );
        let inner = SecureSource::new(source, release.public_key());
        let mut outer = SecureSource::new(Box::new(inner) as Box<dyn Source>, countersign.public_key())
            .with_manifest_name("outer.json");
        outer.open().unwrap();

        let dir = tempfile::tempdir().unwrap();
        outer.retrieve("a.txt", &dir.path().join("a.txt")).unwrap();
        // Known to the inner manifest only: rejected by the outer layer
        let dest = dir.path().join("outer.json");
        assert!(outer.retrieve("outer.json", &dest).unwrap_err().is_verification());
        assert!(!dest.exists());
    }
}
