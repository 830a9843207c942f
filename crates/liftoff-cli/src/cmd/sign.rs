//! Sign command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use liftoff_core::sources::LocalSource;
use liftoff_core::{KeyPair, Source, keys_dir, source::list_files};
use liftoff_schema::{MANIFEST_FILE_NAME, Manifest};

/// Sign every file under `path` and write the signature manifest.
pub fn sign(path: &Path, key: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let key_path = match key {
        Some(key) => key.to_path_buf(),
        None => default_key().context("No signing key given; pass --key or set LIFTOFF_SIGNING_KEY")?,
    };
    let pair = KeyPair::load(&key_path)
        .with_context(|| format!("Failed to load signing key {}", key_path.display()))?;

    let output = output.map_or_else(|| path.join(MANIFEST_FILE_NAME), Path::to_path_buf);

    let mut release = LocalSource::new(path);
    release
        .open()
        .with_context(|| format!("Failed to open release directory {}", path.display()))?;

    let mut manifest = Manifest::new();
    for file in list_files(&release)? {
        let full = path.join(&file);
        if file == MANIFEST_FILE_NAME || same_file(&full, &output) {
            continue;
        }
        let signature = pair
            .sign_file(&full)
            .with_context(|| format!("Failed to sign {file}"))?;
        tracing::debug!("Signed {file}");
        manifest.insert(file, signature);
    }
    release.close()?;

    if manifest.is_empty() {
        bail!("{} contains no files to sign", path.display());
    }

    manifest
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("  signed {} files -> {}", manifest.len(), output.display());
    Ok(())
}

fn default_key() -> Option<PathBuf> {
    keys_dir()
        .map(|dir| dir.join("liftoff.pem"))
        .filter(|p| p.is_file())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
