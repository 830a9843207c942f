//! Fetch command

use std::path::Path;

use anyhow::{Result, bail};
use liftoff_core::Source;

use crate::cmd::{open_secure, retrieve_all};

/// Retrieve every verified artifact of `source` into `dest`.
///
/// Rejected artifacts are reported and skipped; anything already delivered
/// stays in place even when the command fails.
pub fn fetch(
    source: &str,
    dest: &Path,
    asset: Option<&str>,
    token: Option<&str>,
    public_key: &str,
) -> Result<()> {
    if same_directory(Path::new(source), dest) {
        bail!("--dest {} is the release being fetched", dest.display());
    }

    let mut secure = open_secure(source, asset, token, public_key)?;
    if let Ok(version) = secure.latest_version() {
        println!("  fetching {source} {version}");
    }

    let transfer = retrieve_all(&secure, dest);
    secure.close()?;
    let transfer = transfer?;

    for (path, err) in &transfer.rejected {
        println!("  rejected {path}: {err}");
    }
    println!(
        "  fetched {} of {} artifacts -> {}",
        transfer.delivered.len(),
        transfer.total(),
        dest.display()
    );

    if !transfer.rejected.is_empty() {
        bail!("{} artifacts failed verification", transfer.rejected.len());
    }
    Ok(())
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
