//! Verify command

use anyhow::{Context, Result, bail};
use liftoff_core::Source;

use crate::cmd::{open_secure, retrieve_all};

/// Check every artifact `source` publishes against its signature manifest.
///
/// Artifacts are retrieved into a scratch directory that is removed afterwards.
pub fn verify(source: &str, asset: Option<&str>, token: Option<&str>, public_key: &str) -> Result<()> {
    let mut secure = open_secure(source, asset, token, public_key)?;
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;

    let transfer = retrieve_all(&secure, scratch.path());
    secure.close()?;
    let transfer = transfer?;

    for path in &transfer.delivered {
        println!("  ok      {path}");
    }
    for (path, err) in &transfer.rejected {
        println!("  failed  {path}: {err}");
    }

    if !transfer.rejected.is_empty() {
        bail!(
            "{} of {} artifacts failed verification",
            transfer.rejected.len(),
            transfer.total()
        );
    }
    println!("  verified {} artifacts", transfer.total());
    Ok(())
}
