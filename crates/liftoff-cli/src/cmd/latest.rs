//! Latest command

use anyhow::{Context, Result};
use liftoff_core::{Source, sources};

use crate::cmd::open_secure;

/// Print the newest version `source` offers.
///
/// With `public_key`, the source is opened through signature verification so
/// a missing or malformed manifest fails the command.
pub fn latest(
    source: &str,
    asset: Option<&str>,
    token: Option<&str>,
    public_key: Option<&str>,
) -> Result<()> {
    let version = if let Some(key) = public_key {
        let mut secure = open_secure(source, asset, token, key)?;
        let version = secure.latest_version();
        secure.close()?;
        version?
    } else {
        let mut plain = sources::from_location(source, asset, token)?;
        plain
            .open()
            .with_context(|| format!("Failed to open {source}"))?;
        let version = plain.latest_version();
        plain.close()?;
        version?
    };

    println!("{version}");
    Ok(())
}
