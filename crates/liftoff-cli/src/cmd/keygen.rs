//! Keygen command

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use liftoff_core::{KeyPair, keys_dir};

/// Generate a key pair and persist it (or print it with `stdout`).
pub fn keygen(name: &str, out: Option<&Path>, force: bool, stdout: bool) -> Result<()> {
    println!("  generating ed25519 keypair");
    let pair = KeyPair::generate()?;
    let public = pair.public_key();
    let private_pem = pair.export_private_pem()?;

    if stdout {
        print!("{private_pem}");
        println!();
        println!("  public (embed in app):");
        println!("  {}", public.to_base64());
        return Ok(());
    }

    let dir = match out {
        Some(dir) => dir.to_path_buf(),
        None => keys_dir().context("Could not resolve home directory; pass --out")?,
    };
    let private_path = dir.join(format!("{name}.pem"));
    let public_path = dir.join(format!("{name}.pub.pem"));

    if !force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    write_private(&private_path, private_pem.as_bytes())?;
    fs::write(&public_path, public.to_pem()?)
        .with_context(|| format!("Failed to write {}", public_path.display()))?;

    println!("  wrote {}", private_path.display());
    println!("  wrote {}", public_path.display());
    println!();
    println!("  public (embed in app):");
    println!("  {}", public.to_base64());
    Ok(())
}

/// Write private key material readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.write_all(contents)?;

    // `mode` only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
