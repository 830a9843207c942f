//! liftoff - signed update retrieval CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use liftoff_cli::cmd;
use liftoff_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LIFTOFF_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let token = cli.github_token;

    // Sources do blocking I/O; keep it off the async runtime
    tokio::task::spawn_blocking(move || {
        let token = token.as_deref();
        match cli.command {
            Commands::Keygen {
                name,
                out,
                force,
                stdout,
            } => cmd::keygen::keygen(&name, out.as_deref(), force, stdout),
            Commands::Sign { path, key, output } => {
                cmd::sign::sign(&path, key.as_deref(), output.as_deref())
            }
            Commands::Latest {
                source,
                asset,
                verify,
                public_key,
            } => {
                let key = public_key.as_deref().filter(|_| verify);
                cmd::latest::latest(&source, asset.as_deref(), token, key)
            }
            Commands::Verify {
                source,
                asset,
                public_key,
            } => cmd::verify::verify(&source, asset.as_deref(), token, &public_key),
            Commands::Fetch {
                source,
                dest,
                asset,
                public_key,
            } => cmd::fetch::fetch(&source, &dest, asset.as_deref(), token, &public_key),
        }
    })
    .await?
}
