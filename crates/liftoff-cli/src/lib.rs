//! liftoff - signed update retrieval
//!
//! Command-line front end for `liftoff-core`: generate signing keys, sign a
//! release directory, and fetch or check releases from any supported source
//! with every artifact verified against the release's signature manifest.
//!
//! # Sources
//!
//! A `--source` is one of:
//!
//! - a local release directory,
//! - a `.zip` archive,
//! - a `https://github.com/<owner>/<repo>` URL (with `--asset` naming the
//!   zip attached to each release).

pub mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(name = "liftoff")]
#[command(author, version = env!("LIFTOFF_VERSION"), about = "liftoff - signed update retrieval")]
pub struct Cli {
    /// Log debug output (overridden by LIFTOFF_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Token for GitHub API requests
    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate an Ed25519 signing key pair
    Keygen {
        /// Base file name for the key pair
        #[arg(long, default_value = "liftoff")]
        name: String,
        /// Directory to write keys to (default: $LIFTOFF_HOME/keys)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Overwrite existing key files
        #[arg(long, short = 'f')]
        force: bool,
        /// Print the private key instead of writing files
        #[arg(long, conflicts_with_all = ["out", "force"])]
        stdout: bool,
    },
    /// Sign every file in a release directory and write its signature manifest
    Sign {
        /// Release directory
        #[arg(long)]
        path: PathBuf,
        /// Private key file (PEM or base64 seed; default: $LIFTOFF_HOME/keys/liftoff.pem)
        #[arg(long, env = "LIFTOFF_SIGNING_KEY")]
        key: Option<PathBuf>,
        /// Manifest output path (default: <path>/signatures.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the latest version a source offers
    Latest {
        /// Release location
        #[arg(long)]
        source: String,
        /// Release asset name (GitHub sources)
        #[arg(long)]
        asset: Option<String>,
        /// Also require a valid signature manifest
        #[arg(long, requires = "public_key")]
        verify: bool,
        /// Trusted public key (file path or inline)
        #[arg(long, env = "LIFTOFF_PUBLIC_KEY", hide_env_values = true)]
        public_key: Option<String>,
    },
    /// Check every artifact of a release against its signatures
    Verify {
        /// Release location
        #[arg(long)]
        source: String,
        /// Release asset name (GitHub sources)
        #[arg(long)]
        asset: Option<String>,
        /// Trusted public key (file path or inline)
        #[arg(long, env = "LIFTOFF_PUBLIC_KEY", hide_env_values = true)]
        public_key: String,
    },
    /// Download every verified artifact of a release
    Fetch {
        /// Release location
        #[arg(long)]
        source: String,
        /// Destination directory
        #[arg(long)]
        dest: PathBuf,
        /// Release asset name (GitHub sources)
        #[arg(long)]
        asset: Option<String>,
        /// Trusted public key (file path or inline)
        #[arg(long, env = "LIFTOFF_PUBLIC_KEY", hide_env_values = true)]
        public_key: String,
    },
}
