//! Core library for liftoff.
//!
//! Update artifacts come from a pluggable [`Source`] (a local directory, a
//! zip archive, or a GitHub release). Wrapping any source in a
//! [`SecureSource`] makes every retrieval check the artifact against a
//! signature manifest published alongside it, using a single trusted
//! [`PublicKey`] supplied by the caller.
//!
//! ```no_run
//! use liftoff_core::{PublicKey, SecureSource, Source, sources::LocalSource};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = PublicKey::parse(&std::env::var("LIFTOFF_PUBLIC_KEY")?)?;
//! let mut source = SecureSource::new(LocalSource::new("release/1.2.0"), key);
//! source.open()?;
//! source.retrieve("bin/tool", std::path::Path::new("/tmp/tool"))?;
//! source.close()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod keys;
pub mod paths;
pub mod secure;
pub mod source;
pub mod sources;

pub use error::{SourceError, VerificationFailure};
pub use keys::{KeyError, KeyPair, PublicKey};
pub use paths::*;
pub use secure::{SecureSource, SessionState};
pub use source::{Entry, Source, WalkResult};

/// User Agent string for outbound HTTP requests
pub const USER_AGENT: &str = concat!("liftoff-core/", env!("CARGO_PKG_VERSION"));
