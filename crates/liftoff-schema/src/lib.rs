//! Shared types for liftoff.
//!
//! The wire format consumed by every update consumer lives here: the
//! signature manifest that maps relative artifact paths to detached
//! signatures, the signature value itself, and the content digest the
//! signatures are computed over.

pub mod hash;
pub mod manifest;
pub mod signature;

// Re-exports
pub use hash::Sha256Digest;
pub use manifest::{Manifest, ManifestError};
pub use signature::SignatureValue;

/// Well-known relative path of the signature manifest inside every source.
pub const MANIFEST_FILE_NAME: &str = "signatures.json";

/// Well-known relative path of the version marker inside local and archive sources.
pub const VERSION_FILE_NAME: &str = "VERSION";
