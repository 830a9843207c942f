//! Detached signature values as they appear in the manifest.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// A detached signature as stored in the manifest (standard base64).
///
/// The value is opaque until it is used for verification: loading a
/// manifest only checks that each value is a JSON string, so a malformed
/// encoding surfaces as a verification failure for that one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureValue(String);

impl SignatureValue {
    /// Wrap an already-encoded signature string without validation.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Encode raw signature bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Decode the raw signature bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.0.trim())
    }

    /// The encoded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SignatureValue {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SignatureValue {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
