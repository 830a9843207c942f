//! Concrete update sources.

/// Zip archive backend.
pub mod archive;
/// GitHub release backend.
pub mod github;
/// Local directory backend.
pub mod local;

pub use archive::ZipSource;
pub use github::GithubSource;
pub use local::LocalSource;

use crate::error::SourceError;
use crate::source::Source;

/// Pick a backend for a user-supplied location.
///
/// - `github.com/<owner>/<repo>` URLs use [`GithubSource`] and need the
///   release `asset` name. A non-empty `token` authenticates API requests.
/// - Paths ending in `.zip` use [`ZipSource`].
/// - Anything else is treated as a local directory.
///
/// # Errors
///
/// Returns [`SourceError::Usage`] if a GitHub location is given without an
/// asset name.
pub fn from_location(
    location: &str,
    asset: Option<&str>,
    token: Option<&str>,
) -> Result<Box<dyn Source>, SourceError> {
    if location.contains("github.com/") {
        let asset = asset.ok_or_else(|| {
            SourceError::Usage(format!("GitHub source {location} needs a release asset name"))
        })?;
        let token = token.filter(|t| !t.is_empty()).map(str::to_string);
        return Ok(Box::new(GithubSource::new(location, asset).with_token(token)));
    }

    if location.to_ascii_lowercase().ends_with(".zip") {
        return Ok(Box::new(ZipSource::new(location)));
    }

    Ok(Box::new(LocalSource::new(location)))
}
