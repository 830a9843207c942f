use std::fs::File;
use std::path::Path;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tempfile::TempDir;

use crate::error::SourceError;
use crate::source::{Source, WalkResult, is_contained};
use crate::sources::archive::ZipSource;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";

#[derive(Debug, Deserialize)]
struct GithubTag {
    name: String,
    #[serde(default)]
    commit: Option<GithubCommit>,
}

#[derive(Debug, Deserialize)]
struct GithubCommit {
    sha: String,
}

/// Owner and name parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Account or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl Repository {
    /// Parse `https://github.com/<owner>/<repo>` (trailing `/` or `.git` allowed).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Remote`] if the URL does not name a GitHub repository.
    pub fn parse(url: &str) -> Result<Self, SourceError> {
        let re = Regex::new(r"github\.com/([^/]+)/([^/]+?)(?:\.git)?/?$")
            .map_err(|e| SourceError::Remote(e.to_string()))?;
        let caps = re
            .captures(url)
            .ok_or_else(|| SourceError::Remote(format!("Invalid GitHub URL: {url}")))?;
        Ok(Self {
            owner: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }
}

/// The open half of a GitHub source: the downloaded release archive.
struct Session {
    tag: String,
    // Declared before `_download` so the archive handle is dropped before
    // the directory holding it is removed.
    archive: ZipSource,
    _download: TempDir,
}

/// Serves the artifacts of the latest tagged GitHub release.
///
/// `open` lists the repository's tags, picks the highest semver tag, and
/// downloads `releases/download/<tag>/<asset>` (a zip archive) into a
/// session-owned temporary directory. Walks and retrievals are then served
/// from that archive, with the same locking behaviour as [`ZipSource`].
pub struct GithubSource {
    repo_url: String,
    asset_name: String,
    api_base: String,
    download_base: String,
    token: Option<String>,
    session: Option<Session>,
}

impl std::fmt::Debug for GithubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubSource")
            .field("repo_url", &self.repo_url)
            .field("asset_name", &self.asset_name)
            .field("open", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl GithubSource {
    /// Create a source for `repo_url` whose releases ship `asset_name`.
    pub fn new(repo_url: impl Into<String>, asset_name: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            asset_name: asset_name.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            token: None,
            session: None,
        }
    }

    /// Override the REST API endpoint (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the host release assets are downloaded from.
    pub fn with_download_base(mut self, base: impl Into<String>) -> Self {
        self.download_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticate API requests with a token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn tags_url(&self, repo: &Repository) -> String {
        format!("{}/repos/{}/{}/tags", self.api_base, repo.owner, repo.name)
    }

    fn asset_url(&self, repo: &Repository, tag: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.download_base, repo.owner, repo.name, tag, self.asset_name
        )
    }

    fn build_client(&self) -> Result<Client, SourceError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| SourceError::Remote(format!("Invalid GitHub token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(Client::builder()
            .user_agent(crate::USER_AGENT)
            .default_headers(headers)
            .build()?)
    }

    /// The asset becomes a file name inside the download directory.
    fn checked_asset_name(&self) -> Result<&str, SourceError> {
        let name = self.asset_name.as_str();
        if !is_contained(name) || name.contains(['/', '\\']) || name == "." {
            return Err(SourceError::Usage(format!(
                "Release asset name {name:?} must be a plain file name"
            )));
        }
        Ok(name)
    }

    fn session(&self) -> Result<&Session, SourceError> {
        self.session
            .as_ref()
            .ok_or_else(|| SourceError::Usage("GitHub source is not open".to_string()))
    }
}

fn fetch_tags(client: &Client, url: &str) -> Result<Vec<GithubTag>, SourceError> {
    let response = client
        .get(url)
        .header(ACCEPT, "application/vnd.github+json")
        .send()?;
    if !response.status().is_success() {
        return Err(SourceError::Remote(format!(
            "GET {url}: HTTP {}",
            response.status()
        )));
    }
    Ok(response.json()?)
}

fn download(client: &Client, url: &str, dest: &Path) -> Result<(), SourceError> {
    let mut response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(SourceError::Remote(format!(
            "GET {url}: HTTP {}",
            response.status()
        )));
    }
    let mut file = File::create(dest)?;
    response.copy_to(&mut file)?;
    Ok(())
}

/// Highest semver tag (leading `v` ignored), else the first tag listed.
fn select_latest(tags: &[GithubTag]) -> Option<&GithubTag> {
    tags.iter()
        .filter_map(|t| {
            semver::Version::parse(t.name.trim_start_matches('v'))
                .ok()
                .map(|v| (v, t))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, t)| t)
        .or_else(|| tags.first())
}

impl Source for GithubSource {
    fn open(&mut self) -> Result<(), SourceError> {
        self.close()?;

        let asset_name = self.checked_asset_name()?.to_string();
        let repo = Repository::parse(&self.repo_url)?;
        let client = self.build_client()?;

        let tags = fetch_tags(&client, &self.tags_url(&repo))?;
        let tag = select_latest(&tags)
            .ok_or_else(|| SourceError::Remote(format!("{} has no tags", self.repo_url)))?;
        tracing::debug!(
            "Latest tag for {}/{}: {} ({})",
            repo.owner,
            repo.name,
            tag.name,
            tag.commit.as_ref().map_or("?", |c| c.sha.as_str())
        );

        let download_dir = tempfile::tempdir()?;
        let archive_path = download_dir.path().join(&asset_name);
        let url = self.asset_url(&repo, &tag.name);
        tracing::debug!("Downloading {url}");
        download(&client, &url, &archive_path)?;

        let mut archive = ZipSource::new(archive_path);
        archive.open()?;

        self.session = Some(Session {
            tag: tag.name.clone(),
            archive,
            _download: download_dir,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if let Some(mut session) = self.session.take() {
            session.archive.close()?;
        }
        Ok(())
    }

    fn latest_version(&self) -> Result<String, SourceError> {
        Ok(self.session()?.tag.clone())
    }

    fn walk(
        &self,
        visitor: &mut dyn FnMut(WalkResult) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        self.session()?.archive.walk(visitor)
    }

    fn retrieve(&self, src: &str, dest: &Path) -> Result<(), SourceError> {
        self.session()?.archive.retrieve(src, dest)
    }
}
