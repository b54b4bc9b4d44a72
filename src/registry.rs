use std::collections::BTreeMap;
use std::path::PathBuf;
use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;
use crate::error::{Error, Result};
use crate::platform::PlatformTarget;

/// Pattern a specifier must match to be treated as a build identifier.
const BUILD_ID_PATTERN: &str = r"^\d+\.\d+\.\d+$";

/// One release as listed in the metadata document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    /// Numeric build identifier, e.g. `"1.4.2"`.
    pub build_id: String,
    /// Channel or version name, e.g. `"stable"`.
    pub version: String,
    /// Downloads keyed by `"{platform}-{arch}"`.
    #[serde(default)]
    pub files: BTreeMap<String, ReleaseFile>,
}

/// A per-platform download descriptor.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReleaseFile {
    /// The URL of the artifact.
    pub url: String,
}

impl ReleaseEntry {
    /// The `"{buildId}-{version}"` marker used in install paths and cache keys.
    pub fn version_marker(&self) -> String {
        format!("{}-{}", self.build_id, self.version)
    }

    /// Looks up the download for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPlatformAsset`] if the release has no file for the target.
    pub fn asset_for(&self, target: &PlatformTarget) -> Result<&ReleaseFile> {
        let key = target.asset_key();
        self.files.get(&key).ok_or(Error::MissingPlatformAsset {
            build_id: self.build_id.clone(),
            platform: key,
        })
    }
}

/// Source of the release metadata document.
pub trait MetadataSource {
    /// Fetches the full, ordered list of releases.
    fn fetch(&self) -> Result<Vec<ReleaseEntry>>;
}

/// Reads the metadata document from an HTTP(S) URL or, for `file://` URLs
/// and bare paths, from disk.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    url: String,
    client: Client,
}

impl HttpMetadataSource {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self { url: url.into(), client }
    }

    fn read_body(&self) -> Result<String> {
        if let Some(path) = local_path(&self.url) {
            return std::fs::read_to_string(&path)
                .map_err(|e| Error::metadata_fetch(&self.url, e));
        }
        let response = self.client
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::metadata_fetch(&self.url, e))?;
        response.text().map_err(|e| Error::metadata_fetch(&self.url, e))
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch(&self) -> Result<Vec<ReleaseEntry>> {
        debug!(url = %self.url, "Fetching release metadata");
        let body = self.read_body()?;
        let releases: Vec<ReleaseEntry> = serde_json::from_str(&body)
            .map_err(|e| Error::metadata_fetch(&self.url, e))?;
        if releases.is_empty() {
            return Err(Error::metadata_fetch(&self.url, "document lists no releases"));
        }
        Ok(releases)
    }
}

/// Maps `file://` URLs and plain paths to a filesystem path.
pub(crate) fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        None
    } else {
        Some(PathBuf::from(url))
    }
}

/// Returns `true` if `specifier` is a dotted numeric triple such as `1.4.2`.
pub fn is_build_id(specifier: &str) -> Result<bool> {
    let re = Regex::new(BUILD_ID_PATTERN)?;
    Ok(re.is_match(specifier))
}

/// Picks the release matching `specifier` out of `releases`.
///
/// Build identifiers are compared against `buildId`, anything else against
/// `version`. The first matching entry wins.
///
/// # Errors
///
/// Returns [`Error::NoMatchingRelease`] if nothing matches.
pub fn select_release(releases: Vec<ReleaseEntry>, specifier: &str) -> Result<ReleaseEntry> {
    let by_build_id = is_build_id(specifier)?;
    releases
        .into_iter()
        .find(|release| {
            if by_build_id {
                release.build_id == specifier
            } else {
                release.version == specifier
            }
        })
        .ok_or_else(|| Error::NoMatchingRelease(specifier.to_string()))
}

/// Fetches the metadata from `source` and resolves `specifier` against it.
///
/// # Errors
///
/// Returns [`Error::MetadataFetch`] if the document can't be read and
/// [`Error::NoMatchingRelease`] if no entry matches.
pub fn resolve_release(source: &dyn MetadataSource, specifier: &str) -> Result<ReleaseEntry> {
    let releases = source.fetch()?;
    let release = select_release(releases, specifier)?;
    debug!(build_id = %release.build_id, version = %release.version, "Resolved release");
    Ok(release)
}
