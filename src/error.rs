//! Error type shared by every stage of the install pipeline.

use std::ffi::OsStr;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, installing or running a tool.
///
/// Only [`Error::Cache`] is downgraded inside the installer; every other
/// variant ends the run when it reaches the top-level handler.
#[derive(Error, Debug)]
pub enum Error {
    /// The release metadata could not be retrieved or was not a non-empty list.
    #[error("Failed to fetch release metadata from {url}: {message}")]
    MetadataFetch {
        /// Location the metadata was read from.
        url: String,
        /// Error message.
        message: String,
    },

    /// No release entry matches the requested specifier.
    #[error("No release matches version '{0}'")]
    NoMatchingRelease(String),

    /// The host CPU architecture has no published builds.
    #[error("Unsupported architecture '{0}': only x86_64 builds are published")]
    UnsupportedArchitecture(String),

    /// The host operating system has no published builds.
    #[error("Unsupported platform '{0}'")]
    UnsupportedPlatform(String),

    /// The matched release lists no download for the host platform.
    #[error("Release {build_id} has no download for '{platform}'")]
    MissingPlatformAsset {
        /// Build identifier of the matched release.
        build_id: String,
        /// Asset key that was looked up, e.g. `linux-x64`.
        platform: String,
    },

    /// Downloading the release artifact failed.
    #[error("Failed to download {url}: {message}")]
    Download {
        /// The artifact URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// The Linux distribution codename could not be determined.
    #[error("Failed to query distribution codename: {0}")]
    CodenameQuery(String),

    /// Cache restore or save failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An external command could not be started or exited unsuccessfully.
    #[error("Command '{command}' failed: {message}")]
    Invocation {
        /// The program that was run.
        command: String,
        /// Error message or captured stderr.
        message: String,
    },

    /// Settings are incomplete or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regex compilation error.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Create a metadata fetch error.
    #[must_use]
    pub fn metadata_fetch(url: impl Into<String>, message: impl ToString) -> Self {
        Self::MetadataFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a download error.
    #[must_use]
    pub fn download(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an invocation error for `program`.
    #[must_use]
    pub fn invocation(program: &OsStr, message: impl ToString) -> Self {
        Self::Invocation {
            command: program.to_string_lossy().into_owned(),
            message: message.to_string(),
        }
    }

    /// Create a cache error.
    #[must_use]
    pub fn cache(message: impl ToString) -> Self {
        Self::Cache(message.to_string())
    }

    /// Whether the installer may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Cache(_))
    }
}
