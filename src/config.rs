use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::global::utils::{default_temp_root, get_global_cache_dir};

/// Specifier used when no version is requested.
pub const DEFAULT_SPECIFIER: &str = "stable";

/// String values accepted as "true" for boolean inputs (compared lower-cased).
const TRUTHY: [&str; 4] = ["true", "yes", "1", "on"];

/// Parses a boolean input. Anything outside the truthy set is `false`.
pub fn parse_flag(value: &str) -> bool {
    TRUTHY.contains(&value.trim().to_lowercase().as_str())
}

/// What the caller asked for on this run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInputs {
    /// Lower-cased version specifier.
    pub version: String,
    /// Run the tool once it is installed.
    pub execute: bool,
    /// Arguments for that run.
    pub args: Vec<String>,
}

impl SourceInputs {
    pub fn new(version: &str, execute: bool) -> Self {
        let version = version.trim();
        let version = if version.is_empty() { DEFAULT_SPECIFIER } else { version };
        Self {
            version: version.to_lowercase(),
            execute,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl Default for SourceInputs {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIFIER, false)
    }
}

/// Contents of an optional `toolsetup.toml`.
///
/// ```toml
/// tool-name = "mytool"
/// metadata-url = "https://example.com/releases.json"
/// version-args = ["--version"]
/// codename-command = ["lsb_release", "-sc"]
/// cache-dir = "/var/cache/toolsetup"
/// ```
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SettingsFile {
    pub tool_name: Option<String>,
    pub metadata_url: Option<String>,
    pub version_args: Option<Vec<String>>,
    pub codename_command: Option<Vec<String>>,
    pub cache_dir: Option<PathBuf>,
}

impl SettingsFile {
    /// Loads a settings file.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or deserialized.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SettingsFile> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads `path` if it exists, otherwise returns empty settings.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<SettingsFile> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(SettingsFile::default())
        }
    }

    /// Saves the settings in pretty TOML format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Values given on the command line or through the environment. They win
/// over the settings file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub tool_name: Option<String>,
    pub metadata_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub temp_root: Option<PathBuf>,
    pub path_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
}

/// Immutable settings for one run, built once at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Name the tool is installed and invoked under.
    pub tool_name: String,
    /// Where the release metadata document lives.
    pub metadata_url: String,
    /// Arguments that make the tool print its version.
    pub version_args: Vec<String>,
    /// Command printing the Linux distribution codename.
    pub codename_command: Vec<String>,
    /// Root for install directories and temporary downloads.
    pub temp_root: PathBuf,
    /// Directory of the local cache store.
    pub cache_dir: PathBuf,
    /// File install paths are appended to, e.g. `$GITHUB_PATH`.
    pub path_file: Option<PathBuf>,
    /// File step outputs are appended to, e.g. `$GITHUB_OUTPUT`.
    pub output_file: Option<PathBuf>,
}

impl Settings {
    /// Merges the settings file with overrides and fills in defaults.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if no tool name or metadata URL is given.
    pub fn resolve(file: SettingsFile, overrides: Overrides) -> Result<Settings> {
        let tool_name = overrides.tool_name.or(file.tool_name)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Config("tool name is not set".to_string()))?;
        let metadata_url = overrides.metadata_url.or(file.metadata_url)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Config("metadata URL is not set".to_string()))?;
        let cache_dir = match overrides.cache_dir.or(file.cache_dir) {
            Some(dir) => dir,
            None => get_global_cache_dir()?,
        };
        Ok(Settings {
            tool_name,
            metadata_url,
            version_args: file.version_args.unwrap_or_else(|| vec!["--version".to_string()]),
            codename_command: file.codename_command
                .unwrap_or_else(|| vec!["lsb_release".to_string(), "-sc".to_string()]),
            temp_root: overrides.temp_root.unwrap_or_else(default_temp_root),
            cache_dir,
            path_file: overrides.path_file,
            output_file: overrides.output_file,
        })
    }

    /// Deterministic install directory for a version marker.
    pub fn install_path(&self, version_marker: &str) -> PathBuf {
        self.temp_root.join(format!("{}-{}", self.tool_name, version_marker))
    }
}
