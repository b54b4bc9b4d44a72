use std::path::PathBuf;
use directories::ProjectDirs;
use crate::error::{Error, Result};

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "toolsetup", "toolsetup")
        .ok_or_else(|| Error::Config("Could not get project directories".to_string()))
}

/// Default location of the local cache store.
pub fn get_global_cache_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().to_path_buf())
}

/// Default location of the settings file.
pub fn get_global_config_file() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("toolsetup.toml"))
}

/// Root under which installs and temporary downloads are placed:
/// `$RUNNER_TEMP` when set, the OS temp directory otherwise.
pub fn default_temp_root() -> PathBuf {
    std::env::var_os("RUNNER_TEMP")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}
