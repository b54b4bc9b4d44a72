//! Host detection and mapping onto the release metadata's platform keys.

use std::fmt;
use crate::error::{Error, Result};

/// The only CPU architecture releases are published for.
pub const SUPPORTED_ARCH: &str = "x86_64";

/// Architecture label used in asset keys.
const ASSET_ARCH: &str = "x64";

/// The running operating system and CPU architecture, as reported by
/// `std::env::consts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub os: String,
    pub arch: String,
}

impl Host {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self { os: os.into(), arch: arch.into() }
    }

    /// The host this binary is running on.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_linux(&self) -> bool {
        self.os == "linux"
    }
}

/// Operating systems that have published builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Win,
    Osx,
    Linux,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            Platform::Win => "win",
            Platform::Osx => "osx",
            Platform::Linux => "linux",
        };
        f.write_str(key)
    }
}

/// A supported platform/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    pub platform: Platform,
    pub arch: &'static str,
}

impl PlatformTarget {
    pub fn new(platform: Platform) -> Self {
        Self { platform, arch: ASSET_ARCH }
    }

    /// Key into a release's `files` map, e.g. `linux-x64`.
    pub fn asset_key(&self) -> String {
        format!("{}-{}", self.platform, self.arch)
    }
}

/// Maps an OS/architecture pair to the release's platform target.
///
/// The architecture is checked first.
///
/// # Errors
///
/// [`Error::UnsupportedArchitecture`] for anything but `x86_64`,
/// [`Error::UnsupportedPlatform`] for anything but Windows, macOS and Linux.
pub fn map_platform(os: &str, arch: &str) -> Result<PlatformTarget> {
    if arch != SUPPORTED_ARCH {
        return Err(Error::UnsupportedArchitecture(arch.to_string()));
    }
    let platform = match os {
        "windows" => Platform::Win,
        "macos" => Platform::Osx,
        "linux" => Platform::Linux,
        other => return Err(Error::UnsupportedPlatform(other.to_string())),
    };
    Ok(PlatformTarget::new(platform))
}
