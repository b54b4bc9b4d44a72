use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::error::{Error, Result};

/// The executable search path handed to child processes.
///
/// The installer prepends the install directory here instead of mutating the
/// process environment; commands are then resolved and spawned against it.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use toolsetup::SearchPath;
///
/// let mut path = SearchPath::new(vec!["/usr/bin".into()]);
/// path.prepend(Path::new("/tmp/mytool-1.4.2-stable"));
/// assert_eq!(path.entries()[0], Path::new("/tmp/mytool-1.4.2-stable"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    /// Reads `PATH` from the current process.
    pub fn from_env() -> Self {
        let entries = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        Self { entries }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Puts `dir` in front of every other entry, removing any earlier occurrence.
    pub fn prepend(&mut self, dir: &Path) {
        self.entries.retain(|entry| entry != dir);
        self.entries.insert(0, dir.to_path_buf());
    }

    /// Joins the entries into a `PATH` value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an entry contains the platform's path separator.
    pub fn to_os_string(&self) -> Result<OsString> {
        std::env::join_paths(&self.entries).map_err(|e| Error::Config(e.to_string()))
    }

    /// Finds the first executable called `name` (or `name.exe` on Windows).
    pub fn which(&self, name: &str) -> Option<PathBuf> {
        let suffixed = format!("{name}{}", std::env::consts::EXE_SUFFIX);
        self.entries.iter().find_map(|dir| {
            [name, suffixed.as_str()]
                .into_iter()
                .map(|candidate| dir.join(candidate))
                .find(|candidate| candidate.is_file())
        })
    }
}

/// Appends `dir` as one line to a runner path file such as `$GITHUB_PATH`,
/// so later steps of the same job pick it up.
pub fn append_path_file(file: &Path, dir: &Path) -> Result<()> {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)?;
    writeln!(f, "{}", dir.display())?;
    Ok(())
}
