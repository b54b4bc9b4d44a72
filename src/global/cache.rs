use std::fs::File;
use std::path::{Component, Path, PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{Error, Result};

/// Keyed snapshot storage for directories.
pub trait CacheStore {
    /// Restores `paths` from the entry saved under `key`.
    ///
    /// Returns the matched key on a hit and `None` on a miss.
    fn restore(&self, paths: &[PathBuf], key: &str) -> Result<Option<String>>;

    /// Snapshots `paths` under `key` and returns the entry id.
    fn save(&self, paths: &[PathBuf], key: &str) -> Result<String>;
}

/// Describes what an archive in the store holds.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct CacheManifest {
    key: String,
    paths: Vec<PathBuf>,
}

/// A [`CacheStore`] keeping one `.tar.gz` plus a `.json` manifest per key
/// in a local directory.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_id(key: &str) -> String {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect()
    }

    fn archive_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.tar.gz"))
    }

    fn manifest_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_manifest(&self, id: &str) -> Result<Option<CacheManifest>> {
        let path = self.manifest_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn unpack(&self, archive_path: &Path, paths: &[PathBuf]) -> Result<()> {
        let file = File::open(archive_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(true);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.into_owned();
            let mut components = name.components();
            let index = components
                .next()
                .and_then(|c| c.as_os_str().to_str())
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| Error::cache(format!("Unexpected archive entry {}", name.display())))?;
            let root = paths
                .get(index)
                .ok_or_else(|| Error::cache(format!("Archive entry {} has no target path", name.display())))?;
            let rest = components.as_path();
            if rest.components().any(|c| !matches!(c, Component::Normal(_))) {
                return Err(Error::cache(format!("Refusing to unpack {}", name.display())));
            }
            let dest = if rest.as_os_str().is_empty() { root.clone() } else { root.join(rest) };
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry.unpack(&dest)?;
        }
        Ok(())
    }
}

impl CacheStore for LocalCacheStore {
    fn restore(&self, paths: &[PathBuf], key: &str) -> Result<Option<String>> {
        let id = Self::entry_id(key);
        let archive_path = self.archive_path(&id);
        let Some(manifest) = self.read_manifest(&id)? else {
            return Ok(None);
        };
        if manifest.key != key || manifest.paths != paths || !archive_path.exists() {
            debug!(%key, "Cache entry saved for different paths");
            return Ok(None);
        }
        self.unpack(&archive_path, paths)?;
        debug!(%key, archive = %archive_path.display(), "Restored cache entry");
        Ok(Some(manifest.key))
    }

    fn save(&self, paths: &[PathBuf], key: &str) -> Result<String> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            debug!(root = %self.root.display(), "Cache directory created");
        }
        let id = Self::entry_id(key);
        let archive_path = self.archive_path(&id);

        // write to a temporary file first so a failed save never leaves a
        // truncated archive behind
        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        {
            let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for (index, path) in paths.iter().enumerate() {
                if !path.is_dir() {
                    return Err(Error::cache(format!("{} is not a directory", path.display())));
                }
                builder.append_dir_all(index.to_string(), path)?;
            }
            builder.into_inner()?.finish()?;
        }
        tmp.persist(&archive_path).map_err(|e| Error::Io(e.error))?;

        let manifest = CacheManifest {
            key: key.to_string(),
            paths: paths.to_vec(),
        };
        std::fs::write(self.manifest_path(&id), serde_json::to_string_pretty(&manifest)?)?;
        debug!(%key, archive = %archive_path.display(), "Saved cache entry");
        Ok(id)
    }
}

/// Deletes every entry in the store.
pub fn clean_cache(store: &LocalCacheStore) -> Result<()> {
    if store.root().exists() {
        std::fs::remove_dir_all(store.root())?;
    }
    std::fs::create_dir_all(store.root())?;
    Ok(())
}
