use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::config::{Settings, SourceInputs};
use crate::error::Result;
use crate::global::cache::CacheStore;
use crate::key::{derive_key, query_codename};
use crate::platform::{map_platform, Host, PlatformTarget};
use crate::registry::{resolve_release, MetadataSource, ReleaseEntry};
use crate::search_path::{append_path_file, SearchPath};
use crate::util::{file_name_from_url, set_executable, CommandRunner, Downloader};

/// Outcome of one install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallResult {
    pub tool_name: String,
    /// The `"{buildId}-{version}"` marker of the installed release.
    pub resolved_version: String,
    pub install_path: PathBuf,
    pub restored_from_cache: bool,
    /// Set only when the artifact was freshly downloaded.
    pub download_url: Option<String>,
}

impl InstallResult {
    /// Appends `version`, `path`, `cache-hit` and `download-url` as
    /// `key=value` lines to a step output file such as `$GITHUB_OUTPUT`.
    pub fn write_outputs(&self, file: &Path) -> Result<()> {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)?;
        writeln!(f, "version={}", self.resolved_version)?;
        writeln!(f, "path={}", self.install_path.display())?;
        writeln!(f, "cache-hit={}", self.restored_from_cache)?;
        if let Some(url) = &self.download_url {
            writeln!(f, "download-url={url}")?;
        }
        Ok(())
    }
}

/// A resolved release together with everything derived from it.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub release: ReleaseEntry,
    pub target: PlatformTarget,
    pub install_path: PathBuf,
    pub cache_key: String,
}

/// Resolves, caches, installs and runs the configured tool.
///
/// Every side effect except plain filesystem work goes through the injected
/// capabilities.
pub struct Installer<'a> {
    settings: &'a Settings,
    host: Host,
    metadata: &'a dyn MetadataSource,
    downloader: &'a dyn Downloader,
    cache: &'a dyn CacheStore,
    runner: &'a dyn CommandRunner,
}

impl<'a> Installer<'a> {
    pub fn new(
        settings: &'a Settings,
        metadata: &'a dyn MetadataSource,
        downloader: &'a dyn Downloader,
        cache: &'a dyn CacheStore,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            settings,
            host: Host::current(),
            metadata,
            downloader,
            cache,
            runner,
        }
    }

    /// Pretends to run on `host` instead of the current machine.
    pub fn with_host(mut self, host: Host) -> Self {
        self.host = host;
        self
    }

    /// Maps the host, resolves `specifier` and derives the install path and
    /// cache key, without touching the cache or downloading anything.
    ///
    /// The host is checked first, so unsupported machines fail before the
    /// metadata is fetched.
    pub fn plan(&self, specifier: &str) -> Result<InstallPlan> {
        let target = map_platform(&self.host.os, &self.host.arch)?;
        let release = resolve_release(self.metadata, specifier)?;
        let version_marker = release.version_marker();
        let install_path = self.settings.install_path(&version_marker);
        let codename = if self.host.is_linux() {
            Some(query_codename(self.runner, &self.settings.codename_command)?)
        } else {
            None
        };
        let cache_key = derive_key(
            &self.settings.tool_name,
            &version_marker,
            &self.host.os,
            &self.host.arch,
            codename.as_deref(),
        );
        Ok(InstallPlan { release, target, install_path, cache_key })
    }

    /// Installs the release matching `inputs` and registers it on `search_path`.
    ///
    /// # Errors
    ///
    /// Fails on unsupported hosts, metadata or download problems and when the
    /// installed tool can't report its version. Cache failures are logged and
    /// only cost a fresh download.
    pub fn install(&self, inputs: &SourceInputs, search_path: &mut SearchPath) -> Result<InstallResult> {
        let plan = self.plan(&inputs.version)?;
        let tool_name = &self.settings.tool_name;
        info!(
            tool = %tool_name,
            build_id = %plan.release.build_id,
            version = %plan.release.version,
            "Installing"
        );

        let paths = [plan.install_path.clone()];
        let restored_from_cache = match self.cache.restore(&paths, &plan.cache_key) {
            Ok(Some(matched)) => {
                info!(key = %matched, "Restored {} from cache", tool_name);
                true
            }
            Ok(None) => {
                info!(key = %plan.cache_key, "No cache entry found");
                false
            }
            Err(e) => {
                warn!(key = %plan.cache_key, "Cache restore failed, downloading instead: {e}");
                false
            }
        };

        let download_url = if restored_from_cache {
            None
        } else {
            Some(self.fresh_install(&plan)?)
        };

        search_path.prepend(&plan.install_path);
        if let Some(path_file) = &self.settings.path_file {
            append_path_file(path_file, &plan.install_path)?;
        }
        debug!(path = %plan.install_path.display(), "Added install path to search path");

        let reported = self.run_tool(&self.settings.version_args, search_path)?;
        info!("{} reports version: {}", tool_name, reported);

        Ok(InstallResult {
            tool_name: tool_name.clone(),
            resolved_version: plan.release.version_marker(),
            install_path: plan.install_path,
            restored_from_cache,
            download_url,
        })
    }

    /// Downloads the artifact, places it in the install directory and saves
    /// the directory to the cache. Returns the URL it came from.
    fn fresh_install(&self, plan: &InstallPlan) -> Result<String> {
        let asset = plan.release.asset_for(&plan.target)?;
        let url = asset.url.clone();
        let file_name = file_name_from_url(&url)?.to_string();

        std::fs::create_dir_all(&self.settings.temp_root)?;
        // removed on drop, so failed installs clean up too
        let download_dir = tempfile::Builder::new()
            .prefix(&format!("{}-download-", self.settings.tool_name))
            .tempdir_in(&self.settings.temp_root)?;
        info!(%url, "Downloading {}", self.settings.tool_name);
        let downloaded = self.downloader.download(&url, download_dir.path())?;

        std::fs::create_dir_all(&plan.install_path)?;
        let installed = plan.install_path.join(&file_name);
        std::fs::copy(&downloaded, &installed)?;
        set_executable(&installed)?;
        download_dir.close()?;
        debug!(path = %installed.display(), "Installed artifact");

        match self.cache.save(&[plan.install_path.clone()], &plan.cache_key) {
            Ok(id) => info!(key = %plan.cache_key, %id, "Saved install to cache"),
            Err(e) => warn!(key = %plan.cache_key, "Cache save failed: {e}"),
        }
        Ok(url)
    }

    /// Runs the installed tool with `args` and returns its standard output.
    pub fn invoke(&self, args: &[String], search_path: &SearchPath) -> Result<String> {
        info!("Running {} {}", self.settings.tool_name, args.join(" "));
        self.run_tool(args, search_path)
    }

    fn run_tool(&self, args: &[String], search_path: &SearchPath) -> Result<String> {
        let program = search_path
            .which(&self.settings.tool_name)
            .unwrap_or_else(|| PathBuf::from(&self.settings.tool_name));
        self.runner.run(program.as_os_str(), args, Some(search_path))
    }
}
