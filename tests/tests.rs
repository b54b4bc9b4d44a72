use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use toolsetup::*;

const TOOL: &str = "mytool";
const SCRIPT: &str = "#!/bin/sh\necho mytool 1.4.2\n";

fn release(build_id: &str, version: &str, platforms: &[&str]) -> ReleaseEntry {
    let files = platforms
        .iter()
        .map(|p| {
            let url = format!("https://example.invalid/{build_id}/{p}/{TOOL}");
            (p.to_string(), ReleaseFile { url })
        })
        .collect::<BTreeMap<_, _>>();
    ReleaseEntry {
        build_id: build_id.to_string(),
        version: version.to_string(),
        files,
    }
}

struct FakeMetadata {
    releases: Vec<ReleaseEntry>,
    fetches: Cell<usize>,
}

impl FakeMetadata {
    fn new() -> Self {
        Self {
            releases: vec![
                release("1.5.0", "insiders", &["linux-x64", "win-x64", "osx-x64"]),
                release("1.4.2", "stable", &["linux-x64", "win-x64"]),
                release("1.3.0", "1.4.2", &["linux-x64"]),
            ],
            fetches: Cell::new(0),
        }
    }
}

impl MetadataSource for FakeMetadata {
    fn fetch(&self) -> Result<Vec<ReleaseEntry>> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.releases.clone())
    }
}

#[derive(Default)]
struct FakeDownloader {
    fail: bool,
    urls: RefCell<Vec<String>>,
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.urls.borrow_mut().push(url.to_string());
        if self.fail {
            return Err(Error::download(url, "connection reset"));
        }
        let dest = dest_dir.join(file_name_from_url(url)?);
        std::fs::write(&dest, SCRIPT)?;
        Ok(dest)
    }
}

#[derive(Default, Clone, Copy, PartialEq)]
enum Restore {
    Hit,
    #[default]
    Miss,
    Fail,
}

#[derive(Default)]
struct FakeCache {
    restore: Restore,
    fail_save: bool,
    restores: RefCell<Vec<String>>,
    saves: RefCell<Vec<(Vec<PathBuf>, String)>>,
}

impl CacheStore for FakeCache {
    fn restore(&self, _paths: &[PathBuf], key: &str) -> Result<Option<String>> {
        self.restores.borrow_mut().push(key.to_string());
        match self.restore {
            Restore::Hit => Ok(Some(key.to_string())),
            Restore::Miss => Ok(None),
            Restore::Fail => Err(Error::cache("service unavailable")),
        }
    }

    fn save(&self, paths: &[PathBuf], key: &str) -> Result<String> {
        self.saves.borrow_mut().push((paths.to_vec(), key.to_string()));
        if self.fail_save {
            return Err(Error::cache("quota exceeded"));
        }
        Ok("42".to_string())
    }
}

struct FakeRunner {
    codename: Option<&'static str>,
    tool_fails: bool,
    calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self { codename: Some("jammy"), tool_fails: false, calls: RefCell::new(Vec::new()) }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &OsStr, args: &[String], _search_path: Option<&SearchPath>) -> Result<String> {
        self.calls.borrow_mut().push((PathBuf::from(program), args.to_vec()));
        if program == "lsb_release" {
            return self.codename
                .map(str::to_string)
                .ok_or_else(|| Error::invocation(program, "not found"));
        }
        if self.tool_fails {
            return Err(Error::invocation(program, "exit status: 2"));
        }
        Ok(format!("mytool 1.4.2 {}", args.join(" ")).trim_end().to_string())
    }
}

fn setup_tests() -> (TempDir, Settings) {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings {
        tool_name: TOOL.to_string(),
        metadata_url: "https://example.invalid/releases.json".to_string(),
        version_args: vec!["--version".to_string()],
        codename_command: vec!["lsb_release".to_string(), "-sc".to_string()],
        temp_root: temp_dir.path().join("runner-temp"),
        cache_dir: temp_dir.path().join("cache"),
        path_file: None,
        output_file: None,
    };
    (temp_dir, settings)
}

fn linux() -> Host {
    Host::new("linux", "x86_64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_install_downloads_places_and_caches() {
        let (_dir, settings) = setup_tests();
        let metadata = FakeMetadata::new();
        let downloader = FakeDownloader::default();
        let cache = FakeCache::default();
        let runner = FakeRunner::default();
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());
        let mut search_path = SearchPath::new(vec!["/usr/bin".into()]);

        let result = installer.install(&SourceInputs::default(), &mut search_path).unwrap();

        let install_path = settings.temp_root.join("mytool-1.4.2-stable");
        assert_eq!(result.install_path, install_path);
        assert_eq!(result.resolved_version, "1.4.2-stable");
        assert!(!result.restored_from_cache);
        assert_eq!(
            result.download_url.as_deref(),
            Some("https://example.invalid/1.4.2/linux-x64/mytool")
        );
        assert_eq!(downloader.urls.borrow().len(), 1);
        assert_eq!(std::fs::read_to_string(install_path.join(TOOL)).unwrap(), SCRIPT);

        let key = "mytool-1.4.2-stable-linux-x86_64-jammy-cache";
        assert_eq!(*cache.restores.borrow(), vec![key.to_string()]);
        assert_eq!(*cache.saves.borrow(), vec![(vec![install_path.clone()], key.to_string())]);
        assert_eq!(search_path.entries()[0], install_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_fresh_install_sets_executable_bits() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let result = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        let installed = result.install_path.join(TOOL);
        let mode = std::fs::metadata(&installed).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(is_executable(&installed));
    }

    #[test]
    fn test_temporary_download_is_removed() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(&settings.temp_root)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("mytool-1.4.2-stable")]);
    }

    #[test]
    fn test_version_query_runs_installed_binary() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let result = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[0], (PathBuf::from("lsb_release"), vec!["-sc".to_string()]));
        assert_eq!(calls[1], (result.install_path.join(TOOL), vec!["--version".to_string()]));
    }

    #[test]
    fn test_cache_hit_skips_download() {
        let (_dir, settings) = setup_tests();
        let metadata = FakeMetadata::new();
        let downloader = FakeDownloader::default();
        let cache = FakeCache { restore: Restore::Hit, ..FakeCache::default() };
        let runner = FakeRunner::default();
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let result = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        assert!(result.restored_from_cache);
        assert_eq!(result.download_url, None);
        assert!(downloader.urls.borrow().is_empty());
        assert!(cache.saves.borrow().is_empty());
    }

    #[test]
    fn test_cache_restore_error_falls_back_to_download() {
        let (_dir, settings) = setup_tests();
        let metadata = FakeMetadata::new();
        let downloader = FakeDownloader::default();
        let cache = FakeCache { restore: Restore::Fail, ..FakeCache::default() };
        let runner = FakeRunner::default();
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let result = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        assert!(!result.restored_from_cache);
        assert!(result.download_url.is_some());
        assert_eq!(downloader.urls.borrow().len(), 1);
    }

    #[test]
    fn test_cache_save_error_does_not_fail_install() {
        let (_dir, settings) = setup_tests();
        let metadata = FakeMetadata::new();
        let downloader = FakeDownloader::default();
        let cache = FakeCache { fail_save: true, ..FakeCache::default() };
        let runner = FakeRunner::default();
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let result = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        assert!(result.install_path.join(TOOL).is_file());
        assert_eq!(cache.saves.borrow().len(), 1);
    }

    #[test]
    fn test_unsupported_architecture_halts_before_any_fetch() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(Host::new("linux", "arm64"));

        let err = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap_err();

        assert!(matches!(err, Error::UnsupportedArchitecture(ref arch) if arch == "arm64"));
        assert_eq!(metadata.fetches.get(), 0);
        assert!(downloader.urls.borrow().is_empty());
        assert!(cache.restores.borrow().is_empty());
    }

    #[test]
    fn test_unsupported_platform_halts() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(Host::new("freebsd", "x86_64"));

        let err = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap_err();

        assert!(matches!(err, Error::UnsupportedPlatform(_)));
        assert!(downloader.urls.borrow().is_empty());
    }

    #[test]
    fn test_build_id_specifier_selects_by_build_id() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let inputs = SourceInputs::new("1.4.2", false);
        let result = installer.install(&inputs, &mut SearchPath::default()).unwrap();

        // the 1.3.0 entry is named "1.4.2" but must not be picked
        assert_eq!(result.resolved_version, "1.4.2-stable");
    }

    #[test]
    fn test_channel_specifier_selects_by_version() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let inputs = SourceInputs::new("Insiders", false);
        let result = installer.install(&inputs, &mut SearchPath::default()).unwrap();

        assert_eq!(result.resolved_version, "1.5.0-insiders");
    }

    #[test]
    fn test_unknown_build_id_fails_without_download() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let err = installer
            .install(&SourceInputs::new("9.9.9", false), &mut SearchPath::default())
            .unwrap_err();

        assert!(matches!(err, Error::NoMatchingRelease(ref s) if s == "9.9.9"));
        assert!(downloader.urls.borrow().is_empty());
    }

    #[test]
    fn test_missing_platform_asset_is_classified() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(Host::new("macos", "x86_64"));

        let err = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap_err();

        assert!(matches!(err, Error::MissingPlatformAsset { ref platform, .. } if platform == "osx-x64"));
        assert!(downloader.urls.borrow().is_empty());
        // no codename is queried off Linux
        assert!(runner.calls.borrow().is_empty());
        assert_eq!(*cache.restores.borrow(), vec!["mytool-1.4.2-stable-macos-x86_64-cache".to_string()]);
    }

    #[test]
    fn test_download_failure_is_fatal() {
        let (_dir, settings) = setup_tests();
        let metadata = FakeMetadata::new();
        let downloader = FakeDownloader { fail: true, ..FakeDownloader::default() };
        let cache = FakeCache::default();
        let runner = FakeRunner::default();
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let err = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap_err();

        assert!(matches!(err, Error::Download { .. }));
        assert!(cache.saves.borrow().is_empty());
        assert!(!settings.temp_root.join("mytool-1.4.2-stable").exists());
        // the temporary download directory is gone as well
        assert_eq!(std::fs::read_dir(&settings.temp_root).unwrap().count(), 0);
    }

    #[test]
    fn test_codename_failure_is_fatal() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default());
        let runner = FakeRunner { codename: None, ..FakeRunner::default() };
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let err = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap_err();

        assert!(matches!(err, Error::CodenameQuery(_)));
        assert!(cache.restores.borrow().is_empty());
    }

    #[test]
    fn test_version_query_failure_propagates() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default());
        let runner = FakeRunner { tool_fails: true, ..FakeRunner::default() };
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let err = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap_err();

        assert!(matches!(err, Error::Invocation { .. }));
    }

    #[test]
    fn test_invoke_passes_arguments() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());
        let mut search_path = SearchPath::default();
        installer.install(&SourceInputs::default(), &mut search_path).unwrap();

        let output = installer.invoke(&["build".to_string(), "--all".to_string()], &search_path).unwrap();

        assert_eq!(output, "mytool 1.4.2 build --all");
        let calls = runner.calls.borrow();
        assert_eq!(calls.last().unwrap().1, vec!["build", "--all"]);
    }

    #[test]
    fn test_path_and_output_files_are_written() {
        let (dir, mut settings) = setup_tests();
        settings.path_file = Some(dir.path().join("github_path"));
        settings.output_file = Some(dir.path().join("github_output"));
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let result = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();
        result.write_outputs(dir.path().join("github_output").as_path()).unwrap();

        let path_file = std::fs::read_to_string(dir.path().join("github_path")).unwrap();
        assert_eq!(path_file.trim_end(), result.install_path.display().to_string());
        let outputs = std::fs::read_to_string(dir.path().join("github_output")).unwrap();
        assert!(outputs.contains("version=1.4.2-stable\n"));
        assert!(outputs.contains("cache-hit=false\n"));
        assert!(outputs.contains("download-url=https://example.invalid/1.4.2/linux-x64/mytool\n"));
    }

    #[test]
    fn test_plan_does_not_touch_cache_or_network() {
        let (_dir, settings) = setup_tests();
        let (metadata, downloader, cache, runner) =
            (FakeMetadata::new(), FakeDownloader::default(), FakeCache::default(), FakeRunner::default());
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let plan = installer.plan("stable").unwrap();

        assert_eq!(plan.cache_key, "mytool-1.4.2-stable-linux-x86_64-jammy-cache");
        assert_eq!(plan.target.asset_key(), "linux-x64");
        assert!(cache.restores.borrow().is_empty());
        assert!(downloader.urls.borrow().is_empty());
    }

    #[test]
    fn test_reinstall_with_local_cache_store_restores() {
        let (_dir, settings) = setup_tests();
        let metadata = FakeMetadata::new();
        let downloader = FakeDownloader::default();
        let cache = LocalCacheStore::new(&settings.cache_dir);
        let runner = FakeRunner::default();
        let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner)
            .with_host(linux());

        let first = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();
        std::fs::remove_dir_all(&first.install_path).unwrap();
        let second = installer.install(&SourceInputs::default(), &mut SearchPath::default()).unwrap();

        assert!(!first.restored_from_cache);
        assert!(second.restored_from_cache);
        assert_eq!(downloader.urls.borrow().len(), 1);
        assert_eq!(std::fs::read_to_string(second.install_path.join(TOOL)).unwrap(), SCRIPT);
    }
}
