use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use reqwest::blocking::Client;
use tracing::debug;
use crate::error::{Error, Result};
use crate::registry::local_path;
use crate::search_path::SearchPath;

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("toolsetup/", env!("CARGO_PKG_VERSION"));

/// Builds the blocking HTTP client shared by metadata fetch and downloads.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Config(format!("Could not create HTTP client: {e}")))
}

/// One-shot fetch of a URL into a directory.
pub trait Downloader {
    /// Downloads `url` into `dest_dir`, keeping the URL's file name, and
    /// returns the path of the written file.
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Downloads over HTTP(S), or copies for `file://` URLs and plain paths.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let file_name = file_name_from_url(url)?;
        let dest = dest_dir.join(file_name);
        debug!(%url, dest = %dest.display(), "Downloading");
        if let Some(src) = local_path(url) {
            std::fs::copy(&src, &dest).map_err(|e| Error::download(url, e))?;
            return Ok(dest);
        }
        let mut response = self.client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::download(url, e))?;
        let mut file = std::fs::File::create(&dest)?;
        response.copy_to(&mut file).map_err(|e| Error::download(url, e))?;
        Ok(dest)
    }
}

/// Runs external programs and captures their standard output.
pub trait CommandRunner {
    /// Runs `program` with `args`. When `search_path` is given it becomes the
    /// child's `PATH`.
    fn run(&self, program: &OsStr, args: &[String], search_path: Option<&SearchPath>) -> Result<String>;
}

/// Spawns real processes with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &OsStr, args: &[String], search_path: Option<&SearchPath>) -> Result<String> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(search_path) = search_path {
            command.env("PATH", search_path.to_os_string()?);
        }
        let output = command.output().map_err(|e| Error::invocation(program, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::invocation(
                program,
                format!("{} {}", output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// The last path segment of a URL, ignoring any query or fragment.
pub fn file_name_from_url(url: &str) -> Result<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::download(url, "Could not determine file name"))
}

/// Sets mode 0755 on `path`.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Windows has no permission bits to set; executability follows the extension.
#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Checks if a given path has a Windows executable extension (.exe, .bat, .cmd).
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        matches!(ext.as_str(), "exe" | "bat" | "cmd")
    } else {
        false
    }
}
