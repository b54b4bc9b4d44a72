use std::ffi::OsStr;
use tracing::debug;
use crate::error::{Error, Result};
use crate::util::CommandRunner;

/// Builds the cache key for an install.
///
/// `"{tool}-{marker}-{os}-{arch}"`, followed by `"-{codename}"` when a
/// distribution codename is given, and always ending in `"-cache"`.
pub fn derive_key(
    tool_name: &str,
    version_marker: &str,
    os: &str,
    arch: &str,
    codename: Option<&str>,
) -> String {
    let mut key = format!("{tool_name}-{version_marker}-{os}-{arch}");
    if let Some(codename) = codename {
        key.push('-');
        key.push_str(codename);
    }
    key.push_str("-cache");
    key
}

/// Asks the host for its distribution codename, e.g. `jammy`.
///
/// `command` is the program followed by its arguments.
///
/// # Errors
///
/// Returns [`Error::CodenameQuery`] if the command is empty, fails, or prints nothing.
pub fn query_codename(runner: &dyn CommandRunner, command: &[String]) -> Result<String> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::CodenameQuery("no codename command configured".to_string()))?;
    let output = runner
        .run(OsStr::new(program), args, None)
        .map_err(|e| Error::CodenameQuery(e.to_string()))?;
    let codename = output.trim();
    if codename.is_empty() {
        return Err(Error::CodenameQuery(format!("'{program}' printed nothing")));
    }
    debug!(%codename, "Detected distribution codename");
    Ok(codename.to_string())
}
