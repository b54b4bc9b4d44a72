use std::path::PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use toolsetup::{parse_flag, DEFAULT_SPECIFIER};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: Option<SetupCommand>,

    #[command(flatten)]
    pub(crate) source: SourceArgs,

    #[command(flatten)]
    pub(crate) settings: SettingsArgs,

    /// Log level, unless `RUST_LOG` is set
    #[clap(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub(crate) log_level: LogLevel,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum SetupCommand {
    /// Resolves, installs and optionally runs the tool. This is the default
    Install,
    /// Prints the release the version resolves to, without installing it
    Resolve,
    /// Prints the cache key an install would use
    CacheKey,
    /// Removes every entry from the local cache store
    CleanCache,
}

/// Per-run inputs, readable from the `INPUT_*` variables a CI runner sets.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Build identifier (e.g. 1.4.2) or channel name (e.g. stable)
    #[clap(long = "tool-version", global = true, env = "INPUT_VERSION", default_value = DEFAULT_SPECIFIER)]
    pub(crate) tool_version: String,

    /// Run the tool after installing it (true/yes/1/on)
    #[clap(long, global = true, env = "INPUT_EXECUTE", default_value = "false",
        action = clap::ArgAction::Set, value_parser = parse_execute)]
    pub(crate) execute: bool,

    /// Whitespace separated arguments passed to the tool when it is run
    #[clap(long, global = true, env = "INPUT_ARGS", default_value = "")]
    pub(crate) args: String,
}

#[derive(Debug, Args, Clone)]
pub struct SettingsArgs {
    /// Settings file (TOML). Defaults to the user config directory
    #[clap(long, global = true, env = "TOOLSETUP_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Name the tool is installed and invoked under
    #[clap(long, global = true, env = "INPUT_TOOL_NAME")]
    pub(crate) tool_name: Option<String>,

    /// URL of the release metadata document
    #[clap(long, global = true, env = "INPUT_METADATA_URL")]
    pub(crate) metadata_url: Option<String>,

    /// Directory of the local cache store
    #[clap(long, global = true, env = "INPUT_CACHE_DIR")]
    pub(crate) cache_dir: Option<PathBuf>,

    /// Root for installs and temporary downloads
    #[clap(long, global = true, env = "RUNNER_TEMP")]
    pub(crate) temp_root: Option<PathBuf>,

    /// File the install path is appended to
    #[clap(long, global = true, env = "GITHUB_PATH")]
    pub(crate) path_file: Option<PathBuf>,

    /// File step outputs are appended to
    #[clap(long, global = true, env = "GITHUB_OUTPUT")]
    pub(crate) output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn parse_execute(value: &str) -> Result<bool, String> {
    Ok(parse_flag(value))
}
