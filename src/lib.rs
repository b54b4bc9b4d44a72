//! # toolsetup core library
//!
//! Resolves a release of an external binary tool from a JSON metadata
//! document, installs it under a per-version directory (restoring it from a
//! keyed cache when possible) and optionally runs it. Built for the
//! `toolsetup` CLI, which runs once per CI job.
//!
//! ## Modules Overview
//! - [`registry`] – Fetching release metadata and selecting a release
//! - [`platform`] – Mapping the host OS/architecture onto release assets
//! - [`key`] – Cache key derivation
//! - [`installer`] – The cache-aware install pipeline and tool invocation
//! - [`global`] – The local cache store and default directories
//! - [`search_path`] – The search path handed to child processes
//! - [`config`] – Settings and per-run inputs
//! - [`util`] – Download transport, command execution, permissions
//! - [`error`] – The shared error type

pub mod config;
pub mod error;
pub mod global;
pub mod installer;
pub mod key;
pub mod platform;
pub mod registry;
pub mod search_path;
pub mod util;

pub use config::*;
pub use error::{Error, Result};
pub use global::cache::*;
pub use installer::*;
pub use key::*;
pub use platform::*;
pub use registry::*;
pub use search_path::*;
pub use util::*;
