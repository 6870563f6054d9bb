//! Resolution of the host pipe address.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the default pipe address.
pub const PIPE_ENV_VAR: &str = "VSCODE_SOCKPUPPET_PIPE";

/// Base name of the pipe the host listens on.
pub const PIPE_NAME: &str = "vscode-sockpuppet";

/// Platform default pipe address.
///
/// `\\.\pipe\vscode-sockpuppet` on Windows, `<temp dir>/vscode-sockpuppet.sock`
/// everywhere else.
#[must_use]
pub fn default_pipe_path() -> PathBuf {
	#[cfg(windows)]
	{
		PathBuf::from(format!(r"\\.\pipe\{PIPE_NAME}"))
	}
	#[cfg(not(windows))]
	{
		std::env::temp_dir().join(format!("{PIPE_NAME}.sock"))
	}
}

/// Resolves the pipe address against the process environment.
///
/// # Resolution Order
///
/// 1. `explicit`, when given.
/// 2. `VSCODE_SOCKPUPPET_PIPE`, when set and non-empty.
/// 3. [`default_pipe_path`].
#[must_use]
pub fn resolve_pipe_path(explicit: Option<&Path>) -> PathBuf {
	resolve_pipe_path_with(explicit, |key| std::env::var_os(key))
}

/// Same as [`resolve_pipe_path`] with an injectable environment lookup.
pub fn resolve_pipe_path_with(explicit: Option<&Path>, env: impl FnOnce(&str) -> Option<OsString>) -> PathBuf {
	if let Some(path) = explicit {
		return path.to_path_buf();
	}
	if let Some(path) = env(PIPE_ENV_VAR).filter(|p| !p.is_empty()) {
		return PathBuf::from(path);
	}
	default_pipe_path()
}
