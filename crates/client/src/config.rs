//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use sockpuppet_proto::paths;

/// Default bound on joining background threads during disconnect.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Explicit pipe address. `None` defers to the environment and platform default.
	pub pipe_path: Option<PathBuf>,
	/// Upper bound on waiting for a response. `None` waits indefinitely.
	pub request_timeout: Option<Duration>,
	/// Upper bound on joining the reader and router threads on disconnect.
	pub shutdown_timeout: Duration,
	/// Attempts made while the Windows pipe reports busy.
	pub connect_attempts: u32,
	/// Delay between busy-pipe attempts.
	pub connect_retry_delay: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			pipe_path: None,
			request_timeout: None,
			shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
			connect_attempts: 50,
			connect_retry_delay: Duration::from_millis(100),
		}
	}
}

impl ClientConfig {
	/// Create a configuration with defaults.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set an explicit pipe address.
	pub fn pipe_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.pipe_path = Some(path.into());
		self
	}

	/// Set the request timeout.
	pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Set the shutdown join bound.
	pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
		self.shutdown_timeout = timeout;
		self
	}

	/// Set the busy-pipe retry policy.
	pub fn connect_retry(mut self, attempts: u32, delay: Duration) -> Self {
		self.connect_attempts = attempts.max(1);
		self.connect_retry_delay = delay;
		self
	}

	/// Resolves the address to connect to: explicit, then `VSCODE_SOCKPUPPET_PIPE`, then the platform default.
	pub fn resolve_pipe_path(&self) -> PathBuf {
		paths::resolve_pipe_path(self.pipe_path.as_deref())
	}
}
