use std::io;
use std::path::PathBuf;

use sockpuppet_proto::HostError;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// No connection is open.
	#[error("not connected to the editor host")]
	NotConnected,
	/// Opening the pipe failed.
	#[error("failed to connect to {}: {source}", .path.display())]
	Connect {
		/// Address that was tried.
		path: PathBuf,
		/// Underlying OS error.
		#[source]
		source: io::Error,
	},
	/// The connection went away while a request was outstanding.
	#[error("connection to the editor host lost: {0}")]
	ConnectionLost(String),
	/// The host answered the request with an error.
	#[error("host error: {0}")]
	Host(#[from] HostError),
	/// No response arrived within the configured timeout.
	#[error("request `{method}` timed out")]
	RequestTimeout {
		/// Method of the abandoned request.
		method: String,
	},
	/// Request parameters could not be encoded.
	#[error("serialization failed: {0}")]
	Serialize(#[source] serde_json::Error),
	/// A result or payload did not have the expected shape.
	#[error("deserialization failed: {0}")]
	Deserialize(#[source] serde_json::Error),
	/// Input/output errors from the underlying channel.
	#[error("{0}")]
	Io(#[from] io::Error),
	/// The proxy object has been disposed.
	#[error("{kind} `{id}` has been disposed")]
	Disposed {
		/// Proxy kind, e.g. `webview panel`.
		kind: &'static str,
		/// Proxy id.
		id: String,
	},
	/// The watcher was created with this event kind ignored.
	#[error("`{event}` events are ignored by this watcher")]
	EventIgnored {
		/// Event name that was requested.
		event: String,
	},
}

impl Error {
	/// Returns true when the editor host is unreachable rather than refusing the operation.
	pub fn is_connection_error(&self) -> bool {
		matches!(self, Self::NotConnected | Self::Connect { .. } | Self::ConnectionLost(_) | Self::Io(_))
	}

	/// Returns true when the host rejected the request.
	pub fn is_host_error(&self) -> bool {
		matches!(self, Self::Host(_))
	}

	/// Message reported by the host, for [`Error::Host`].
	pub fn host_message(&self) -> Option<&str> {
		match self {
			Self::Host(err) => Some(&err.message),
			_ => None,
		}
	}
}
