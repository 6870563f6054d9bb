//! Raw duplex byte channels to the editor host.
//!
//! A [`Transport`] is split once at connect time into a read half owned by
//! the reader thread, a write half owned by the request channel, and a
//! [`Closer`] used by `disconnect` to unblock the reader.

use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::config::ClientConfig;

/// Closes the underlying channel so blocked reads return.
pub trait Closer: Send + Sync {
	/// Shuts the channel down in both directions.
	fn close(&self) -> io::Result<()>;
}

/// The halves of a connected transport.
pub struct TransportParts {
	/// Inbound bytes.
	pub reader: Box<dyn Read + Send>,
	/// Outbound bytes.
	pub writer: Box<dyn Write + Send>,
	/// Shutdown handle.
	pub closer: Box<dyn Closer>,
}

/// A connected duplex byte stream.
pub trait Transport: Send + 'static {
	/// Description of the peer for logs.
	fn peer(&self) -> String;

	/// Splits the stream into independently owned halves.
	fn into_parts(self) -> io::Result<TransportParts>;
}

#[cfg(unix)]
impl Closer for UnixStream {
	fn close(&self) -> io::Result<()> {
		match self.shutdown(std::net::Shutdown::Both) {
			Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
			other => other,
		}
	}
}

#[cfg(unix)]
impl Transport for UnixStream {
	fn peer(&self) -> String {
		match self.peer_addr().ok().and_then(|addr| addr.as_pathname().map(|p| p.display().to_string())) {
			Some(path) => path,
			None => "unnamed unix socket".to_owned(),
		}
	}

	fn into_parts(self) -> io::Result<TransportParts> {
		let reader = self.try_clone()?;
		let closer = self.try_clone()?;
		Ok(TransportParts {
			reader: Box::new(reader),
			writer: Box::new(self),
			closer: Box::new(closer),
		})
	}
}

impl Closer for TcpStream {
	fn close(&self) -> io::Result<()> {
		match self.shutdown(std::net::Shutdown::Both) {
			Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
			other => other,
		}
	}
}

impl Transport for TcpStream {
	fn peer(&self) -> String {
		self.peer_addr().map_or_else(|_| "tcp".to_owned(), |addr| addr.to_string())
	}

	fn into_parts(self) -> io::Result<TransportParts> {
		self.set_nodelay(true)?;
		let reader = self.try_clone()?;
		let closer = self.try_clone()?;
		Ok(TransportParts {
			reader: Box::new(reader),
			writer: Box::new(self),
			closer: Box::new(closer),
		})
	}
}

/// Opens the host pipe at `path`.
#[cfg(unix)]
pub fn connect(path: &Path, _config: &ClientConfig) -> io::Result<TransportParts> {
	UnixStream::connect(path)?.into_parts()
}

/// Opens the host pipe at `path`, retrying while every pipe instance is busy.
#[cfg(windows)]
pub fn connect(path: &Path, config: &ClientConfig) -> io::Result<TransportParts> {
	windows::NamedPipe::open(path, config)?.into_parts()
}

#[cfg(windows)]
mod windows {
	use std::fs::{File, OpenOptions};
	use std::io;
	use std::path::{Path, PathBuf};

	use parking_lot::Mutex;
	use tracing::debug;

	use super::{Closer, Transport, TransportParts};
	use crate::config::ClientConfig;

	const ERROR_PIPE_BUSY: i32 = 231;

	/// Client end of a Windows named pipe opened as a file.
	pub(super) struct NamedPipe {
		file: File,
		path: PathBuf,
	}

	impl NamedPipe {
		pub(super) fn open(path: &Path, config: &ClientConfig) -> io::Result<Self> {
			let mut attempt = 1;
			loop {
				match OpenOptions::new().read(true).write(true).open(path) {
					Ok(file) => {
						return Ok(Self {
							file,
							path: path.to_path_buf(),
						});
					}
					Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) && attempt < config.connect_attempts => {
						debug!(path = %path.display(), attempt, "pipe busy, retrying");
						attempt += 1;
						std::thread::sleep(config.connect_retry_delay);
					}
					Err(e) => return Err(e),
				}
			}
		}
	}

	/// Drops its handle on close. A read blocked on another handle returns once the host closes its end.
	struct PipeCloser(Mutex<Option<File>>);

	impl Closer for PipeCloser {
		fn close(&self) -> io::Result<()> {
			self.0.lock().take();
			Ok(())
		}
	}

	impl Transport for NamedPipe {
		fn peer(&self) -> String {
			self.path.display().to_string()
		}

		fn into_parts(self) -> io::Result<TransportParts> {
			let reader = self.file.try_clone()?;
			let closer = self.file.try_clone()?;
			Ok(TransportParts {
				reader: Box::new(reader),
				writer: Box::new(self.file),
				closer: Box::new(PipeCloser(Mutex::new(Some(closer)))),
			})
		}
	}
}
