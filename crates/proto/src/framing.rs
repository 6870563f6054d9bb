//! Newline framing over a byte stream.

use std::io::{self, Read};

use serde::Serialize;

/// Bytes requested from the transport per read.
pub const READ_CHUNK: usize = 4096;

/// Serializes `value` as one frame, including the trailing newline.
///
/// `serde_json` escapes control characters inside strings, so the only raw
/// `\n` in the output is the terminator.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
	let mut buf = serde_json::to_vec(value)?;
	buf.push(b'\n');
	Ok(buf)
}

/// Rolling receive buffer that yields complete lines.
///
/// Works on bytes rather than text so a multi-byte character split across two
/// reads is reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineFramer {
	buf: Vec<u8>,
	/// Prefix of `buf` already known to contain no newline.
	scanned: usize,
}

impl LineFramer {
	/// Creates an empty framer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends freshly read bytes.
	pub fn push(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}

	/// Pops the next complete line, without its `\n` (or `\r\n`).
	///
	/// Whitespace-only lines are skipped.
	pub fn next_line(&mut self) -> Option<Vec<u8>> {
		loop {
			let Some(offset) = memchr::memchr(b'\n', &self.buf[self.scanned..]) else {
				self.scanned = self.buf.len();
				return None;
			};
			let end = self.scanned + offset;
			let mut line: Vec<u8> = self.buf.drain(..=end).collect();
			self.scanned = 0;

			line.pop();
			if line.last() == Some(&b'\r') {
				line.pop();
			}
			if line.iter().all(u8::is_ascii_whitespace) {
				continue;
			}
			return Some(line);
		}
	}

	/// Number of buffered bytes not yet returned as a line.
	pub fn buffered(&self) -> usize {
		self.buf.len()
	}
}

/// Blocking line reader over any [`Read`] half.
pub struct FrameReader<R> {
	inner: R,
	framer: LineFramer,
	chunk: Box<[u8]>,
}

impl<R: Read> FrameReader<R> {
	/// Wraps a reader.
	pub fn new(inner: R) -> Self {
		Self {
			inner,
			framer: LineFramer::new(),
			chunk: vec![0; READ_CHUNK].into_boxed_slice(),
		}
	}

	/// Blocks until a complete line is available.
	///
	/// Returns `Ok(None)` once the peer closes the stream. A trailing partial
	/// line at that point is discarded.
	pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
		loop {
			if let Some(line) = self.framer.next_line() {
				return Ok(Some(line));
			}
			let n = match self.inner.read(&mut self.chunk) {
				Ok(0) => return Ok(None),
				Ok(n) => n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			};
			self.framer.push(&self.chunk[..n]);
		}
	}

	/// Bytes received after the last complete line.
	pub fn pending_bytes(&self) -> usize {
		self.framer.buffered()
	}
}
