//! Request/response correlation over the shared connection.
//!
//! Callers never read from the transport. Each request registers a waiter
//! keyed by its id before the frame is written; the reader thread resolves
//! the waiter when the matching response arrives. Event frames interleaved
//! with responses therefore cannot be mistaken for answers, and concurrent
//! callers on different threads each receive their own response.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use sockpuppet_proto::{CounterIdGen, Request, RequestId, Response, encode_frame};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::{Error, Result};

type Outcome = Result<Value>;

/// Where a response is delivered.
enum Waiter {
	Blocking(mpsc::SyncSender<Outcome>),
	Async(oneshot::Sender<Outcome>),
}

impl Waiter {
	fn complete(self, outcome: Outcome) {
		match self {
			Self::Blocking(tx) => {
				let _ = tx.try_send(outcome);
			}
			Self::Async(tx) => {
				let _ = tx.send(outcome);
			}
		}
	}
}

#[derive(Default)]
struct PendingState {
	waiters: HashMap<RequestId, Waiter>,
	/// Set once the connection is gone; new registrations fail with this reason.
	closed: Option<String>,
}

/// In-flight requests of one connection.
#[derive(Default)]
pub(crate) struct PendingTable {
	state: Mutex<PendingState>,
}

impl PendingTable {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	fn insert(&self, id: RequestId, waiter: Waiter) -> Result<()> {
		let mut state = self.state.lock();
		if let Some(reason) = &state.closed {
			return Err(Error::ConnectionLost(reason.clone()));
		}
		state.waiters.insert(id, waiter);
		Ok(())
	}

	/// Hands a response to its waiter. Returns false for unknown or abandoned ids.
	pub(crate) fn resolve(&self, response: Response) -> bool {
		let waiter = self.state.lock().waiters.remove(&response.id);
		match waiter {
			Some(waiter) => {
				waiter.complete(response.outcome.map_err(Error::Host));
				true
			}
			None => false,
		}
	}

	fn cancel(&self, id: RequestId) {
		self.state.lock().waiters.remove(&id);
	}

	/// Fails every outstanding request and rejects new ones.
	pub(crate) fn close(&self, reason: &str) {
		let drained: Vec<Waiter> = {
			let mut state = self.state.lock();
			if state.closed.is_none() {
				state.closed = Some(reason.to_owned());
			}
			state.waiters.drain().map(|(_, waiter)| waiter).collect()
		};
		if !drained.is_empty() {
			debug!(count = drained.len(), reason, "failing in-flight requests");
		}
		for waiter in drained {
			waiter.complete(Err(Error::ConnectionLost(reason.to_owned())));
		}
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.state.lock().closed.is_some()
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.state.lock().waiters.len()
	}
}

struct Outbound {
	writer: Box<dyn Write + Send>,
	ids: CounterIdGen,
}

/// Sends numbered requests and waits for their correlated responses.
pub(crate) struct RequestChannel {
	/// Id allocation and the frame write happen under this one lock.
	outbound: Mutex<Outbound>,
	pending: Arc<PendingTable>,
}

impl RequestChannel {
	pub(crate) fn new(writer: Box<dyn Write + Send>, pending: Arc<PendingTable>) -> Self {
		Self {
			outbound: Mutex::new(Outbound {
				writer,
				ids: CounterIdGen::new(),
			}),
			pending,
		}
	}

	pub(crate) fn pending(&self) -> &Arc<PendingTable> {
		&self.pending
	}

	fn send(&self, method: &str, params: Value, waiter: Waiter) -> Result<RequestId> {
		let mut outbound = self.outbound.lock();
		let id = outbound.ids.next();
		let frame = encode_frame(&Request::new(id, method, params)).map_err(Error::Serialize)?;
		self.pending.insert(id, waiter)?;

		let written = outbound.writer.write_all(&frame).and_then(|()| outbound.writer.flush());
		if let Err(e) = written {
			self.pending.cancel(id);
			return Err(Error::ConnectionLost(format!("write failed: {e}")));
		}
		trace!(id = %id, method, "request sent");
		Ok(id)
	}

	/// Sends a request and blocks the calling thread until its response arrives.
	pub(crate) fn call(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
		let (tx, rx) = mpsc::sync_channel(1);
		let id = self.send(method, params, Waiter::Blocking(tx))?;

		let Some(timeout) = timeout else {
			return rx.recv().unwrap_or_else(|_| Err(Error::ConnectionLost("response waiter dropped".into())));
		};
		match rx.recv_timeout(timeout) {
			Ok(outcome) => outcome,
			Err(RecvTimeoutError::Timeout) => {
				self.pending.cancel(id);
				// The response may have landed between the timeout and the cancel.
				rx.try_recv().unwrap_or_else(|_| {
					debug!(id = %id, method, "request timed out");
					Err(Error::RequestTimeout { method: method.to_owned() })
				})
			}
			Err(RecvTimeoutError::Disconnected) => Err(Error::ConnectionLost("response waiter dropped".into())),
		}
	}

	/// Sends a request and awaits its response without blocking the executor.
	pub(crate) async fn call_async(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
		let (tx, rx) = oneshot::channel();
		let id = self.send(method, params, Waiter::Async(tx))?;

		let received = match timeout {
			Some(timeout) => match tokio::time::timeout(timeout, rx).await {
				Ok(received) => received,
				Err(_) => {
					self.pending.cancel(id);
					return Err(Error::RequestTimeout { method: method.to_owned() });
				}
			},
			None => rx.await,
		};
		received.unwrap_or_else(|_| Err(Error::ConnectionLost("response waiter dropped".into())))
	}
}
