//! One live connection: transport halves, reader thread and event router slot.

use std::collections::HashSet;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sockpuppet_proto::{EventFrame, FrameReader, Inbound};
use tracing::{debug, error, info, trace, warn};

use crate::channel::{PendingTable, RequestChannel};
use crate::transport::{Closer, TransportParts};

const READER_THREAD: &str = "sockpuppet-reader";
const ROUTER_THREAD: &str = "sockpuppet-events";
const JOIN_POLL: Duration = Duration::from_millis(5);

/// Work items for the event router.
pub(crate) enum Routed {
	Event(EventFrame),
	Dropped(String),
	Closed,
}

enum RouterSlot {
	/// Not started; the reader discards events until it is.
	Idle(mpsc::Receiver<Routed>),
	Running(JoinHandle<()>),
	Stopped,
}

pub(crate) struct Connection {
	peer: String,
	channel: RequestChannel,
	closer: Box<dyn Closer>,
	reader: Mutex<Option<JoinHandle<()>>>,
	router: Mutex<RouterSlot>,
	router_tx: mpsc::Sender<Routed>,
	/// Set once the router owns the receiver.
	routing: Arc<AtomicBool>,
	/// Event names the host is pushing to this connection.
	subscribed: Mutex<HashSet<String>>,
}

impl Connection {
	/// Takes ownership of the transport and starts the reader thread.
	pub(crate) fn open(parts: TransportParts, peer: String) -> io::Result<Arc<Self>> {
		let pending = Arc::new(PendingTable::new());
		let (router_tx, router_rx) = mpsc::channel();
		let routing = Arc::new(AtomicBool::new(false));

		let reader = thread::Builder::new().name(READER_THREAD.into()).spawn({
			let pending = Arc::clone(&pending);
			let router_tx = router_tx.clone();
			let reader = parts.reader;
			let routing = Arc::clone(&routing);
			let peer = peer.clone();
			move || read_loop(reader, &pending, &Router { tx: router_tx, routing }, &peer)
		})?;

		Ok(Arc::new(Self {
			peer,
			channel: RequestChannel::new(parts.writer, pending),
			closer: parts.closer,
			reader: Mutex::new(Some(reader)),
			router: Mutex::new(RouterSlot::Idle(router_rx)),
			router_tx,
			routing,
			subscribed: Mutex::new(HashSet::new()),
		}))
	}

	pub(crate) fn peer(&self) -> &str {
		&self.peer
	}

	pub(crate) fn channel(&self) -> &RequestChannel {
		&self.channel
	}

	/// False once the reader has seen EOF or the connection was shut down.
	pub(crate) fn is_alive(&self) -> bool {
		!self.channel.pending().is_closed()
	}

	/// Records that `events.subscribe` is being sent. False if it already was.
	pub(crate) fn mark_subscribed(&self, event: &str) -> bool {
		self.subscribed.lock().insert(event.to_owned())
	}

	/// Records that the host no longer pushes `event`. False if it never did.
	pub(crate) fn unmark_subscribed(&self, event: &str) -> bool {
		self.subscribed.lock().remove(event)
	}

	/// Starts the event router once; later calls are no-ops.
	pub(crate) fn start_router(&self, body: impl FnOnce(mpsc::Receiver<Routed>) + Send + 'static) {
		let mut slot = self.router.lock();
		let rx = match std::mem::replace(&mut *slot, RouterSlot::Stopped) {
			RouterSlot::Idle(rx) => rx,
			other => {
				*slot = other;
				return;
			}
		};
		self.routing.store(true, Ordering::Release);
		match thread::Builder::new().name(ROUTER_THREAD.into()).spawn(move || body(rx)) {
			Ok(handle) => {
				trace!(peer = %self.peer, "event router spawned");
				*slot = RouterSlot::Running(handle);
			}
			Err(e) => error!(peer = %self.peer, error = %e, "failed to spawn event router"),
		}
	}

	/// Closes the transport, fails in-flight requests and joins the background threads.
	///
	/// Joins are bounded by `timeout`; a thread that does not stop in time is detached.
	pub(crate) fn shutdown(&self, timeout: Duration) {
		if let Err(e) = self.closer.close() {
			debug!(peer = %self.peer, error = %e, "closing transport failed");
		}
		self.channel.pending().close("disconnected");
		let _ = self.router_tx.send(Routed::Closed);

		let reader = self.reader.lock().take();
		if let Some(reader) = reader {
			join_bounded(reader, timeout, READER_THREAD);
		}
		let router = std::mem::replace(&mut *self.router.lock(), RouterSlot::Stopped);
		if let RouterSlot::Running(router) = router {
			join_bounded(router, timeout, ROUTER_THREAD);
		}
	}
}

/// Reader side of the router queue.
struct Router {
	tx: mpsc::Sender<Routed>,
	routing: Arc<AtomicBool>,
}

impl Router {
	/// Queues an event or drop notice, discarding it while no router runs.
	fn route(&self, routed: Routed) {
		if self.routing.load(Ordering::Acquire) {
			let _ = self.tx.send(routed);
		} else if let Routed::Event(frame) = &routed {
			trace!(event = %frame.event, "no listeners yet, discarding event");
		}
	}
}

fn read_loop(reader: Box<dyn Read + Send>, pending: &PendingTable, router: &Router, peer: &str) {
	trace!(peer, "reader started");
	let mut frames = FrameReader::new(reader);
	let reason = loop {
		let line = match frames.next_line() {
			Ok(Some(line)) => line,
			Ok(None) => break "closed by host".to_owned(),
			Err(e) => break format!("read failed: {e}"),
		};
		match Inbound::decode(&line) {
			Ok(Inbound::Response(response)) => {
				let id = response.id;
				if !pending.resolve(response) {
					debug!(id = %id, "dropping response without a waiter");
				}
			}
			Ok(Inbound::Event(frame)) => {
				router.route(Routed::Event(frame));
			}
			Err(e) => {
				warn!(error = %e, len = line.len(), "dropping malformed frame");
				router.route(Routed::Dropped(e.to_string()));
			}
		}
	};

	if pending.is_closed() {
		trace!(peer, "reader stopped after shutdown");
	} else {
		info!(peer, reason = %reason, "connection to editor host ended");
	}
	pending.close(&reason);
	let _ = router.tx.send(Routed::Closed);
}

fn join_bounded(handle: JoinHandle<()>, timeout: Duration, name: &str) {
	if handle.thread().id() == thread::current().id() {
		return;
	}
	let deadline = Instant::now() + timeout;
	while !handle.is_finished() {
		if Instant::now() >= deadline {
			warn!(thread = name, "background thread did not stop in time, detaching");
			return;
		}
		thread::sleep(JOIN_POLL);
	}
	if handle.join().is_err() {
		warn!(thread = name, "background thread panicked");
	}
}
