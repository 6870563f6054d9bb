//! The [`Client`] handle: connection lifecycle, calls and event subscriptions.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak, mpsc};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sockpuppet_proto::EventFrame;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, Routed};
use crate::emitter::{EventEmitter, Handler};
use crate::events::{self, HostEvent};
use crate::fanout::{FanoutRegistry, FanoutTarget};
use crate::session::SessionEvent;
use crate::subscriptions::SubscriptionManager;
use crate::transport::{self, Transport, TransportParts};
use crate::window::Window;
use crate::workspace::Workspace;
use crate::{Disposable, Error, Result};

/// Handle to one editor host connection.
///
/// Cheap to clone; clones share the connection, the subscription table and
/// the proxy registries. Dropping the last handle disconnects.
///
/// ```no_run
/// use sockpuppet_client::{Client, ClientConfig};
///
/// # fn main() -> sockpuppet_client::Result<()> {
/// let client = Client::connect_with(ClientConfig::new())?;
/// client.window().show_information_message("Hello from Rust", &[])?;
/// let _saves = client.add_event_listener("workspace.onDidSaveTextDocument", |data| {
/// 	println!("saved: {data}");
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
	this: Weak<ClientInner>,
	config: ClientConfig,
	pipe_path: PathBuf,
	connection: RwLock<Option<Arc<Connection>>>,
	/// Serializes connect and disconnect.
	lifecycle: Mutex<()>,
	subscriptions: SubscriptionManager,
	fanout: FanoutRegistry,
	session: Arc<EventEmitter<SessionEvent>>,
}

impl Client {
	/// Creates an unconnected client.
	pub fn new(config: ClientConfig) -> Self {
		let pipe_path = config.resolve_pipe_path();
		let inner = Arc::new_cyclic(|this| ClientInner {
			this: this.clone(),
			config,
			pipe_path,
			connection: RwLock::new(None),
			lifecycle: Mutex::new(()),
			subscriptions: SubscriptionManager::new(),
			fanout: FanoutRegistry::new(),
			session: Arc::new(EventEmitter::new("session")),
		});
		Self { inner }
	}

	/// Creates a client and connects it.
	pub fn connect_with(config: ClientConfig) -> Result<Self> {
		let client = Self::new(config);
		client.connect()?;
		Ok(client)
	}

	/// Opens the pipe. A no-op while a live connection exists.
	///
	/// Event names that still have local listeners are subscribed again on the
	/// new connection.
	pub fn connect(&self) -> Result<()> {
		let _lifecycle = self.inner.lifecycle.lock();
		if self.inner.live_connection().is_some() {
			return Ok(());
		}
		let path = &self.inner.pipe_path;
		let parts = transport::connect(path, &self.inner.config).map_err(|source| Error::Connect {
			path: path.clone(),
			source,
		})?;
		self.inner.install(parts, path.display().to_string())
	}

	/// Adopts an already connected transport, replacing any current connection.
	pub fn connect_transport(&self, transport: impl Transport) -> Result<()> {
		let _lifecycle = self.inner.lifecycle.lock();
		let peer = transport.peer();
		let parts = transport.into_parts()?;
		self.inner.install(parts, peer)
	}

	/// Closes the connection and fails in-flight calls. Local listeners are kept.
	pub fn disconnect(&self) {
		let _lifecycle = self.inner.lifecycle.lock();
		self.inner.teardown();
	}

	/// Returns true while the connection is open and the host has not hung up.
	pub fn is_connected(&self) -> bool {
		self.inner.live_connection().is_some()
	}

	/// Address this client connects to.
	pub fn pipe_path(&self) -> &Path {
		&self.inner.pipe_path
	}

	/// Configuration the client was created with.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Sends a request and blocks until its response arrives.
	///
	/// Waits at most the configured request timeout, if any.
	pub fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.inner.call(method, params, self.inner.config.request_timeout)
	}

	/// Like [`Client::call`] with an explicit timeout.
	pub fn call_timeout(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
		self.inner.call(method, params, Some(timeout))
	}

	/// Sends a request and awaits its response without blocking the executor.
	pub async fn call_async(&self, method: &str, params: Value) -> Result<Value> {
		let connection = self.inner.connection()?;
		connection.channel().call_async(method, params, self.inner.config.request_timeout).await
	}

	/// Sends a request with serializable params and decodes the result.
	pub fn request<R: DeserializeOwned>(&self, method: &str, params: impl Serialize) -> Result<R> {
		let params = serde_json::to_value(params).map_err(Error::Serialize)?;
		let result = self.call(method, params)?;
		serde_json::from_value(result).map_err(Error::Deserialize)
	}

	/// Registers a raw handler for `event`.
	///
	/// The first local handler for a name sends `events.subscribe` before this
	/// returns; disposing the last sends `events.unsubscribe`. While
	/// disconnected the subscribe is deferred to the next connect.
	pub fn add_event_listener(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> Disposable {
		self.inner.listen(event, Arc::new(handler))
	}

	/// Registers a typed handler. Payloads that do not decode are logged and skipped.
	pub fn on<E: HostEvent>(&self, handler: impl Fn(E::Payload) + Send + Sync + 'static) -> Disposable {
		self.add_event_listener(E::NAME, move |data| match events::decode::<E>(data) {
			Ok(payload) => handler(payload),
			Err(e) => warn!(event = E::NAME, error = %e, "undecodable event payload"),
		})
	}

	/// Removes every local handler for `event`. Returns how many were removed.
	pub fn remove_all_listeners(&self, event: &str) -> usize {
		self.inner.subscriptions.remove_all(event)
	}

	/// Returns true if `event` has at least one local handler.
	pub fn has_listeners(&self, event: &str) -> bool {
		self.inner.subscriptions.has_listeners(event)
	}

	/// Event names with local handlers, sorted.
	pub fn local_subscriptions(&self) -> Vec<String> {
		self.inner.subscriptions.active_events()
	}

	/// Event names the host is pushing to this connection (`events.listSubscriptions`).
	pub fn subscriptions(&self) -> Result<Vec<String>> {
		self.request("events.listSubscriptions", json!({}))
	}

	/// Observes lifecycle notifications of this client.
	pub fn add_session_listener(&self, handler: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Disposable {
		self.inner.session.event(handler)
	}

	/// Runs an editor command with positional arguments.
	pub fn execute_command(&self, command: &str, args: Vec<Value>) -> Result<Value> {
		self.call("commands.executeCommand", json!({ "command": command, "args": args }))
	}

	/// Lists editor command identifiers.
	pub fn get_commands(&self, filter_internal: bool) -> Result<Vec<String>> {
		self.request("commands.getCommands", json!({ "filterInternal": filter_internal }))
	}

	/// Window namespace.
	pub fn window(&self) -> Window {
		Window::new(self.clone())
	}

	/// Workspace namespace.
	pub fn workspace(&self) -> Workspace {
		Workspace::new(self.clone())
	}

	/// Adds a proxy to the fanout table of `kind`, installing the shared listener on first use.
	pub(crate) fn fanout_join(&self, kind: &'static str, id: &str, target: Weak<dyn FanoutTarget>) {
		let inner = &self.inner;
		inner.fanout.join(kind, id, target, || {
			let weak = inner.this.clone();
			inner.listen(
				kind,
				Arc::new(move |payload: &Value| {
					if let Some(inner) = weak.upgrade() {
						inner.fanout.dispatch(kind, payload);
					}
				}),
			)
		});
	}

	pub(crate) fn fanout_leave(&self, kind: &str, id: &str) {
		self.inner.fanout.leave(kind, id);
	}

	#[cfg(test)]
	pub(crate) fn fanout_members(&self, kind: &str) -> usize {
		self.inner.fanout.member_count(kind)
	}
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("pipe_path", &self.inner.pipe_path)
			.field("connected", &self.is_connected())
			.finish_non_exhaustive()
	}
}

impl ClientInner {
	fn live_connection(&self) -> Option<Arc<Connection>> {
		self.connection.read().as_ref().filter(|c| c.is_alive()).cloned()
	}

	fn connection(&self) -> Result<Arc<Connection>> {
		self.connection.read().clone().ok_or(Error::NotConnected)
	}

	fn call(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
		self.connection()?.channel().call(method, params, timeout)
	}

	fn install(&self, parts: TransportParts, peer: String) -> Result<()> {
		let connection = Connection::open(parts, peer)?;
		let previous = self.connection.write().replace(Arc::clone(&connection));
		if let Some(previous) = previous {
			debug!(peer = previous.peer(), "replacing previous connection");
			previous.shutdown(self.config.shutdown_timeout);
		}
		info!(peer = connection.peer(), "connected to editor host");

		let events = self.subscriptions.active_events();
		if !events.is_empty() {
			self.ensure_router(&connection);
		}
		for event in events {
			let Some(emitter) = self.subscriptions.emitter(&event) else { continue };
			emitter.with_settled(|listeners| {
				if listeners > 0 {
					self.subscribe_remote(&event);
				}
			});
		}
		Ok(())
	}

	fn teardown(&self) {
		let Some(connection) = self.connection.write().take() else { return };
		info!(peer = connection.peer(), "disconnecting from editor host");
		connection.shutdown(self.config.shutdown_timeout);
	}

	fn ensure_router(&self, connection: &Connection) {
		let weak = self.this.clone();
		connection.start_router(move |rx| run_router(&weak, rx));
	}

	fn listen(&self, event: &str, handler: Handler<Value>) -> Disposable {
		let registration = self.subscriptions.add(event, handler, || self.make_emitter(event));
		if let Some(connection) = self.live_connection() {
			self.ensure_router(&connection);
			// The first listener subscribed through the hook; later ones retry a refused subscribe.
			registration.emitter.with_settled(|listeners| {
				if listeners > 1 {
					self.subscribe_remote(event);
				}
			});
		}
		let weak = self.this.clone();
		let event = event.to_owned();
		Disposable::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.subscriptions.remove(&event, &registration);
			}
		})
	}

	fn make_emitter(&self, event: &str) -> EventEmitter<Value> {
		let (on_add, on_empty) = (self.this.clone(), self.this.clone());
		let (first, last) = (event.to_owned(), event.to_owned());
		EventEmitter::new(event)
			.on_first_add(move || {
				if let Some(inner) = on_add.upgrade() {
					inner.subscribe_remote(&first);
				}
			})
			.on_no_listeners(move || {
				if let Some(inner) = on_empty.upgrade() {
					inner.unsubscribe_remote(&last);
				}
			})
	}

	fn subscribe_remote(&self, event: &str) {
		let Some(connection) = self.live_connection() else {
			debug!(event, "not connected, deferring subscribe");
			return;
		};
		self.ensure_router(&connection);
		if !connection.mark_subscribed(event) {
			return;
		}
		match connection.channel().call("events.subscribe", json!({ "event": event }), self.config.request_timeout) {
			Ok(_) => {
				debug!(event, "subscribed");
				self.emit(SessionEvent::SubscriptionAck { event: event.to_owned() });
			}
			Err(e) => {
				connection.unmark_subscribed(event);
				warn!(event, error = %e, "subscribe failed");
				self.emit(SessionEvent::HookFailed {
					event: event.to_owned(),
					error: e.to_string(),
				});
			}
		}
	}

	fn unsubscribe_remote(&self, event: &str) {
		let Some(connection) = self.live_connection() else { return };
		if !connection.unmark_subscribed(event) {
			return;
		}
		match connection.channel().call("events.unsubscribe", json!({ "event": event }), self.config.request_timeout) {
			Ok(_) => {
				debug!(event, "unsubscribed");
				self.emit(SessionEvent::UnsubscriptionAck { event: event.to_owned() });
			}
			Err(e) => {
				warn!(event, error = %e, "unsubscribe failed");
				self.emit(SessionEvent::HookFailed {
					event: event.to_owned(),
					error: e.to_string(),
				});
			}
		}
	}

	fn dispatch(&self, frame: EventFrame) {
		let EventFrame { event, data } = frame;
		let Some(emitter) = self.subscriptions.emitter(&event) else {
			trace!(event, "no listeners for event");
			return;
		};
		let outcome = emitter.fire(&data);
		if outcome.panicked > 0 {
			self.emit(SessionEvent::HandlerPanicked {
				event: event.clone(),
				count: outcome.panicked,
			});
		}
		self.emit(SessionEvent::EventDispatched { event, data });
	}

	fn emit(&self, event: SessionEvent) {
		self.session.fire(&event);
	}
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		if let Some(connection) = self.connection.get_mut().take() {
			connection.shutdown(self.config.shutdown_timeout);
		}
	}
}

fn run_router(client: &Weak<ClientInner>, rx: mpsc::Receiver<Routed>) {
	trace!("event router started");
	if let Some(inner) = client.upgrade() {
		inner.emit(SessionEvent::EventLoopStarted);
	}
	for routed in rx {
		let Some(inner) = client.upgrade() else { break };
		match routed {
			Routed::Event(frame) => inner.dispatch(frame),
			Routed::Dropped(reason) => inner.emit(SessionEvent::FrameDropped { reason }),
			Routed::Closed => {
				inner.emit(SessionEvent::EventLoopStopped);
				trace!("event router stopped");
				return;
			}
		}
	}
	if let Some(inner) = client.upgrade() {
		inner.emit(SessionEvent::EventLoopStopped);
	}
	trace!("event router stopped");
}
