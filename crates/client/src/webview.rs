//! Webview panel proxies.
//!
//! Every panel of a client shares one host subscription per event kind
//! (`webview.onDidReceiveMessage`, `webview.onDidDispose`,
//! `webview.onDidChangeViewState`). A panel joins the client's fanout table
//! for a kind when it gains its first local handler of that kind and leaves
//! when it loses the last one or is disposed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::emitter::EventEmitter;
use crate::fanout::FanoutTarget;
use crate::{Client, Disposable, Error, Result};

pub(crate) const MESSAGE_EVENT: &str = "webview.onDidReceiveMessage";
pub(crate) const DISPOSE_EVENT: &str = "webview.onDidDispose";
pub(crate) const VIEW_STATE_EVENT: &str = "webview.onDidChangeViewState";

const KIND: &str = "webview panel";

/// Content options of a webview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebviewOptions {
	/// Run scripts in the webview.
	pub enable_scripts: bool,
	/// Keep the webview's document alive while it is hidden.
	pub retain_context_when_hidden: bool,
	/// Roots the webview may load local resources from.
	pub local_resource_roots: Vec<String>,
}

impl Default for WebviewOptions {
	fn default() -> Self {
		Self {
			enable_scripts: true,
			retain_context_when_hidden: false,
			local_resource_roots: Vec::new(),
		}
	}
}

/// Options for creating a panel.
#[derive(Debug, Clone)]
pub struct PanelOptions {
	/// Panel id. A random UUID when unset.
	pub id: Option<String>,
	/// View type. `sockpuppet.webview.<id>` when unset.
	pub view_type: Option<String>,
	/// View column to show the panel in.
	pub view_column: i32,
	/// Webview content options.
	pub webview: WebviewOptions,
}

impl Default for PanelOptions {
	fn default() -> Self {
		Self {
			id: None,
			view_type: None,
			view_column: 1,
			webview: WebviewOptions::default(),
		}
	}
}

/// Visibility of a panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewState {
	/// The panel is visible.
	pub visible: bool,
	/// The panel has focus.
	pub active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebviewUri {
	webview_uri: String,
}

struct PanelState {
	client: Client,
	id: String,
	view_type: String,
	title: Mutex<String>,
	view: Mutex<ViewState>,
	disposed: AtomicBool,
	messages: Arc<EventEmitter<Value>>,
	disposals: Arc<EventEmitter<()>>,
	view_states: Arc<EventEmitter<ViewState>>,
}

/// A webview panel hosted by the editor.
///
/// Clones share one panel. Dropping the last handle disposes the panel.
#[derive(Clone)]
pub struct WebviewPanel {
	state: Arc<PanelState>,
}

impl WebviewPanel {
	/// Creates a panel on the host.
	pub fn create(client: &Client, title: &str, html: &str, options: PanelOptions) -> Result<Self> {
		let id = options.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
		let view_type = options.view_type.unwrap_or_else(|| format!("sockpuppet.webview.{id}"));
		let result = client.call(
			"window.createWebviewPanel",
			json!({
				"id": id,
				"viewType": view_type,
				"title": title,
				"showOptions": options.view_column,
				"html": html,
				"options": options.webview,
			}),
		)?;
		let panel = Self::attach(client, id, view_type, title);
		*panel.state.view.lock() = ViewState::deserialize(&result).unwrap_or_default();
		debug!(id = %panel.id(), "webview panel created");
		Ok(panel)
	}

	/// Wraps a panel that already exists on the host.
	pub fn attach(client: &Client, id: impl Into<String>, view_type: impl Into<String>, title: impl Into<String>) -> Self {
		let id = id.into();
		let state = Arc::new_cyclic(|this: &Weak<PanelState>| PanelState {
			messages: Arc::new(membership(client, MESSAGE_EVENT, &id, this)),
			disposals: Arc::new(membership(client, DISPOSE_EVENT, &id, this)),
			view_states: Arc::new(membership(client, VIEW_STATE_EVENT, &id, this)),
			client: client.clone(),
			id,
			view_type: view_type.into(),
			title: Mutex::new(title.into()),
			view: Mutex::new(ViewState::default()),
			disposed: AtomicBool::new(false),
		});
		Self { state }
	}

	/// Panel id.
	pub fn id(&self) -> &str {
		&self.state.id
	}

	/// View type.
	pub fn view_type(&self) -> &str {
		&self.state.view_type
	}

	/// Last title set through this handle.
	pub fn title(&self) -> String {
		self.state.title.lock().clone()
	}

	/// Returns true once the panel was disposed locally or by the host.
	pub fn is_disposed(&self) -> bool {
		self.state.disposed.load(Ordering::SeqCst)
	}

	/// Last known view state.
	pub fn view_state(&self) -> ViewState {
		*self.state.view.lock()
	}

	/// Replaces the panel's HTML.
	pub fn update_html(&self, html: &str) -> Result<()> {
		self.update(json!({ "id": self.id(), "html": html }))
	}

	/// Replaces the panel's title.
	pub fn update_title(&self, title: &str) -> Result<()> {
		self.update(json!({ "id": self.id(), "title": title }))?;
		*self.state.title.lock() = title.to_owned();
		Ok(())
	}

	/// Sets the tab icon to an absolute file path.
	pub fn update_icon_path(&self, icon_path: &str) -> Result<()> {
		self.update(json!({ "id": self.id(), "iconPath": icon_path }))
	}

	fn update(&self, params: Value) -> Result<()> {
		self.ensure_live()?;
		self.state.client.call("window.updateWebviewPanel", params)?;
		Ok(())
	}

	/// Posts a message to the webview's script context.
	pub fn post_message(&self, message: &Value) -> Result<()> {
		self.ensure_live()?;
		self.state
			.client
			.call("window.postMessageToWebview", json!({ "id": self.id(), "message": message }))?;
		Ok(())
	}

	/// Converts a local path or `file://` URI into one the webview can load.
	pub fn as_webview_uri(&self, local: &str) -> Result<String> {
		self.ensure_live()?;
		let result = self
			.state
			.client
			.call("window.asWebviewUri", json!({ "id": self.id(), "uri": to_file_uri(local) }))?;
		let uri: WebviewUri = serde_json::from_value(result).map_err(Error::Deserialize)?;
		Ok(uri.webview_uri)
	}

	/// Messages posted by the webview's script. The handler receives the `message` field.
	pub fn on_did_receive_message(&self, handler: impl Fn(&Value) + Send + Sync + 'static) -> Result<Disposable> {
		self.ensure_live()?;
		self.state.messages.try_event(handler).ok_or_else(|| self.disposed_error())
	}

	/// Runs `handler` once when the panel is disposed.
	///
	/// On a panel that is already disposed the handler runs before this returns.
	pub fn on_did_dispose(&self, handler: impl Fn() + Send + Sync + 'static) -> Disposable {
		let handler = Arc::new(handler);
		let registered = Arc::clone(&handler);
		match self.state.disposals.try_event(move |_: &()| registered()) {
			Some(guard) => guard,
			None => {
				handler();
				Disposable::noop()
			}
		}
	}

	/// Visibility changes. Inert on a disposed panel.
	pub fn on_did_change_view_state(&self, handler: impl Fn(ViewState) + Send + Sync + 'static) -> Disposable {
		self.state
			.view_states
			.try_event(move |state| handler(*state))
			.unwrap_or_else(Disposable::noop)
	}

	/// Closes the panel. Later calls are no-ops.
	///
	/// Local dispose handlers run even if the host request fails; its error is returned.
	pub fn dispose(&self) -> Result<()> {
		self.state.dispose()
	}

	fn ensure_live(&self) -> Result<()> {
		if self.is_disposed() {
			return Err(self.disposed_error());
		}
		Ok(())
	}

	fn disposed_error(&self) -> Error {
		Error::Disposed {
			kind: KIND,
			id: self.state.id.clone(),
		}
	}
}

impl fmt::Debug for WebviewPanel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebviewPanel")
			.field("id", &self.state.id)
			.field("view_type", &self.state.view_type)
			.field("disposed", &self.is_disposed())
			.finish_non_exhaustive()
	}
}

/// Emitter whose first/last handler joins/leaves the fanout table of `kind`.
fn membership<T>(client: &Client, kind: &'static str, id: &str, panel: &Weak<PanelState>) -> EventEmitter<T> {
	let (joining, leaving) = (client.clone(), client.clone());
	let (join_id, leave_id) = (id.to_owned(), id.to_owned());
	let target: Weak<dyn FanoutTarget> = panel.clone();
	EventEmitter::new(format!("{kind}#{id}"))
		.on_first_add(move || joining.fanout_join(kind, &join_id, target.clone()))
		.on_no_listeners(move || leaving.fanout_leave(kind, &leave_id))
}

impl PanelState {
	fn dispose(&self) -> Result<()> {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		let result = self.client.call("window.disposeWebviewPanel", json!({ "id": self.id }));
		self.release();
		result.map(drop)
	}

	/// The host closed the panel.
	fn closed_by_host(&self) {
		if !self.disposed.swap(true, Ordering::SeqCst) {
			trace!(id = %self.id, "webview panel disposed by host");
			self.release();
		}
	}

	/// Runs the dispose handlers and retires every emitter, leaving the fanout tables.
	fn release(&self) {
		self.disposals.retire_with(&());
		self.messages.retire();
		self.view_states.retire();
	}
}

impl FanoutTarget for PanelState {
	fn deliver(&self, kind: &str, payload: &Value) {
		match kind {
			MESSAGE_EVENT => {
				let message = payload.get("message").unwrap_or(&Value::Null);
				self.messages.fire(message);
			}
			DISPOSE_EVENT => self.closed_by_host(),
			VIEW_STATE_EVENT => {
				let state = ViewState::deserialize(payload).unwrap_or_default();
				*self.view.lock() = state;
				self.view_states.fire(&state);
			}
			_ => {}
		}
	}
}

impl Drop for PanelState {
	fn drop(&mut self) {
		if let Err(e) = self.dispose() {
			debug!(id = %self.id, error = %e, "disposing dropped webview panel failed");
		}
	}
}

/// Prefixes `file://` onto a bare path, normalizing Windows separators.
fn to_file_uri(local: &str) -> String {
	if local.contains("://") {
		return local.to_owned();
	}
	let path = local.replace('\\', "/");
	if path.starts_with('/') {
		format!("file://{path}")
	} else {
		format!("file:///{path}")
	}
}
