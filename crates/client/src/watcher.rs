//! File system watcher proxies.
//!
//! The host pushes watcher events under per-watcher names
//! (`watcher.<id>.onCreate`, `.onChange`, `.onDelete`), so each watcher
//! kind maps onto an ordinary client subscription; no fanout table is needed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{Client, Disposable, Error, Result};

const KIND: &str = "file system watcher";

/// File system change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
	/// A matching file was created.
	Create,
	/// A matching file changed.
	Change,
	/// A matching file was deleted.
	Delete,
}

impl WatchEvent {
	/// All kinds.
	pub const ALL: [WatchEvent; 3] = [Self::Create, Self::Change, Self::Delete];

	fn suffix(self) -> &'static str {
		match self {
			Self::Create => "onCreate",
			Self::Change => "onChange",
			Self::Delete => "onDelete",
		}
	}

	/// Wire event name of this kind for watcher `id`.
	pub fn event_name(self, id: &str) -> String {
		format!("watcher.{id}.{}", self.suffix())
	}
}

/// Event kinds a watcher should not report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherOptions {
	/// Skip creations.
	pub ignore_create: bool,
	/// Skip changes.
	pub ignore_change: bool,
	/// Skip deletions.
	pub ignore_delete: bool,
}

impl WatcherOptions {
	fn ignores(&self, kind: WatchEvent) -> bool {
		match kind {
			WatchEvent::Create => self.ignore_create,
			WatchEvent::Change => self.ignore_change,
			WatchEvent::Delete => self.ignore_delete,
		}
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Created {
	watcher_id: String,
}

struct WatcherState {
	client: Client,
	id: String,
	glob: String,
	options: WatcherOptions,
	disposed: AtomicBool,
}

/// A host-side file system watcher.
///
/// Clones share one watcher. Dropping the last handle disposes it.
#[derive(Clone)]
pub struct FileSystemWatcher {
	state: Arc<WatcherState>,
}

impl FileSystemWatcher {
	/// Creates a watcher for `glob` on the host.
	pub fn create(client: &Client, glob: &str, options: WatcherOptions) -> Result<Self> {
		let result = client.call(
			"workspace.createFileSystemWatcher",
			json!({
				"globPattern": glob,
				"ignoreCreateEvents": options.ignore_create,
				"ignoreChangeEvents": options.ignore_change,
				"ignoreDeleteEvents": options.ignore_delete,
			}),
		)?;
		let created: Created = serde_json::from_value(result).map_err(Error::Deserialize)?;
		debug!(id = %created.watcher_id, glob, "file system watcher created");
		Ok(Self::attach(client, created.watcher_id, glob, options))
	}

	/// Wraps a watcher that already exists on the host.
	pub fn attach(client: &Client, id: impl Into<String>, glob: impl Into<String>, options: WatcherOptions) -> Self {
		Self {
			state: Arc::new(WatcherState {
				client: client.clone(),
				id: id.into(),
				glob: glob.into(),
				options,
				disposed: AtomicBool::new(false),
			}),
		}
	}

	/// Watcher id.
	pub fn id(&self) -> &str {
		&self.state.id
	}

	/// Glob the watcher matches.
	pub fn glob(&self) -> &str {
		&self.state.glob
	}

	/// Ignored kinds.
	pub fn options(&self) -> WatcherOptions {
		self.state.options
	}

	/// Returns true once disposed.
	pub fn is_disposed(&self) -> bool {
		self.state.disposed.load(Ordering::SeqCst)
	}

	/// Registers a handler for `kind`. It receives the affected file URI.
	pub fn on(&self, kind: WatchEvent, handler: impl Fn(&str) + Send + Sync + 'static) -> Result<Disposable> {
		if self.is_disposed() {
			return Err(Error::Disposed {
				kind: KIND,
				id: self.state.id.clone(),
			});
		}
		let event = kind.event_name(&self.state.id);
		if self.state.options.ignores(kind) {
			return Err(Error::EventIgnored { event });
		}
		Ok(self.state.client.add_event_listener(&event, move |data| {
			handler(data.get("uri").and_then(Value::as_str).unwrap_or_default());
		}))
	}

	/// Files created.
	pub fn on_did_create(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Result<Disposable> {
		self.on(WatchEvent::Create, handler)
	}

	/// Files changed.
	pub fn on_did_change(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Result<Disposable> {
		self.on(WatchEvent::Change, handler)
	}

	/// Files deleted.
	pub fn on_did_delete(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Result<Disposable> {
		self.on(WatchEvent::Delete, handler)
	}

	/// Removes every handler and disposes the watcher on the host. Later calls are no-ops.
	pub fn dispose(&self) -> Result<()> {
		self.state.dispose()
	}
}

impl WatcherState {
	fn dispose(&self) -> Result<()> {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		for kind in WatchEvent::ALL {
			self.client.remove_all_listeners(&kind.event_name(&self.id));
		}
		self.client
			.call("workspace.disposeFileSystemWatcher", json!({ "watcherId": self.id }))
			.map(drop)
	}
}

impl Drop for WatcherState {
	fn drop(&mut self) {
		if let Err(e) = self.dispose() {
			debug!(id = %self.id, error = %e, "disposing dropped watcher failed");
		}
	}
}

impl fmt::Debug for FileSystemWatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FileSystemWatcher")
			.field("id", &self.state.id)
			.field("glob", &self.state.glob)
			.field("disposed", &self.is_disposed())
			.finish_non_exhaustive()
	}
}
