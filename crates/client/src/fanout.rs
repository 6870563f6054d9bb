//! Per-client demultiplexing of kind-level events to proxy objects.
//!
//! Webview panels share one host subscription per event kind. Each kind has
//! a member table `id -> proxy` and a single shared listener; the listener
//! reads the `id` field of each payload and forwards to that proxy only.
//! Members are held weakly so a dropped proxy never pins itself in the table.

use std::collections::HashMap;
use std::sync::Weak;

use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tracing::{trace, warn};

use crate::Disposable;

/// A proxy object that receives kind-level events addressed to its id.
pub(crate) trait FanoutTarget: Send + Sync {
	fn deliver(&self, kind: &str, payload: &Value);
}

#[derive(Default)]
struct KindEntry {
	members: HashMap<String, Weak<dyn FanoutTarget>>,
	shared: Option<Disposable>,
}

#[derive(Default)]
pub(crate) struct FanoutRegistry {
	/// Serializes join/leave so the shared listener is created and torn down once per 0->1 / 1->0.
	transition: ReentrantMutex<()>,
	kinds: Mutex<HashMap<String, KindEntry>>,
}

impl FanoutRegistry {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Adds a member; `subscribe` installs the shared listener when the kind has none.
	pub(crate) fn join(&self, kind: &str, id: &str, target: Weak<dyn FanoutTarget>, subscribe: impl FnOnce() -> Disposable) {
		let _transition = self.transition.lock();
		let needs_listener = {
			let mut kinds = self.kinds.lock();
			let entry = kinds.entry(kind.to_owned()).or_default();
			entry.members.insert(id.to_owned(), target);
			entry.shared.is_none()
		};
		if !needs_listener {
			return;
		}

		let listener = subscribe();
		let unused = {
			let mut kinds = self.kinds.lock();
			match kinds.get_mut(kind) {
				Some(entry) if entry.shared.is_none() => {
					entry.shared = Some(listener);
					None
				}
				_ => Some(listener),
			}
		};
		match unused {
			Some(listener) => listener.dispose(),
			None => trace!(kind, id, "fanout kind activated"),
		}
	}

	/// Removes a member; the shared listener is disposed once the kind is empty.
	pub(crate) fn leave(&self, kind: &str, id: &str) {
		let _transition = self.transition.lock();
		let released = {
			let mut kinds = self.kinds.lock();
			let Some(entry) = kinds.get_mut(kind) else { return };
			if entry.members.remove(id).is_none() || !entry.members.is_empty() {
				return;
			}
			kinds.remove(kind).and_then(|entry| entry.shared)
		};
		if let Some(listener) = released {
			trace!(kind, "fanout kind released");
			listener.dispose();
		}
	}

	/// Routes one kind-level payload to the member named by its `id` field.
	pub(crate) fn dispatch(&self, kind: &str, payload: &Value) {
		let Some(id) = payload.get("id").and_then(Value::as_str) else {
			warn!(kind, "fanout event without an id");
			return;
		};
		let target = self
			.kinds
			.lock()
			.get(kind)
			.and_then(|entry| entry.members.get(id))
			.and_then(Weak::upgrade);
		match target {
			Some(target) => target.deliver(kind, payload),
			None => trace!(kind, id, "no proxy registered for id"),
		}
	}

	pub(crate) fn member_count(&self, kind: &str) -> usize {
		self.kinds.lock().get(kind).map_or(0, |entry| entry.members.len())
	}
}
