//! Event name to emitter table.
//!
//! Each distinct event name maps to one [`EventEmitter`] whose hooks send
//! `events.subscribe` / `events.unsubscribe`. An emitter that empties is
//! retired and unlinked; a registration racing with that retries on a fresh
//! emitter, so a name is never left subscribed without local handlers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::emitter::{EventEmitter, Handler, HandlerId};

/// Handle to one registration inside the manager.
pub(crate) struct Registration {
	pub(crate) emitter: Arc<EventEmitter<Value>>,
	pub(crate) id: HandlerId,
}

#[derive(Default)]
pub(crate) struct SubscriptionManager {
	emitters: Mutex<HashMap<String, Arc<EventEmitter<Value>>>>,
}

impl SubscriptionManager {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Adds `handler` under `event`, creating the emitter with `make` when absent.
	pub(crate) fn add(&self, event: &str, handler: Handler<Value>, make: impl Fn() -> EventEmitter<Value>) -> Registration {
		loop {
			let emitter = {
				let mut emitters = self.emitters.lock();
				Arc::clone(emitters.entry(event.to_owned()).or_insert_with(|| Arc::new(make())))
			};
			if let Some(id) = emitter.try_add(Arc::clone(&handler)) {
				return Registration { emitter, id };
			}
			self.unlink(event, &emitter);
		}
	}

	/// Removes one registration; unsubscribes and retires the emitter when it empties.
	pub(crate) fn remove(&self, event: &str, registration: &Registration) {
		if registration.emitter.remove(registration.id) && registration.emitter.retire_if_idle() {
			self.unlink(event, &registration.emitter);
		}
	}

	/// Removes every handler for `event`.
	pub(crate) fn remove_all(&self, event: &str) -> usize {
		let Some(emitter) = self.emitter(event) else { return 0 };
		let removed = emitter.clear();
		if emitter.retire_if_idle() {
			self.unlink(event, &emitter);
		}
		removed
	}

	pub(crate) fn emitter(&self, event: &str) -> Option<Arc<EventEmitter<Value>>> {
		self.emitters.lock().get(event).cloned()
	}

	pub(crate) fn has_listeners(&self, event: &str) -> bool {
		self.emitter(event).is_some_and(|e| e.has_listeners())
	}

	/// Event names with at least one local handler, sorted.
	pub(crate) fn active_events(&self) -> Vec<String> {
		let mut events: Vec<String> = self
			.emitters
			.lock()
			.iter()
			.filter(|(_, emitter)| emitter.has_listeners())
			.map(|(event, _)| event.clone())
			.collect();
		events.sort();
		events
	}

	fn unlink(&self, event: &str, emitter: &Arc<EventEmitter<Value>>) {
		let mut emitters = self.emitters.lock();
		if emitters.get(event).is_some_and(|current| Arc::ptr_eq(current, emitter)) {
			emitters.remove(event);
		}
	}
}
