//! In-process fan-out primitive for one named event stream.
//!
//! An [`EventEmitter`] owns an ordered handler list and two optional lifecycle
//! hooks. `on_first_add` runs when the list goes from empty to non-empty and
//! `on_no_listeners` when it goes back to empty. The client wires these hooks
//! to the host's subscribe/unsubscribe control methods, so the hooks are
//! serialized per emitter: a subscribe and a racing unsubscribe can never
//! overtake each other on the wire.
//!
//! Handlers run outside every lock, in registration order. A panicking
//! handler is caught and logged; its siblings still run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::error;

use crate::Disposable;

/// Shared handler callback.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Identifies one registered handler within its emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Result of one [`EventEmitter::fire`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireOutcome {
	/// Handlers that returned normally.
	pub delivered: usize,
	/// Handlers that panicked.
	pub panicked: usize,
}

struct Handlers<T> {
	entries: Vec<(HandlerId, Handler<T>)>,
	next_id: u64,
	/// Set once the emitter has been unlinked from its owner and must not take new handlers.
	retired: bool,
}

/// Thread-safe handler list with first/last listener hooks.
pub struct EventEmitter<T> {
	label: String,
	handlers: Mutex<Handlers<T>>,
	/// Held across list mutation and the hook it triggers.
	lifecycle: ReentrantMutex<()>,
	on_first_add: Option<Hook>,
	on_no_listeners: Option<Hook>,
}

impl<T> EventEmitter<T> {
	/// Creates an emitter without hooks. `label` names it in logs.
	pub fn new(label: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			handlers: Mutex::new(Handlers {
				entries: Vec::new(),
				next_id: 0,
				retired: false,
			}),
			lifecycle: ReentrantMutex::new(()),
			on_first_add: None,
			on_no_listeners: None,
		}
	}

	/// Sets the hook run when the first handler is added.
	pub fn on_first_add(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_first_add = Some(Box::new(hook));
		self
	}

	/// Sets the hook run when the last handler is removed.
	pub fn on_no_listeners(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_no_listeners = Some(Box::new(hook));
		self
	}

	/// Name used in logs.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Registers a handler and returns its id.
	pub fn add(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> HandlerId {
		let _transition = self.lifecycle.lock();
		self.insert(Arc::new(handler))
	}

	/// Registers a handler, unless the emitter has been retired.
	pub(crate) fn try_add(&self, handler: Handler<T>) -> Option<HandlerId> {
		let _transition = self.lifecycle.lock();
		if self.handlers.lock().retired {
			return None;
		}
		Some(self.insert(handler))
	}

	fn insert(&self, handler: Handler<T>) -> HandlerId {
		let (id, first) = {
			let mut handlers = self.handlers.lock();
			let id = HandlerId(handlers.next_id);
			handlers.next_id += 1;
			handlers.entries.push((id, handler));
			(id, handlers.entries.len() == 1)
		};
		if first {
			self.run_hook(self.on_first_add.as_ref(), "on_first_add");
		}
		id
	}

	/// Removes one handler. Unknown ids are ignored.
	///
	/// Returns true if the handler was registered.
	pub fn remove(&self, id: HandlerId) -> bool {
		let _transition = self.lifecycle.lock();
		let now_empty = {
			let mut handlers = self.handlers.lock();
			let Some(pos) = handlers.entries.iter().position(|(entry, _)| *entry == id) else {
				return false;
			};
			handlers.entries.remove(pos);
			handlers.entries.is_empty()
		};
		if now_empty {
			self.run_hook(self.on_no_listeners.as_ref(), "on_no_listeners");
		}
		true
	}

	/// Removes every handler, running `on_no_listeners` if any were present.
	pub fn clear(&self) -> usize {
		let _transition = self.lifecycle.lock();
		let removed = std::mem::take(&mut self.handlers.lock().entries).len();
		if removed > 0 {
			self.run_hook(self.on_no_listeners.as_ref(), "on_no_listeners");
		}
		removed
	}

	/// Invokes every handler registered at the time of the call.
	pub fn fire(&self, payload: &T) -> FireOutcome {
		let snapshot: Vec<Handler<T>> = self.handlers.lock().entries.iter().map(|(_, h)| Arc::clone(h)).collect();
		self.deliver(snapshot, payload)
	}

	fn deliver(&self, handlers: Vec<Handler<T>>, payload: &T) -> FireOutcome {
		let mut outcome = FireOutcome::default();
		for handler in handlers {
			match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
				Ok(()) => outcome.delivered += 1,
				Err(panic) => {
					outcome.panicked += 1;
					error!(emitter = %self.label, panic = panic_message(&*panic), "event handler panicked");
				}
			}
		}
		outcome
	}

	/// Returns true if at least one handler is registered.
	pub fn has_listeners(&self) -> bool {
		!self.handlers.lock().entries.is_empty()
	}

	/// Number of registered handlers.
	pub fn listener_count(&self) -> usize {
		self.handlers.lock().entries.len()
	}

	/// Runs `f` with the current listener count while no transition can interleave.
	pub(crate) fn with_settled<R>(&self, f: impl FnOnce(usize) -> R) -> R {
		let _transition = self.lifecycle.lock();
		f(self.listener_count())
	}

	/// Retires the emitter if it is empty and no transition is in flight.
	pub(crate) fn retire_if_idle(&self) -> bool {
		let Some(_transition) = self.lifecycle.try_lock() else {
			return false;
		};
		let mut handlers = self.handlers.lock();
		if !handlers.entries.is_empty() {
			return false;
		}
		handlers.retired = true;
		true
	}

	/// Retires the emitter and removes every handler.
	///
	/// Later [`try_add`](Self::try_add) calls are refused. Runs `on_no_listeners`
	/// if any handler was present.
	pub(crate) fn retire(&self) -> usize {
		self.retire_entries().len()
	}

	/// Like [`retire`](Self::retire), then hands `payload` to the removed handlers.
	///
	/// Each handler registered before retirement runs exactly once.
	pub(crate) fn retire_with(&self, payload: &T) -> FireOutcome {
		let handlers = self.retire_entries();
		self.deliver(handlers, payload)
	}

	fn retire_entries(&self) -> Vec<Handler<T>> {
		let _transition = self.lifecycle.lock();
		let entries = {
			let mut handlers = self.handlers.lock();
			handlers.retired = true;
			std::mem::take(&mut handlers.entries)
		};
		if !entries.is_empty() {
			self.run_hook(self.on_no_listeners.as_ref(), "on_no_listeners");
		}
		entries.into_iter().map(|(_, handler)| handler).collect()
	}

	fn run_hook(&self, hook: Option<&Hook>, which: &'static str) {
		let Some(hook) = hook else { return };
		if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| hook())) {
			error!(emitter = %self.label, hook = which, panic = panic_message(&*panic), "emitter hook panicked");
		}
	}
}

impl<T: 'static> EventEmitter<T> {
	/// Registers a handler on a shared emitter and returns its removal guard.
	pub fn event(self: &Arc<Self>, handler: impl Fn(&T) + Send + Sync + 'static) -> Disposable
	where
		T: Send + Sync,
	{
		let id = self.add(handler);
		self.guard(id)
	}

	/// Like [`event`](Self::event), but `None` once the emitter is retired.
	pub(crate) fn try_event(self: &Arc<Self>, handler: impl Fn(&T) + Send + Sync + 'static) -> Option<Disposable>
	where
		T: Send + Sync,
	{
		let id = self.try_add(Arc::new(handler))?;
		Some(self.guard(id))
	}

	fn guard(self: &Arc<Self>, id: HandlerId) -> Disposable
	where
		T: Send + Sync,
	{
		let weak = Arc::downgrade(self);
		Disposable::new(move || {
			if let Some(emitter) = weak.upgrade() {
				emitter.remove(id);
			}
		})
	}
}

impl<T> fmt::Debug for EventEmitter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventEmitter")
			.field("label", &self.label)
			.field("listeners", &self.listener_count())
			.finish_non_exhaustive()
	}
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(msg) = panic.downcast_ref::<&str>() {
		msg
	} else if let Some(msg) = panic.downcast_ref::<String>() {
		msg
	} else {
		"<non-string panic payload>"
	}
}
