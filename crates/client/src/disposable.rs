use std::fmt;

use parking_lot::Mutex;

type Action = Box<dyn FnOnce() + Send>;

/// Guard that undoes a registration exactly once.
///
/// Returned by every listener registration. [`Disposable::dispose`] runs the
/// undo action; later calls are no-ops. Dropping the guard disposes it, so a
/// listener lives exactly as long as its guard unless [`Disposable::detach`]
/// is called.
#[must_use = "dropping a Disposable immediately removes the registration it guards"]
pub struct Disposable {
	action: Mutex<Option<Action>>,
}

impl Disposable {
	/// Wraps an undo action.
	pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
		Self {
			action: Mutex::new(Some(Box::new(action))),
		}
	}

	/// A guard with nothing to undo.
	pub fn noop() -> Self {
		Self { action: Mutex::new(None) }
	}

	/// Combines several guards into one that disposes them in order.
	pub fn all(guards: impl IntoIterator<Item = Disposable>) -> Self {
		let guards: Vec<_> = guards.into_iter().collect();
		Self::new(move || guards.iter().for_each(Disposable::dispose))
	}

	/// Runs the undo action if it has not run yet.
	pub fn dispose(&self) {
		let action = self.action.lock().take();
		if let Some(action) = action {
			action();
		}
	}

	/// Returns true once the guard has been disposed or detached.
	pub fn is_disposed(&self) -> bool {
		self.action.lock().is_none()
	}

	/// Consumes the guard without undoing the registration.
	pub fn detach(self) {
		self.action.lock().take();
	}
}

impl Drop for Disposable {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl fmt::Debug for Disposable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Disposable").field("disposed", &self.is_disposed()).finish()
	}
}
