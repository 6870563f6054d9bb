//! Lifecycle notifications for diagnostics and test coordination.

use serde_json::Value;

/// Internal lifecycle state reported to session listeners.
///
/// These are not part of the host protocol; they let tooling observe when
/// the event loop starts, when subscriptions are acknowledged and when
/// events are dispatched.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionEvent {
	/// The event router thread started.
	EventLoopStarted,
	/// The event router thread exited.
	EventLoopStopped,
	/// An event was delivered to its local handlers.
	EventDispatched {
		/// Event name.
		event: String,
		/// Raw payload.
		data: Value,
	},
	/// The host acknowledged `events.subscribe`.
	SubscriptionAck {
		/// Event name.
		event: String,
	},
	/// The host acknowledged `events.unsubscribe`.
	UnsubscriptionAck {
		/// Event name.
		event: String,
	},
	/// A subscribe or unsubscribe control request failed.
	HookFailed {
		/// Event name.
		event: String,
		/// Rendered error.
		error: String,
	},
	/// One or more handlers panicked while handling an event.
	HandlerPanicked {
		/// Event name.
		event: String,
		/// Number of handlers that panicked.
		count: usize,
	},
	/// An inbound line could not be classified and was discarded.
	FrameDropped {
		/// Rendered decode error.
		reason: String,
	},
}

impl SessionEvent {
	/// Stable kebab-case name of the state.
	pub fn name(&self) -> &'static str {
		match self {
			Self::EventLoopStarted => "event-loop-started",
			Self::EventLoopStopped => "event-loop-stopped",
			Self::EventDispatched { .. } => "event-dispatched",
			Self::SubscriptionAck { .. } => "subscription-ack",
			Self::UnsubscriptionAck { .. } => "unsubscription-ack",
			Self::HookFailed { .. } => "hook-failed",
			Self::HandlerPanicked { .. } => "handler-panicked",
			Self::FrameDropped { .. } => "frame-dropped",
		}
	}

	/// Event name this state concerns, if any.
	pub fn event(&self) -> Option<&str> {
		match self {
			Self::EventDispatched { event, .. }
			| Self::SubscriptionAck { event }
			| Self::UnsubscriptionAck { event }
			| Self::HookFailed { event, .. }
			| Self::HandlerPanicked { event, .. } => Some(event),
			_ => None,
		}
	}
}
