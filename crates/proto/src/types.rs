use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier correlating a response to its request.
///
/// Unique for the lifetime of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Sequential request id generator.
///
/// The first id handed out is `1`.
#[derive(Debug, Clone, Copy)]
pub struct CounterIdGen(u64);

impl CounterIdGen {
	/// Creates a new counter.
	#[must_use]
	pub const fn new() -> Self {
		Self(1)
	}

	/// Returns the next unique id and advances the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> RequestId {
		let id = RequestId(self.0);
		self.0 += 1;
		id
	}
}

impl Default for CounterIdGen {
	fn default() -> Self {
		Self::new()
	}
}

/// Outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Correlation id.
	pub id: RequestId,
	/// Host method, `<namespace>.<verb>`. Never validated client-side.
	pub method: String,
	/// Method parameters; always an object on the wire.
	pub params: Value,
}

impl Request {
	/// Builds a request, substituting `{}` for null params.
	pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
		let params = match params {
			Value::Null => Value::Object(Map::new()),
			other => other,
		};
		Self {
			id,
			method: method.into(),
			params,
		}
	}
}

/// Error message returned by the host for a single request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
	/// Human readable message as reported by the host.
	pub message: String,
}

impl HostError {
	/// Normalizes an `error` field into a message.
	///
	/// Strings are used verbatim, objects contribute their `message` field,
	/// anything else is rendered as compact JSON.
	pub fn from_value(value: Value) -> Self {
		let message = match value {
			Value::String(message) => message,
			other => other
				.get("message")
				.and_then(Value::as_str)
				.map(str::to_owned)
				.unwrap_or_else(|| other.to_string()),
		};
		Self { message }
	}
}

/// Response to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	/// Id of the request being answered.
	pub id: RequestId,
	/// `result` on success, `error` on failure.
	pub outcome: Result<Value, HostError>,
}

/// Event pushed by the host to a subscribed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "event")]
pub struct EventFrame {
	/// Event name, e.g. `workspace.onDidSaveTextDocument`.
	pub event: String,
	/// Event payload; shape depends on the event name.
	#[serde(default)]
	pub data: Value,
}

/// Reasons a line could not be classified as a frame.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FrameError {
	/// The line is not valid JSON.
	#[error("invalid JSON: {0}")]
	Json(#[from] serde_json::Error),
	/// The line is JSON but not an object.
	#[error("frame is not a JSON object")]
	NotAnObject,
	/// Neither an event tag nor an integer `id` is present.
	#[error("frame has neither an event tag nor an integer id")]
	MissingId,
	/// An event frame without a string `event` field.
	#[error("event frame has no event name")]
	MissingEventName,
}

/// Classification of an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
	/// Answer to an in-flight request.
	Response(Response),
	/// Host-pushed event.
	Event(EventFrame),
}

impl Inbound {
	/// Decodes one line (without its terminator).
	pub fn decode(line: &[u8]) -> Result<Self, FrameError> {
		let value: Value = serde_json::from_slice(line)?;
		Self::from_value(value)
	}

	/// Classifies an already parsed frame.
	///
	/// Frames tagged `"type": "event"` are events; everything else must carry
	/// an integer `id`. A non-null `error` wins over `result`; a response
	/// with neither answers `null`.
	pub fn from_value(value: Value) -> Result<Self, FrameError> {
		let Value::Object(mut map) = value else {
			return Err(FrameError::NotAnObject);
		};

		if map.get("type").and_then(Value::as_str) == Some("event") {
			let event = match map.remove("event") {
				Some(Value::String(event)) => event,
				_ => return Err(FrameError::MissingEventName),
			};
			let data = map.remove("data").unwrap_or(Value::Null);
			return Ok(Self::Event(EventFrame { event, data }));
		}

		let id = map.get("id").and_then(Value::as_u64).map(RequestId).ok_or(FrameError::MissingId)?;

		if let Some(error) = map.remove("error").filter(|e| !e.is_null()) {
			return Ok(Self::Response(Response {
				id,
				outcome: Err(HostError::from_value(error)),
			}));
		}

		let result = map.remove("result").unwrap_or(Value::Null);
		Ok(Self::Response(Response { id, outcome: Ok(result) }))
	}
}
