//! Wire protocol spoken between a sockpuppet client and the editor host.
//!
//! Every frame is a single JSON object terminated by `\n`:
//!
//! - Request: `{"id": <int>, "method": "<namespace.verb>", "params": {...}}`
//! - Response: `{"id": <int>, "result": <any>}` or `{"id": <int>, "error": "<message>"}`
//! - Event: `{"type": "event", "event": "<name>", "data": <any>}`
//!
//! Responses and events share one stream. [`Inbound::decode`] classifies a
//! frame by shape so a single reader can demultiplex them.
#![warn(missing_docs)]

pub mod framing;
pub mod paths;
mod types;

pub use framing::{FrameReader, LineFramer, READ_CHUNK, encode_frame};
pub use types::{CounterIdGen, EventFrame, FrameError, HostError, Inbound, Request, RequestId, Response};
