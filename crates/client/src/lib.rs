//! Control a running editor over its local sockpuppet pipe.
//!
//! A [`Client`] owns one connection to the editor host. Requests are
//! correlated by id on a single reader thread, so any number of threads may
//! call concurrently while events stream in on the same pipe. Host events are
//! multiplexed to local handlers: the first handler for an event name
//! subscribes on the host, the last one to go unsubscribes.
//!
//! ```no_run
//! use sockpuppet_client::{Client, ClientConfig};
//! use sockpuppet_client::events::DidChangeTextDocument;
//!
//! # fn main() -> sockpuppet_client::Result<()> {
//! let client = Client::connect_with(ClientConfig::new())?;
//! let _changes = client.on::<DidChangeTextDocument>(|change| {
//! 	println!("{} edited ({} changes)", change.uri, change.content_changes.len());
//! });
//! let folders = client.workspace().workspace_folders()?;
//! println!("{folders:?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Threads
//!
//! Each connection runs a `sockpuppet-reader` thread that owns the read half
//! and a lazily started `sockpuppet-events` thread that runs handlers in wire
//! order. Handlers may call back into the client; they should not block for
//! long, since they hold up every later event on the connection.
#![warn(missing_docs)]

mod channel;
mod client;
pub mod config;
mod connection;
mod disposable;
pub mod emitter;
mod error;
pub mod events;
mod fanout;
mod session;
mod subscriptions;
pub mod tabs;
pub mod transport;
pub mod watcher;
pub mod webview;
pub mod window;
pub mod workspace;

pub use client::Client;
pub use config::ClientConfig;
pub use disposable::Disposable;
pub use emitter::EventEmitter;
pub use error::{Error, Result};
pub use events::{Event, HostEvent};
pub use session::SessionEvent;
pub use sockpuppet_proto as proto;
pub use tabs::{Tab, TabGroup, TabGroups};
pub use transport::Transport;
pub use watcher::{FileSystemWatcher, WatchEvent, WatcherOptions};
pub use webview::{PanelOptions, ViewState, WebviewOptions, WebviewPanel};
pub use window::Window;
pub use workspace::Workspace;
