//! Typed registry of host events.
//!
//! Every event name the host can push is a marker type implementing
//! [`HostEvent`], tying the wire name to the payload record it decodes to.
//! Typed listeners decode at the dispatch boundary and work with concrete
//! structs; a payload that does not match its schema is logged and skipped.
//!
//! ```no_run
//! use sockpuppet_client::events::DidSaveTextDocument;
//! # fn demo(client: &sockpuppet_client::Client) {
//! let _guard = client.on::<DidSaveTextDocument>(|doc| println!("saved {}", doc.file_name));
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Client, Disposable};

/// An event the host can push, with its wire name and payload schema.
pub trait HostEvent: 'static {
	/// Wire event name.
	const NAME: &'static str;
	/// Decoded payload.
	type Payload: DeserializeOwned + Send + 'static;
}

macro_rules! host_events {
	($($(#[$meta:meta])* $ty:ident => $name:literal, $payload:ty;)*) => {
		$(
			$(#[$meta])*
			#[derive(Debug)]
			pub enum $ty {}

			impl HostEvent for $ty {
				const NAME: &'static str = $name;
				type Payload = $payload;
			}
		)*

		/// Wire names of every typed event.
		pub const ALL_EVENT_NAMES: &[&str] = &[$($name),*];
	};
}

host_events! {
	/// A text document was opened.
	DidOpenTextDocument => "workspace.onDidOpenTextDocument", TextDocumentEvent;
	/// A text document was closed.
	DidCloseTextDocument => "workspace.onDidCloseTextDocument", TextDocumentEvent;
	/// A text document was saved.
	DidSaveTextDocument => "workspace.onDidSaveTextDocument", TextDocumentEvent;
	/// A text document's content changed.
	DidChangeTextDocument => "workspace.onDidChangeTextDocument", TextDocumentChangeEvent;
	/// Workspace folders were added or removed.
	DidChangeWorkspaceFolders => "workspace.onDidChangeWorkspaceFolders", WorkspaceFoldersChangeEvent;
	/// Configuration changed; the payload shape is host defined.
	DidChangeConfiguration => "workspace.onDidChangeConfiguration", Value;
	/// Files were created.
	DidCreateFiles => "workspace.onDidCreateFiles", FilesEvent;
	/// Files were deleted.
	DidDeleteFiles => "workspace.onDidDeleteFiles", FilesEvent;
	/// Files were renamed.
	DidRenameFiles => "workspace.onDidRenameFiles", RenameFilesEvent;
	/// The active editor changed; `None` when no editor is active.
	DidChangeActiveTextEditor => "window.onDidChangeActiveTextEditor", Option<ActiveEditorEvent>;
	/// The selection in an editor changed.
	DidChangeTextEditorSelection => "window.onDidChangeTextEditorSelection", TextEditorSelectionEvent;
	/// The set of visible editors changed.
	DidChangeVisibleTextEditors => "window.onDidChangeVisibleTextEditors", VisibleTextEditorsEvent;
	/// The visible ranges of an editor changed.
	DidChangeTextEditorVisibleRanges => "window.onDidChangeTextEditorVisibleRanges", TextEditorVisibleRangesEvent;
	/// Editor options changed.
	DidChangeTextEditorOptions => "window.onDidChangeTextEditorOptions", TextEditorOptionsEvent;
	/// An editor moved to another view column.
	DidChangeTextEditorViewColumn => "window.onDidChangeTextEditorViewColumn", TextEditorViewColumnEvent;
	/// A terminal was opened.
	DidOpenTerminal => "window.onDidOpenTerminal", TerminalEvent;
	/// A terminal was closed.
	DidCloseTerminal => "window.onDidCloseTerminal", TerminalEvent;
	/// A terminal's state changed.
	DidChangeTerminalState => "window.onDidChangeTerminalState", TerminalStateEvent;
	/// The editor window gained or lost focus.
	DidChangeWindowState => "window.onDidChangeWindowState", WindowStateEvent;
	/// Tabs were opened, closed or changed.
	DidChangeTabs => "window.onDidChangeTabs", TabChangeEvent;
	/// Tab groups were opened, closed or changed.
	DidChangeTabGroups => "window.onDidChangeTabGroups", TabChangeEvent;
}

/// Zero-based line/character position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
	/// Line.
	pub line: u32,
	/// Character offset within the line.
	pub character: u32,
}

/// Half-open position range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
	/// Inclusive start.
	pub start: Position,
	/// Exclusive end.
	pub end: Position,
}

/// Payload of the open/close/save document events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextDocumentEvent {
	/// Document URI.
	pub uri: String,
	/// Absolute file name.
	pub file_name: String,
	/// Language identifier.
	pub language_id: String,
}

/// One edit within a content change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContentChange {
	/// Replaced range.
	pub range: Range,
	/// Replacement text.
	pub text: String,
}

/// Payload of `workspace.onDidChangeTextDocument`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextDocumentChangeEvent {
	/// Document URI.
	pub uri: String,
	/// Edits in application order.
	pub content_changes: Vec<ContentChange>,
}

/// A workspace folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkspaceFolder {
	/// Folder URI.
	pub uri: String,
	/// Display name.
	pub name: String,
}

/// Payload of `workspace.onDidChangeWorkspaceFolders`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkspaceFoldersChangeEvent {
	/// Folders added.
	pub added: Vec<WorkspaceFolder>,
	/// Folders removed.
	pub removed: Vec<WorkspaceFolder>,
}

/// A file reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileUri {
	/// File URI.
	pub uri: String,
}

/// Payload of the create/delete files events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilesEvent {
	/// Affected files.
	pub files: Vec<FileUri>,
}

/// One rename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRename {
	/// URI before the rename.
	pub old_uri: String,
	/// URI after the rename.
	pub new_uri: String,
}

/// Payload of `workspace.onDidRenameFiles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenameFilesEvent {
	/// Renames.
	pub files: Vec<FileRename>,
}

/// Document shown in the newly active editor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveEditorEvent {
	/// Document URI.
	pub uri: String,
	/// Absolute file name.
	pub file_name: String,
	/// Language identifier.
	pub language_id: String,
}

/// A selection with its anchor and active ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Selection {
	/// Start of the selection.
	pub start: Position,
	/// End of the selection.
	pub end: Position,
	/// Cursor end.
	pub active: Position,
	/// Fixed end.
	pub anchor: Position,
}

/// Payload of `window.onDidChangeTextEditorSelection`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextEditorSelectionEvent {
	/// Document URI.
	pub uri: String,
	/// Current selections.
	pub selections: Vec<Selection>,
}

/// A visible editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisibleEditor {
	/// Document URI.
	pub uri: String,
	/// Language identifier.
	pub language_id: String,
}

/// Payload of `window.onDidChangeVisibleTextEditors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VisibleTextEditorsEvent {
	/// Number of visible editors.
	pub count: usize,
	/// The editors.
	pub editors: Vec<VisibleEditor>,
}

/// Payload of `window.onDidChangeTextEditorVisibleRanges`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEditorVisibleRangesEvent {
	/// Document URI.
	pub uri: String,
	/// Visible ranges.
	pub visible_ranges: Vec<Range>,
}

/// Editor options as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEditorOptions {
	/// Tab width.
	pub tab_size: Option<u32>,
	/// Whether tabs insert spaces.
	pub insert_spaces: Option<bool>,
	/// Cursor style, host encoded.
	pub cursor_style: Option<Value>,
	/// Line number style, host encoded.
	pub line_numbers: Option<Value>,
}

/// Payload of `window.onDidChangeTextEditorOptions`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextEditorOptionsEvent {
	/// Document URI.
	pub uri: String,
	/// New options.
	pub options: TextEditorOptions,
}

/// Payload of `window.onDidChangeTextEditorViewColumn`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEditorViewColumnEvent {
	/// Document URI.
	pub uri: String,
	/// New view column.
	pub view_column: Option<i32>,
}

/// Payload of the terminal open/close events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TerminalEvent {
	/// Terminal name.
	pub name: String,
}

/// Payload of `window.onDidChangeTerminalState`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalStateEvent {
	/// Terminal name.
	pub name: String,
	/// Whether the user has interacted with the terminal.
	pub is_interacted_with: bool,
}

/// Payload of `window.onDidChangeWindowState`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowStateEvent {
	/// Whether the editor window has focus.
	pub focused: bool,
}

/// Payload of the tab and tab group change events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TabChangeEvent {
	/// Opened items.
	pub opened: Vec<Value>,
	/// Closed items.
	pub closed: Vec<Value>,
	/// Changed items.
	pub changed: Vec<Value>,
}

/// Decodes a raw payload into `E::Payload`.
pub fn decode<E: HostEvent>(data: &Value) -> Result<E::Payload, serde_json::Error> {
	E::Payload::deserialize(data)
}

/// Subscribable handle for one typed event on one client.
pub struct Event<E> {
	client: Client,
	_event: PhantomData<fn() -> E>,
}

impl<E: HostEvent> Event<E> {
	pub(crate) fn new(client: Client) -> Self {
		Self {
			client,
			_event: PhantomData,
		}
	}

	/// Wire name of the event.
	pub fn name(&self) -> &'static str {
		E::NAME
	}

	/// Registers a typed handler.
	pub fn subscribe(&self, handler: impl Fn(E::Payload) + Send + Sync + 'static) -> Disposable {
		self.client.on::<E>(handler)
	}
}

impl<E: HostEvent> fmt::Debug for Event<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Event").field(&E::NAME).finish()
	}
}
