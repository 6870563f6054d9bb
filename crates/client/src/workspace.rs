//! `workspace.*` methods and events.

use serde_json::json;

use crate::events::{
	DidChangeConfiguration, DidChangeTextDocument, DidChangeWorkspaceFolders, DidCloseTextDocument, DidCreateFiles, DidDeleteFiles, DidOpenTextDocument,
	DidRenameFiles, DidSaveTextDocument, Event, WorkspaceFolder,
};
use crate::watcher::{FileSystemWatcher, WatcherOptions};
use crate::{Client, Result};

/// Workspace namespace of a client.
#[derive(Debug, Clone)]
pub struct Workspace {
	client: Client,
}

impl Workspace {
	pub(crate) fn new(client: Client) -> Self {
		Self { client }
	}

	/// Open workspace folders. Empty when no folder is open.
	pub fn workspace_folders(&self) -> Result<Vec<WorkspaceFolder>> {
		let folders: Option<Vec<WorkspaceFolder>> = self.client.request("workspace.workspaceFolders", json!({}))?;
		Ok(folders.unwrap_or_default())
	}

	/// Starts watching files matching `glob`.
	pub fn create_file_system_watcher(&self, glob: &str, options: WatcherOptions) -> Result<FileSystemWatcher> {
		FileSystemWatcher::create(&self.client, glob, options)
	}

	/// A document was opened.
	pub fn on_did_open_text_document(&self) -> Event<DidOpenTextDocument> {
		Event::new(self.client.clone())
	}

	/// A document was closed.
	pub fn on_did_close_text_document(&self) -> Event<DidCloseTextDocument> {
		Event::new(self.client.clone())
	}

	/// A document was saved.
	pub fn on_did_save_text_document(&self) -> Event<DidSaveTextDocument> {
		Event::new(self.client.clone())
	}

	/// A document's content changed.
	pub fn on_did_change_text_document(&self) -> Event<DidChangeTextDocument> {
		Event::new(self.client.clone())
	}

	/// Folders were added or removed.
	pub fn on_did_change_workspace_folders(&self) -> Event<DidChangeWorkspaceFolders> {
		Event::new(self.client.clone())
	}

	/// Configuration changed.
	pub fn on_did_change_configuration(&self) -> Event<DidChangeConfiguration> {
		Event::new(self.client.clone())
	}

	/// Files were created.
	pub fn on_did_create_files(&self) -> Event<DidCreateFiles> {
		Event::new(self.client.clone())
	}

	/// Files were deleted.
	pub fn on_did_delete_files(&self) -> Event<DidDeleteFiles> {
		Event::new(self.client.clone())
	}

	/// Files were renamed.
	pub fn on_did_rename_files(&self) -> Event<DidRenameFiles> {
		Event::new(self.client.clone())
	}
}
