//! `window.*` methods and events.

use serde_json::json;

use crate::events::{
	DidChangeActiveTextEditor, DidChangeTerminalState, DidChangeTextEditorOptions, DidChangeTextEditorSelection, DidChangeTextEditorViewColumn,
	DidChangeTextEditorVisibleRanges, DidChangeVisibleTextEditors, DidChangeWindowState, DidCloseTerminal, DidOpenTerminal, Event,
};
use crate::tabs::TabGroups;
use crate::webview::{PanelOptions, WebviewPanel};
use crate::{Client, Result};

/// Window namespace of a client.
#[derive(Debug, Clone)]
pub struct Window {
	client: Client,
}

impl Window {
	pub(crate) fn new(client: Client) -> Self {
		Self { client }
	}

	/// Shows an information message. Returns the chosen item, `None` if dismissed.
	pub fn show_information_message(&self, message: &str, items: &[&str]) -> Result<Option<String>> {
		self.show_message("window.showInformationMessage", message, items)
	}

	/// Shows a warning message. Returns the chosen item, `None` if dismissed.
	pub fn show_warning_message(&self, message: &str, items: &[&str]) -> Result<Option<String>> {
		self.show_message("window.showWarningMessage", message, items)
	}

	/// Shows an error message. Returns the chosen item, `None` if dismissed.
	pub fn show_error_message(&self, message: &str, items: &[&str]) -> Result<Option<String>> {
		self.show_message("window.showErrorMessage", message, items)
	}

	fn show_message(&self, method: &str, message: &str, items: &[&str]) -> Result<Option<String>> {
		self.client.request(method, json!({ "message": message, "items": items }))
	}

	/// Tab groups.
	pub fn tab_groups(&self) -> TabGroups {
		TabGroups::new(self.client.clone())
	}

	/// Creates a webview panel showing `html`.
	pub fn create_webview_panel(&self, title: &str, html: &str, options: PanelOptions) -> Result<WebviewPanel> {
		WebviewPanel::create(&self.client, title, html, options)
	}

	/// The active editor changed.
	pub fn on_did_change_active_text_editor(&self) -> Event<DidChangeActiveTextEditor> {
		Event::new(self.client.clone())
	}

	/// An editor's selection changed.
	pub fn on_did_change_text_editor_selection(&self) -> Event<DidChangeTextEditorSelection> {
		Event::new(self.client.clone())
	}

	/// The visible editors changed.
	pub fn on_did_change_visible_text_editors(&self) -> Event<DidChangeVisibleTextEditors> {
		Event::new(self.client.clone())
	}

	/// A terminal opened.
	pub fn on_did_open_terminal(&self) -> Event<DidOpenTerminal> {
		Event::new(self.client.clone())
	}

	/// A terminal closed.
	pub fn on_did_close_terminal(&self) -> Event<DidCloseTerminal> {
		Event::new(self.client.clone())
	}

	/// A terminal's state changed.
	pub fn on_did_change_terminal_state(&self) -> Event<DidChangeTerminalState> {
		Event::new(self.client.clone())
	}

	/// An editor's visible ranges changed.
	pub fn on_did_change_text_editor_visible_ranges(&self) -> Event<DidChangeTextEditorVisibleRanges> {
		Event::new(self.client.clone())
	}

	/// An editor's options changed.
	pub fn on_did_change_text_editor_options(&self) -> Event<DidChangeTextEditorOptions> {
		Event::new(self.client.clone())
	}

	/// An editor moved to another column.
	pub fn on_did_change_text_editor_view_column(&self) -> Event<DidChangeTextEditorViewColumn> {
		Event::new(self.client.clone())
	}

	/// The editor window gained or lost focus.
	pub fn on_did_change_window_state(&self) -> Event<DidChangeWindowState> {
		Event::new(self.client.clone())
	}
}
