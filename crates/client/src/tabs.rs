//! Editor tab groups.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::events::{DidChangeTabGroups, DidChangeTabs, Event, TabChangeEvent};
use crate::{Client, Disposable, Result};

/// One editor tab.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tab {
	/// Tab label.
	pub label: String,
	/// The tab is the active one of its group.
	pub is_active: bool,
	/// The tab has unsaved changes.
	pub is_dirty: bool,
	/// The tab is pinned.
	pub is_pinned: bool,
	/// The tab is in preview mode.
	pub is_preview: bool,
	/// Owning group.
	pub group_id: i64,
	/// Host-specific description of the tab's content.
	pub input: Option<Value>,
}

/// A group of tabs shown in one view column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabGroup {
	/// The group has focus.
	pub is_active: bool,
	/// View column of the group.
	pub view_column: i32,
	/// Group id.
	pub group_id: i64,
	/// Tabs in display order.
	pub tabs: Vec<Tab>,
}

impl Default for TabGroup {
	fn default() -> Self {
		Self {
			is_active: false,
			view_column: 1,
			group_id: 0,
			tabs: Vec::new(),
		}
	}
}

impl TabGroup {
	/// The group's active tab, if any.
	pub fn active_tab(&self) -> Option<&Tab> {
		self.tabs.iter().find(|tab| tab.is_active)
	}
}

#[derive(Deserialize)]
struct Groups {
	#[serde(default)]
	groups: Vec<TabGroup>,
}

#[derive(Deserialize)]
struct ActiveGroup {
	#[serde(default)]
	group: Option<TabGroup>,
}

#[derive(Deserialize)]
struct Closed {
	#[serde(default)]
	success: bool,
}

/// Tab group operations of one client.
#[derive(Debug, Clone)]
pub struct TabGroups {
	client: Client,
}

impl TabGroups {
	pub(crate) fn new(client: Client) -> Self {
		Self { client }
	}

	/// Every tab group.
	pub fn all(&self) -> Result<Vec<TabGroup>> {
		Ok(self.client.request::<Groups>("window.tabGroups.all", json!({}))?.groups)
	}

	/// The focused group, if any.
	pub fn active_group(&self) -> Result<Option<TabGroup>> {
		Ok(self.client.request::<ActiveGroup>("window.tabGroups.activeTabGroup", json!({}))?.group)
	}

	/// Closes `tab`. Returns whether the host closed it.
	pub fn close_tab(&self, tab: &Tab, preserve_focus: bool) -> Result<bool> {
		let closed: Closed = self.client.request(
			"window.tabGroups.closeTab",
			json!({ "groupId": tab.group_id, "tabLabel": tab.label, "preserveFocus": preserve_focus }),
		)?;
		Ok(closed.success)
	}

	/// Closes `group` and its tabs. Returns whether the host closed it.
	pub fn close_group(&self, group: &TabGroup, preserve_focus: bool) -> Result<bool> {
		let closed: Closed = self.client.request(
			"window.tabGroups.closeGroup",
			json!({ "groupId": group.group_id, "preserveFocus": preserve_focus }),
		)?;
		Ok(closed.success)
	}

	/// Tabs opened, closed or changed.
	pub fn on_did_change_tabs(&self, handler: impl Fn(TabChangeEvent) + Send + Sync + 'static) -> Disposable {
		Event::<DidChangeTabs>::new(self.client.clone()).subscribe(handler)
	}

	/// Groups opened, closed or changed.
	pub fn on_did_change_tab_groups(&self, handler: impl Fn(TabChangeEvent) + Send + Sync + 'static) -> Disposable {
		Event::<DidChangeTabGroups>::new(self.client.clone()).subscribe(handler)
	}
}
