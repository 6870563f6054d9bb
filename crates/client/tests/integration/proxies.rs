use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use sockpuppet_client::proto::Request;
use sockpuppet_client::{Client, Error, PanelOptions, ViewState, WatcherOptions, WebviewPanel};

use crate::common::{FakeHost, Reply, TIMEOUT, wait_until};

const MESSAGES: &str = "webview.onDidReceiveMessage";
const DISPOSALS: &str = "webview.onDidDispose";
const QUIET: Duration = Duration::from_millis(50);

fn editor_host(request: &Request) -> Option<Reply> {
	match request.method.as_str() {
		"window.createWebviewPanel" => Some(Reply::Result(json!({"visible": true, "active": true}))),
		"window.asWebviewUri" => Some(Reply::Result(json!({"webviewUri": "vscode-webview://panel/tmp/logo.png"}))),
		"workspace.createFileSystemWatcher" => Some(Reply::Result(json!({"watcherId": "w1"}))),
		"window.tabGroups.all" => Some(Reply::Result(json!({"groups": [{
			"isActive": true,
			"viewColumn": 1,
			"groupId": 0,
			"tabs": [
				{"label": "main.rs", "isActive": true, "groupId": 0},
				{"label": "lib.rs", "isDirty": true, "groupId": 0}
			]
		}]}))),
		"window.tabGroups.closeTab" => Some(Reply::Result(json!({"success": true}))),
		_ => None,
	}
}

fn panel(client: &Client, id: &str) -> WebviewPanel {
	let options = PanelOptions {
		id: Some(id.to_owned()),
		..PanelOptions::default()
	};
	client.window().create_webview_panel(id, "<h1>hi</h1>", options).unwrap()
}

fn messages_of(panel: &WebviewPanel) -> (mpsc::Receiver<Value>, sockpuppet_client::Disposable) {
	let (tx, rx) = mpsc::channel();
	let guard = panel
		.on_did_receive_message(move |message| {
			let _ = tx.send(message.clone());
		})
		.unwrap();
	(rx, guard)
}

#[test]
fn panel_creation_request() {
	let (client, host) = FakeHost::start_with(editor_host);
	let panel = panel(&client, "A");

	assert_eq!(panel.view_type(), "sockpuppet.webview.A");
	assert_eq!(panel.title(), "A");
	assert_eq!(panel.view_state(), ViewState { visible: true, active: true });
	assert_eq!(
		host.requests()[0].params,
		json!({
			"id": "A",
			"viewType": "sockpuppet.webview.A",
			"title": "A",
			"showOptions": 1,
			"html": "<h1>hi</h1>",
			"options": {"enableScripts": true, "retainContextWhenHidden": false, "localResourceRoots": []},
		})
	);

	panel.update_title("Renamed").unwrap();
	assert_eq!(panel.title(), "Renamed");
	assert_eq!(host.requests()[1].params, json!({"id": "A", "title": "Renamed"}));
}

#[test]
fn messages_route_to_their_panel() {
	let (client, host) = FakeHost::start_with(editor_host);
	let a = panel(&client, "A");
	let b = panel(&client, "B");
	let (a_rx, _a_guard) = messages_of(&a);
	let (b_rx, _b_guard) = messages_of(&b);
	assert_eq!(host.count_for("events.subscribe", MESSAGES), 1);

	host.emit(MESSAGES, json!({"id": "A", "message": "one"}));
	host.emit(MESSAGES, json!({"id": "B", "message": "two"}));
	host.emit(MESSAGES, json!({"id": "C", "message": "nobody"}));

	assert_eq!(a_rx.recv_timeout(TIMEOUT).unwrap(), json!("one"));
	assert_eq!(b_rx.recv_timeout(TIMEOUT).unwrap(), json!("two"));
	assert!(a_rx.recv_timeout(QUIET).is_err());
	assert!(b_rx.try_recv().is_err());
}

#[test]
fn disposed_panel_stops_receiving_and_last_one_unsubscribes() {
	let (client, host) = FakeHost::start_with(editor_host);
	let a = panel(&client, "A");
	let b = panel(&client, "B");
	let (a_rx, _a_guard) = messages_of(&a);
	let (b_rx, _b_guard) = messages_of(&b);

	a.dispose().unwrap();
	assert!(a.is_disposed());
	assert_eq!(host.count("window.disposeWebviewPanel"), 1);
	assert_eq!(host.count_for("events.unsubscribe", MESSAGES), 0);

	host.emit(MESSAGES, json!({"id": "A", "message": "late"}));
	host.emit(MESSAGES, json!({"id": "B", "message": "still here"}));
	assert_eq!(b_rx.recv_timeout(TIMEOUT).unwrap(), json!("still here"));
	assert!(a_rx.try_recv().is_err());
	assert!(matches!(a.post_message(&json!({})), Err(Error::Disposed { .. })));

	b.dispose().unwrap();
	assert_eq!(host.count_for("events.unsubscribe", MESSAGES), 1);
	assert!(!client.has_listeners(MESSAGES));
}

#[test]
fn host_closing_a_panel_runs_dispose_handlers() {
	let (client, host) = FakeHost::start_with(editor_host);
	let panel = panel(&client, "A");
	let (tx, rx) = mpsc::channel();
	let _closed = panel.on_did_dispose(move || {
		let _ = tx.send(());
	});
	assert_eq!(host.count_for("events.subscribe", DISPOSALS), 1);

	host.emit(DISPOSALS, json!({"id": "A"}));
	rx.recv_timeout(TIMEOUT).unwrap();
	assert!(panel.is_disposed());
	assert!(matches!(panel.post_message(&json!("hi")), Err(Error::Disposed { .. })));
	assert!(wait_until(|| host.count_for("events.unsubscribe", DISPOSALS) == 1));

	let (tx, rx) = mpsc::channel();
	let _late = panel.on_did_dispose(move || {
		let _ = tx.send(());
	});
	assert!(rx.try_recv().is_ok());

	drop(panel);
	assert_eq!(host.count("window.disposeWebviewPanel"), 0);
}

#[test]
fn dispose_handlers_registered_during_host_dispose_run_once() {
	let (client, host) = FakeHost::start_with(editor_host);
	let panel = panel(&client, "A");
	let runs = Arc::new(AtomicUsize::new(0));
	let counter = |runs: &Arc<AtomicUsize>| {
		let runs = Arc::clone(runs);
		move || {
			runs.fetch_add(1, Ordering::SeqCst);
		}
	};
	let mut guards = vec![panel.on_did_dispose(counter(&runs))];

	host.emit(DISPOSALS, json!({"id": "A"}));
	let deadline = Instant::now() + TIMEOUT;
	while !panel.is_disposed() && Instant::now() < deadline {
		guards.push(panel.on_did_dispose(counter(&runs)));
	}
	assert!(panel.is_disposed());
	for _ in 0..10 {
		guards.push(panel.on_did_dispose(counter(&runs)));
	}

	assert!(wait_until(|| runs.load(Ordering::SeqCst) == guards.len()));
	assert!(wait_until(|| host.count_for("events.unsubscribe", DISPOSALS) == 1));
	assert_eq!(host.count_for("events.subscribe", DISPOSALS), 1);
	assert!(!client.has_listeners(DISPOSALS));
}

#[test]
fn void_update_succeeds() {
	let (client, host) = FakeHost::start_with(|request| match request.method.as_str() {
		"window.updateWebviewPanel" | "window.disposeWebviewPanel" => Some(Reply::Raw(json!({"id": request.id}).to_string())),
		_ => editor_host(request),
	});
	let panel = panel(&client, "A");

	panel.update_title("Renamed").unwrap();
	assert_eq!(panel.title(), "Renamed");
	panel.dispose().unwrap();
	assert_eq!(host.count("window.disposeWebviewPanel"), 1);
}

#[test]
fn view_state_changes_update_the_panel() {
	let (client, host) = FakeHost::start_with(editor_host);
	let panel = panel(&client, "A");
	let (tx, rx) = mpsc::channel();
	let _guard = panel.on_did_change_view_state(move |state| {
		let _ = tx.send(state);
	});

	host.emit("webview.onDidChangeViewState", json!({"id": "A", "visible": false, "active": false}));
	assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ViewState::default());
	assert_eq!(panel.view_state(), ViewState::default());
}

#[test]
fn webview_uri_conversion() {
	let (client, host) = FakeHost::start_with(editor_host);
	let panel = panel(&client, "A");

	let uri = panel.as_webview_uri("/tmp/logo.png").unwrap();
	assert_eq!(uri, "vscode-webview://panel/tmp/logo.png");
	let request = host.requests().into_iter().find(|r| r.method == "window.asWebviewUri").unwrap();
	assert_eq!(request.params, json!({"id": "A", "uri": "file:///tmp/logo.png"}));
}

#[test]
fn watcher_lifecycle() {
	let (client, host) = FakeHost::start_with(editor_host);
	let options = WatcherOptions {
		ignore_delete: true,
		..WatcherOptions::default()
	};
	let watcher = client.workspace().create_file_system_watcher("**/*.rs", options).unwrap();
	assert_eq!(watcher.id(), "w1");
	assert_eq!(
		host.requests()[0].params,
		json!({
			"globPattern": "**/*.rs",
			"ignoreCreateEvents": false,
			"ignoreChangeEvents": false,
			"ignoreDeleteEvents": true,
		})
	);

	let (tx, rx) = mpsc::channel();
	let _created = watcher
		.on_did_create(move |uri| {
			let _ = tx.send(uri.to_owned());
		})
		.unwrap();
	assert_eq!(host.subscribed(), ["watcher.w1.onCreate"]);
	assert!(matches!(watcher.on_did_delete(|_| {}), Err(Error::EventIgnored { ref event }) if event == "watcher.w1.onDelete"));

	host.emit("watcher.w1.onCreate", json!({"uri": "file:///src/new.rs"}));
	assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "file:///src/new.rs");

	watcher.dispose().unwrap();
	assert!(host.subscribed().is_empty());
	let dispose = host.requests().into_iter().find(|r| r.method == "workspace.disposeFileSystemWatcher").unwrap();
	assert_eq!(dispose.params, json!({"watcherId": "w1"}));
	assert!(matches!(watcher.on_did_change(|_| {}), Err(Error::Disposed { .. })));

	drop(watcher);
	assert_eq!(host.count("workspace.disposeFileSystemWatcher"), 1);
}

#[test]
fn tab_groups_queries_and_events() {
	let (client, host) = FakeHost::start_with(editor_host);
	let tabs = client.window().tab_groups();

	let groups = tabs.all().unwrap();
	assert_eq!(groups.len(), 1);
	let active = groups[0].active_tab().unwrap();
	assert_eq!(active.label, "main.rs");
	assert!(groups[0].tabs[1].is_dirty);

	assert!(tabs.close_tab(&groups[0].tabs[1], false).unwrap());
	let close = host.requests().into_iter().find(|r| r.method == "window.tabGroups.closeTab").unwrap();
	assert_eq!(close.params, json!({"groupId": 0, "tabLabel": "lib.rs", "preserveFocus": false}));

	let (tx, rx) = mpsc::channel();
	let _changes = tabs.on_did_change_tabs(move |change| {
		let _ = tx.send(change);
	});
	host.emit("window.onDidChangeTabs", json!({"closed": [{"label": "lib.rs"}]}));
	let change = rx.recv_timeout(TIMEOUT).unwrap();
	assert!(change.opened.is_empty());
	assert_eq!(change.closed, [json!({"label": "lib.rs"})]);
}

#[test]
fn clients_keep_separate_proxy_tables() {
	let (first, first_host) = FakeHost::start_with(editor_host);
	let (second, second_host) = FakeHost::start_with(editor_host);
	let first_panel = panel(&first, "A");
	let second_panel = panel(&second, "A");
	let (first_rx, _first_guard) = messages_of(&first_panel);
	let (second_rx, _second_guard) = messages_of(&second_panel);

	first_host.emit(MESSAGES, json!({"id": "A", "message": "for first"}));
	assert_eq!(first_rx.recv_timeout(TIMEOUT).unwrap(), json!("for first"));
	assert!(second_rx.recv_timeout(QUIET).is_err());

	second_host.emit(MESSAGES, json!({"id": "A", "message": "for second"}));
	assert_eq!(second_rx.recv_timeout(TIMEOUT).unwrap(), json!("for second"));
	assert!(first_rx.try_recv().is_err());
}
