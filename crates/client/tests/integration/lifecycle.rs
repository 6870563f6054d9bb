use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use sockpuppet_client::{Client, ClientConfig, Error, SessionEvent};

use crate::common::{FakeHost, Reply, TIMEOUT, wait_until};

fn silent_on(method: &'static str) -> impl Fn(&sockpuppet_client::proto::Request) -> Option<Reply> + Send + Sync + 'static {
	move |request| (request.method == method).then_some(Reply::Silent)
}

#[test]
fn disconnect_fails_in_flight_calls() {
	let (client, host) = FakeHost::start_with(silent_on("window.showInputBox"));
	let pending = thread::spawn({
		let client = client.clone();
		move || client.call("window.showInputBox", json!({}))
	});
	assert!(wait_until(|| host.count("window.showInputBox") == 1));

	client.disconnect();
	let err = pending.join().unwrap().unwrap_err();
	assert!(matches!(err, Error::ConnectionLost(_)), "{err}");
	assert!(!client.is_connected());
	assert!(matches!(client.call("a.b", json!({})), Err(Error::NotConnected)));

	client.disconnect();
}

#[test]
fn host_hang_up_fails_in_flight_calls() {
	let (client, mut host) = FakeHost::start_with(silent_on("window.showQuickPick"));
	let pending = thread::spawn({
		let client = client.clone();
		move || client.call("window.showQuickPick", json!({"items": ["a", "b"]}))
	});
	assert!(wait_until(|| host.count("window.showQuickPick") == 1));

	host.hang_up();
	let err = pending.join().unwrap().unwrap_err();
	assert!(err.is_connection_error());
	assert!(wait_until(|| !client.is_connected()));
	assert!(matches!(client.call("a.b", json!({})), Err(Error::ConnectionLost(_))));
}

#[test]
fn event_loop_stops_on_disconnect() {
	let (client, _host) = FakeHost::start();
	let (tx, rx) = mpsc::channel();
	let _session = client.add_session_listener(move |event| {
		let _ = tx.send(event.name());
	});
	let _guard = client.add_event_listener("window.onDidChangeWindowState", |_| {});

	client.disconnect();
	let mut names = Vec::new();
	while let Ok(name) = rx.recv_timeout(TIMEOUT) {
		names.push(name);
		if name == "event-loop-stopped" {
			break;
		}
	}
	assert!(names.contains(&"event-loop-started"), "{names:?}");
	assert_eq!(names.last(), Some(&"event-loop-stopped"));
}

#[test]
fn reconnect_resubscribes_active_events() {
	let (client, first_host) = FakeHost::start();
	let (tx, rx) = mpsc::channel();
	let _changes = client.add_event_listener("workspace.onDidChangeTextDocument", move |data| {
		let _ = tx.send(data.clone());
	});
	let _terminals = client.add_event_listener("window.onDidOpenTerminal", |_| {});
	let dropped = client.add_event_listener("window.onDidCloseTerminal", |_| {});
	dropped.dispose();
	assert_eq!(first_host.subscribed(), ["window.onDidOpenTerminal", "workspace.onDidChangeTextDocument"]);

	client.disconnect();
	let second_host = FakeHost::attach(&client, |_| None);
	assert!(client.is_connected());
	assert_eq!(second_host.subscribed(), ["window.onDidOpenTerminal", "workspace.onDidChangeTextDocument"]);
	assert_eq!(second_host.count("events.subscribe"), 2);

	second_host.emit("workspace.onDidChangeTextDocument", json!({"uri": "file:///b.rs"}));
	assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), json!({"uri": "file:///b.rs"}));
}

#[test]
fn listeners_added_while_disconnected_subscribe_on_connect() {
	let client = Client::new(ClientConfig::new().pipe_path("/nonexistent/sockpuppet.sock"));
	let (tx, rx) = mpsc::channel();
	let _guard = client.add_event_listener("window.onDidChangeActiveTextEditor", move |data| {
		let _ = tx.send(data.clone());
	});
	assert!(client.has_listeners("window.onDidChangeActiveTextEditor"));

	let host = FakeHost::attach(&client, |_| None);
	assert_eq!(host.subscribed(), ["window.onDidChangeActiveTextEditor"]);
	host.emit("window.onDidChangeActiveTextEditor", json!(null));
	assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), json!(null));
}

#[test]
fn disconnect_from_inside_a_handler() {
	let (client, host) = FakeHost::start();
	let _guard = client.add_event_listener("test.shutdown", {
		let client = client.clone();
		move |_| client.disconnect()
	});

	host.emit("test.shutdown", json!({}));
	assert!(wait_until(|| !client.is_connected()));
}

#[test]
fn dropping_last_handle_closes_connection() {
	let (client, host) = FakeHost::start();
	let other = client.clone();
	drop(client);
	assert!(other.is_connected());
	drop(other);
	assert!(wait_until(|| host.peer_closed()));
}

#[test]
fn session_listener_panics_are_contained() {
	let (client, host) = FakeHost::start();
	let calls = Arc::new(Mutex::new(0));
	let _noisy = client.add_session_listener(|_| panic!("observer bug"));
	let _counting = client.add_session_listener({
		let calls = Arc::clone(&calls);
		move |event| {
			if matches!(event, SessionEvent::SubscriptionAck { .. }) {
				*calls.lock() += 1;
			}
		}
	});

	let _guard = client.add_event_listener("window.onDidOpenTerminal", |_| {});
	assert_eq!(*calls.lock(), 1);
	assert_eq!(host.count("events.subscribe"), 1);
}
