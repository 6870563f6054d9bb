use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use sockpuppet_client::proto::RequestId;
use sockpuppet_client::{Client, ClientConfig, Error, SessionEvent};

use crate::common::{FakeHost, Reply, TIMEOUT, wait_until};

#[test]
fn round_trip_returns_result() {
	let (client, host) = FakeHost::start_with(|request| match request.method.as_str() {
		"window.showInformationMessage" => Some(Reply::Result(json!("OK"))),
		_ => None,
	});

	let choice = client.window().show_information_message("Hello", &["OK", "Cancel"]).unwrap();
	assert_eq!(choice.as_deref(), Some("OK"));

	let requests = host.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].id, RequestId(1));
	assert_eq!(requests[0].params, json!({"message": "Hello", "items": ["OK", "Cancel"]}));
}

#[test]
fn dismissed_message_is_none() {
	let (client, _host) = FakeHost::start();
	assert_eq!(client.window().show_warning_message("careful", &[]).unwrap(), None);
}

#[test]
fn host_error_is_not_a_connection_error() {
	let (client, _host) = FakeHost::start_with(|request| match request.method.as_str() {
		"fs.readFile" => Some(Reply::Error(json!("ENOENT: no such file"))),
		"fs.stat" => Some(Reply::Error(json!({"message": "EACCES", "code": 13}))),
		_ => None,
	});

	let err = client.call("fs.readFile", json!({"uri": "file:///missing"})).unwrap_err();
	assert!(err.is_host_error());
	assert!(!err.is_connection_error());
	assert_eq!(err.host_message(), Some("ENOENT: no such file"));

	let err = client.call("fs.stat", json!({})).unwrap_err();
	assert_eq!(err.host_message(), Some("EACCES"));
	assert!(client.is_connected());
}

#[test]
fn call_without_connection_fails_fast() {
	let client = Client::new(ClientConfig::new().pipe_path("/nonexistent/sockpuppet.sock"));
	let err = client.call("window.showInformationMessage", json!({"message": "hi"})).unwrap_err();
	assert!(matches!(err, Error::NotConnected));
	assert!(err.is_connection_error());
}

#[test]
fn connect_to_missing_pipe_reports_path() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("absent.sock");
	let err = Client::connect_with(ClientConfig::new().pipe_path(&path)).unwrap_err();
	match err {
		Error::Connect { path: tried, .. } => assert_eq!(tried, path),
		other => panic!("unexpected error: {other}"),
	}
}

#[test]
fn connect_by_path() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("host.sock");
	let listener = std::os::unix::net::UnixListener::bind(&path).unwrap();

	let client = Client::connect_with(ClientConfig::new().pipe_path(&path)).unwrap();
	let (_stream, _) = listener.accept().unwrap();
	assert!(client.is_connected());
	assert_eq!(client.pipe_path(), path.as_path());

	client.connect().unwrap();
	assert!(client.is_connected());
}

#[test]
fn concurrent_callers_each_get_their_response() {
	let (client, _host) = FakeHost::start_with(|request| match request.method.as_str() {
		// Interleave an event frame ahead of every response.
		"test.echo" => Some(Reply::Raw(format!(
			"{}\n{}",
			json!({"type": "event", "event": "test.noise", "data": {}}),
			json!({"id": request.id, "result": request.params}),
		))),
		_ => None,
	});

	let workers: Vec<_> = (0..8)
		.map(|worker| {
			let client = client.clone();
			thread::spawn(move || {
				for n in 0..25 {
					let params = json!({"worker": worker, "n": n});
					assert_eq!(client.call("test.echo", params.clone()).unwrap(), params);
				}
			})
		})
		.collect();
	for worker in workers {
		worker.join().unwrap();
	}
}

#[test]
fn responses_resolve_out_of_order() {
	let (client, host) = FakeHost::start_with(|request| match request.method.as_str() {
		"slow.first" | "slow.second" => Some(Reply::Silent),
		_ => None,
	});

	let first = thread::spawn({
		let client = client.clone();
		move || client.call("slow.first", json!({}))
	});
	assert!(wait_until(|| host.count("slow.first") == 1));
	let second = thread::spawn({
		let client = client.clone();
		move || client.call("slow.second", json!({}))
	});
	assert!(wait_until(|| host.count("slow.second") == 1));

	let ids: Vec<RequestId> = host.requests().iter().map(|r| r.id).collect();
	host.send_line(&json!({"id": ids[1], "result": "second"}).to_string());
	host.send_line(&json!({"id": ids[0], "result": "first"}).to_string());

	assert_eq!(first.join().unwrap().unwrap(), json!("first"));
	assert_eq!(second.join().unwrap().unwrap(), json!("second"));
}

#[test]
fn timeout_abandons_call_and_drops_late_response() {
	let (client, host) = FakeHost::start_with(|request| match request.method.as_str() {
		"slow.op" => Some(Reply::Silent),
		_ => None,
	});

	let err = client.call_timeout("slow.op", json!({}), Duration::from_millis(50)).unwrap_err();
	assert!(matches!(err, Error::RequestTimeout { ref method } if method == "slow.op"));

	let late = host.requests()[0].id;
	host.send_line(&json!({"id": late, "result": "too late"}).to_string());
	assert_eq!(client.call("fast.op", json!({})).unwrap(), Value::Null);
}

#[test]
fn void_response_returns_null() {
	let (client, _host) = FakeHost::start_with(|request| match request.method.as_str() {
		"window.void" => Some(Reply::Raw(json!({"id": request.id}).to_string())),
		_ => Some(Reply::Result(json!("OK"))),
	});

	assert_eq!(client.call("window.void", json!({})).unwrap(), Value::Null);
	assert!(client.is_connected());
	assert_eq!(client.call("ok.method", json!({})).unwrap(), json!("OK"));
}

#[test]
fn malformed_frame_is_dropped_and_reported() {
	let (client, host) = FakeHost::start();
	let (tx, rx) = mpsc::channel();
	let _session = client.add_session_listener(move |event| {
		if let SessionEvent::FrameDropped { reason } = event {
			let _ = tx.send(reason.clone());
		}
	});
	// Drop reports flow through the event router, which starts with the first listener.
	let _listener = client.add_event_listener("test.started", |_| {});

	host.send_line("this is not json");
	let reason = rx.recv_timeout(TIMEOUT).unwrap();
	assert!(!reason.is_empty());
	assert!(client.is_connected());
	assert_eq!(client.call("still.works", json!({})).unwrap(), Value::Null);
}

#[test]
fn typed_request_and_command_helpers() {
	let (client, host) = FakeHost::start_with(|request| match request.method.as_str() {
		"commands.getCommands" => Some(Reply::Result(json!(["editor.action.formatDocument", "workbench.action.files.save"]))),
		"commands.executeCommand" => Some(Reply::Result(json!({"ran": request.params["command"]}))),
		_ => None,
	});

	let commands = client.get_commands(true).unwrap();
	assert_eq!(commands, ["editor.action.formatDocument", "workbench.action.files.save"]);
	let result = client.execute_command("workbench.action.openSettings", vec![json!("editor.fontSize")]).unwrap();
	assert_eq!(result, json!({"ran": "workbench.action.openSettings"}));

	let requests = host.requests();
	assert_eq!(requests[0].params, json!({"filterInternal": true}));
	assert_eq!(
		requests[1].params,
		json!({"command": "workbench.action.openSettings", "args": ["editor.fontSize"]})
	);

	let err = client.request::<Vec<String>>("commands.executeCommand", json!({"command": "x"})).unwrap_err();
	assert!(matches!(err, Error::Deserialize(_)));
}

#[test]
fn workspace_folders_null_is_empty() {
	let (client, _host) = FakeHost::start();
	assert!(client.workspace().workspace_folders().unwrap().is_empty());
}

#[tokio::test]
async fn async_call_resolves_on_the_reader() {
	let (client, _host) = FakeHost::start_with(|request| match request.method.as_str() {
		"env.clipboard.readText" => Some(Reply::Result(json!("clipboard contents"))),
		_ => None,
	});
	let text = client.call_async("env.clipboard.readText", json!({})).await.unwrap();
	assert_eq!(text, json!("clipboard contents"));
}
