//! `sockpuppet` binary: one-shot calls and event tailing against a running editor.

mod cli;

use std::io::Write;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use serde_json::{Value, json};
use sockpuppet_client::{Client, ClientConfig, SessionEvent};
use tracing::debug;

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = config(&cli)?;
	let path = config.resolve_pipe_path();
	debug!(pipe = %path.display(), "connecting");
	let client = Client::connect_with(config).with_context(|| format!("cannot reach the editor at {}", path.display()))?;

	match cli.command {
		Command::Call { method, params } => {
			let params = parse_json(&params).context("invalid params")?;
			let result = client.call(&method, params).with_context(|| format!("{method} failed"))?;
			print_pretty(&result)?;
		}
		Command::Listen { events } => listen(&client, &events),
		Command::Subscriptions => {
			for event in client.subscriptions().context("listing subscriptions failed")? {
				println!("{event}");
			}
		}
		Command::Commands { filter_internal } => {
			for command in client.get_commands(filter_internal).context("listing commands failed")? {
				println!("{command}");
			}
		}
		Command::Exec { command, args } => {
			let args = args
				.iter()
				.map(|arg| parse_json(arg).with_context(|| format!("invalid argument {arg:?}")))
				.collect::<anyhow::Result<Vec<_>>>()?;
			let result = client.execute_command(&command, args).with_context(|| format!("{command} failed"))?;
			print_pretty(&result)?;
		}
	}
	Ok(())
}

fn config(cli: &Cli) -> anyhow::Result<ClientConfig> {
	let mut config = ClientConfig::new();
	if let Some(pipe) = &cli.pipe {
		config = config.pipe_path(pipe.clone());
	}
	if let Some(secs) = cli.timeout {
		let timeout = Duration::try_from_secs_f64(secs).with_context(|| format!("invalid timeout {secs}"))?;
		config = config.request_timeout(Some(timeout));
	}
	Ok(config)
}

/// Parses a JSON value, accepting a bare word as a string.
fn parse_json(text: &str) -> anyhow::Result<Value> {
	match serde_json::from_str(text) {
		Ok(value) => Ok(value),
		Err(_) if !text.trim_start().starts_with(['{', '[', '"']) && text.chars().all(|c| c.is_alphanumeric() || "._-/:".contains(c)) => {
			Ok(Value::String(text.to_owned()))
		}
		Err(e) => Err(e.into()),
	}
}

fn print_pretty(value: &Value) -> anyhow::Result<()> {
	let text = serde_json::to_string_pretty(value)?;
	println!("{text}");
	Ok(())
}

/// Prints `{"event", "data"}` lines until the host hangs up.
fn listen(client: &Client, events: &[String]) {
	let (stopped_tx, stopped) = mpsc::channel();
	let _session = client.add_session_listener(move |event| {
		if matches!(event, SessionEvent::EventLoopStopped) {
			let _ = stopped_tx.send(());
		}
	});

	let _guards: Vec<_> = events
		.iter()
		.map(|name| {
			let event = name.clone();
			client.add_event_listener(name, move |data| {
				let line = json!({ "event": event, "data": data });
				let mut stdout = std::io::stdout().lock();
				let _ = writeln!(stdout, "{line}").and_then(|()| stdout.flush());
			})
		})
		.collect();
	debug!(count = events.len(), "listening");

	let _ = stopped.recv();
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("sockpuppet_client=debug,sockpuppet=debug,info")
		} else {
			EnvFilter::new("warn")
		}
	});
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
