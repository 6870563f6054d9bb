use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sockpuppet")]
#[command(about = "Drive a running editor over its sockpuppet pipe")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Pipe or socket to connect to (defaults to VSCODE_SOCKPUPPET_PIPE, then the platform default)
	#[arg(long, short = 'p', value_name = "PATH", global = true)]
	pub pipe: Option<PathBuf>,

	/// Seconds to wait for each response
	#[arg(long, value_name = "SECS", global = true)]
	pub timeout: Option<f64>,

	/// Debug logging
	#[arg(long, short = 'v', global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
	/// Send one request and print its result
	Call {
		/// Method name, e.g. window.showInformationMessage
		method: String,
		/// Params as a JSON value
		#[arg(default_value = "{}")]
		params: String,
	},
	/// Print events as JSON lines until the host closes the connection
	Listen {
		/// Event names to subscribe to
		#[arg(required = true)]
		events: Vec<String>,
	},
	/// List the host's active subscriptions for this connection
	Subscriptions,
	/// List editor commands
	Commands {
		/// Leave out commands starting with an underscore
		#[arg(long)]
		filter_internal: bool,
	},
	/// Run an editor command
	Exec {
		/// Command identifier
		command: String,
		/// Positional arguments, each a JSON value
		args: Vec<String>,
	},
}
