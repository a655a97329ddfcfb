use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use srv6_orchestrator::orchestrator::Mode;
use srv6_orchestrator::{orchestrator_main, OrchestratorArgs};

/// Runs the traffic-aware SRv6 path orchestrator.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args
{
	/// Which edges this process manages this run.
	#[arg(long, value_enum, default_value = "bidirectional")]
	mode: Mode,

	/// Run exactly one cycle, then exit, instead of looping until a signal.
	#[arg(long)]
	once: bool,

	/// Optional TOML file overriding the built-in defaults.
	#[arg(long)]
	config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode
{
	pretty_env_logger::init();
	let args = Args::parse();

	let result = orchestrator_main(OrchestratorArgs{ mode: args.mode, once: args.once, config_path: args.config }).await;
	match result
	{
		Ok(()) => ExitCode::SUCCESS,
		Err(e) =>
		{
			log::error!("{}", anyhow::Error::new(e).context("orchestrator exited"));
			ExitCode::FAILURE
		},
	}
}
