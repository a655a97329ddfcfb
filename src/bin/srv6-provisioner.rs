use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use srv6_orchestrator::config::Edge;
use srv6_orchestrator::{provisioner_main, ProvisionerAction, ProvisionerArgs};

/// One-shot installer/verifier for the policy-routing tables, fwmark rules,
/// and Flow-Label classifier on one edge router.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args
{
	/// Create the tables, rules, and classifier if they are not already present.
	#[arg(long, conflicts_with_all = ["verify", "cleanup"])]
	setup: bool,

	/// Check that the tables, rules, and classifier are all present.
	#[arg(long, conflicts_with = "cleanup")]
	verify: bool,

	/// Remove the rules and classifier installed by `--setup`.
	#[arg(long)]
	cleanup: bool,

	/// Which edge to provision.
	#[arg(long, value_enum)]
	edge: Edge,

	/// Optional TOML file overriding the built-in defaults.
	#[arg(long)]
	config: Option<PathBuf>,

	/// Skip the confirmation prompt before `--cleanup`.
	#[arg(long)]
	yes: bool,
}

impl Args
{
	fn action(&self) -> Option<ProvisionerAction>
	{
		if self.setup { Some(ProvisionerAction::Setup) }
		else if self.verify { Some(ProvisionerAction::Verify) }
		else if self.cleanup { Some(ProvisionerAction::Cleanup) }
		else { None }
	}
}

fn main() -> ExitCode
{
	pretty_env_logger::init();
	let args = Args::parse();

	let Some(action) = args.action() else
	{
		log::error!("exactly one of --setup, --verify, --cleanup is required");
		return ExitCode::FAILURE;
	};

	let result = provisioner_main(ProvisionerArgs{ action, edge: args.edge, config_path: args.config, assume_yes: args.yes });
	match result
	{
		Ok(()) => ExitCode::SUCCESS,
		Err(e) =>
		{
			log::error!("{}", anyhow::Error::new(e).context("provisioner exited"));
			ExitCode::FAILURE
		},
	}
}
