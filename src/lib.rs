/*!
srv6-orchestrator
=====

This crate provides the library half of a traffic-aware SRv6 path
orchestrator for a multi-hop IPv6 router mesh: a topology model, a
utilization sampler, a path planner, a segment translator, a remote table
applier, and the orchestration loop and one-shot provisioner that drive
them. The two binaries in `src/bin/` are thin `clap`-driven wrappers around
`orchestrator_main` and `provisioner_main` below.

# Usage

This crate is `srv6-orchestrator`. The library is consumed by its own
binaries; it is not intended to be published.

```toml
[dependencies]
srv6-orchestrator = { path = "." }
```
*/

use std::path::PathBuf;

use log::{error, info};

use crate::config::{Config, Edge};
use crate::orchestrator::{Mode, Orchestrator};
use crate::sampler::RrdUtilizationSource;
use crate::shell::Ssh2Transport;

pub mod applier;
pub mod config;
pub mod decision;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod provisioner;
pub mod reference_topology;
pub mod sampler;
pub mod segment;
pub mod shell;
pub mod stats;
pub mod topology;

/// Arguments accepted by the orchestrator binary, independent of how they
/// were parsed (kept separate from the `clap::Parser` struct in
/// `src/bin/srv6-orchestrator.rs` so the library has no direct `clap`
/// dependency in its public surface beyond the enums that are genuinely
/// part of the domain, `Mode` and `Edge`).
pub struct OrchestratorArgs
{
	pub mode: Mode,
	pub once: bool,
	pub config_path: Option<PathBuf>,
}

/// Builds the configured `Orchestrator` and runs it to completion (one cycle
/// if `args.once`, otherwise until SIGINT/SIGTERM). Returns an error for
/// anything that should set a non-zero exit code; `main` is responsible for
/// reporting it.
pub async fn orchestrator_main(args: OrchestratorArgs) -> error::Result<()>
{
	let config = Config::load(args.config_path.as_deref())?;
	let password = resolve_password(&config)?;
	let mut config = config;
	config.shell_password = Some(password);

	let topology = reference_topology::build(&config);
	let source = RrdUtilizationSource::new(
		config::default_rrd_paths(),
		config.sample_window_seconds,
		std::time::Duration::from_secs(10),
	);
	let transport = Ssh2Transport;
	let mut orchestrator = Orchestrator::new(config, topology, source, transport);

	let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
	tokio::spawn(async move
	{
		wait_for_shutdown_signal().await;
		let _ = shutdown_tx.send(());
	});

	info!("starting orchestrator in {:?} mode (once={})", args.mode, args.once);
	orchestrator.run(args.mode, args.once, shutdown_rx).await
}

/// Arguments accepted by the provisioner binary.
pub struct ProvisionerArgs
{
	pub action: ProvisionerAction,
	pub edge: Edge,
	pub config_path: Option<PathBuf>,
	pub assume_yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProvisionerAction
{
	Setup,
	Verify,
	Cleanup,
}

/// Runs one provisioner action against one edge (spec.md §4.7).
pub fn provisioner_main(args: ProvisionerArgs) -> error::Result<()>
{
	let config = Config::load(args.config_path.as_deref())?;
	let password = resolve_password(&config)?;

	let mut config = config;
	config.shell_password = Some(password);
	let transport = Ssh2Transport;
	let mut session = provisioner::connect(&transport, &config, args.edge)?;

	let tables = config.tables_for(args.edge);
	let table_marks = [tables[0].mark, tables[1].mark];

	match args.action
	{
		ProvisionerAction::Setup =>
		{
			let tables_ok = provisioner::setup_tables_and_rules(&mut session, tables)?;
			let classifier_ok = provisioner::setup_classifier(&mut session, args.edge, &config.flow_label_values, config.default_mark, &table_marks)?;
			if !tables_ok || !classifier_ok
			{
				error!("provisioning {:?} completed with one or more failures; see warnings above", args.edge);
				return Err(error::OrchestratorError::Config("provisioning incomplete".to_string()));
			}
			info!("provisioning of {:?} complete", args.edge);
		},
		ProvisionerAction::Verify =>
		{
			let report = provisioner::verify(&mut session, args.edge, tables, &config.flow_label_values, config.default_mark)?;
			info!("verification of {:?}: tables_ok={} rules_ok={} classifier_ok={}", args.edge, report.tables_ok, report.rules_ok, report.classifier_ok);
			if !report.all_ok()
			{
				return Err(error::OrchestratorError::Config(format!("{:?} failed verification", args.edge)));
			}
		},
		ProvisionerAction::Cleanup =>
		{
			if !args.assume_yes && !confirm_cleanup(args.edge)?
			{
				info!("cleanup of {:?} cancelled", args.edge);
				return Ok(());
			}
			provisioner::cleanup(&mut session, args.edge, tables)?;
			info!("cleanup of {:?} complete", args.edge);
		},
	}
	Ok(())
}

/// If `shell_password` is absent from config, prompts on a terminal
/// (spec.md §6, "Credential acquisition"); otherwise fails with a
/// `ConfigError`, since a non-interactive process has no other source.
fn resolve_password(config: &Config) -> error::Result<String>
{
	if let Some(password) = &config.shell_password
	{
		return Ok(password.clone());
	}
	rpassword::prompt_password(format!("SSH password for {}: ", config.shell_user))
		.map_err(|e| error::OrchestratorError::Config(format!("could not read password: {}", e)))
}

/// Cleanup removes fwmark rules and the classifier table from a router;
/// asks for confirmation on a terminal before doing so unless the caller
/// passed `--yes` (spec.md §4.7, "Cleanup is destructive").
fn confirm_cleanup(edge: Edge) -> error::Result<bool>
{
	let reply = rprompt::prompt_reply(format!("Remove SRv6 tables and classifier rules from {:?}? [y/N] ", edge))
		.map_err(|e| error::OrchestratorError::Config(format!("could not read confirmation: {}", e)))?;
	Ok(matches!(reply.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn wait_for_shutdown_signal()
{
	let ctrl_c = async { tokio::signal::ctrl_c().await.ok(); };

	#[cfg(unix)]
	let terminate = async
	{
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
		{
			Ok(mut stream) => { stream.recv().await; },
			Err(_) => std::future::pending::<()>().await,
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select!
	{
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
