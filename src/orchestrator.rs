/*!

The orchestration loop (C6).

Each cycle: refresh link weights from C2, plan three forward paths with C3,
reverse them into return paths, translate both directions with C4 across
all three tiers, then push the resulting tables to whichever edge routers
the active `Mode` calls for with C5. Statistics and change detection are
folded in last. This module owns the only mutable state in the process —
the topology's weights and the `Stats` history — everything it calls is a
pure transformer over values (spec.md §3, "Ownership").

*/

use std::time::{Duration, Instant};

use chrono::Utc;
use log::{info, warn};

use crate::config::{Config, Edge};
use crate::decision::{DecisionKey, DirectionKind, TableDecision, TIER_NAMES};
use crate::error::{OrchestratorError, Result};
use crate::planner::{plan_paths, InflationStrategy};
use crate::sampler::UtilizationSource;
use crate::segment::{translate, Direction};
use crate::shell::ShellTransport;
use crate::stats::Stats;
use crate::topology::Topology;

/// Which edges a cycle actually reaches. `AnalyzeOnce` never opens a shell
/// session at all — it computes and logs the would-be decisions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode
{
	Bidirectional,
	ForwardOnly,
	AnalyzeOnce,
}

/// What one cycle produced, independent of whether it was applied anywhere.
/// Returned so callers (library consumers, tests, `--once` runs) can inspect
/// a cycle's outcome without re-deriving it from logs.
#[derive(Debug, Clone)]
pub struct CycleReport
{
	pub forward_decisions: Vec<TableDecision>,
	pub return_decisions: Vec<TableDecision>,
	pub samples_updated: usize,
	pub samples_missing: usize,
	pub forward_applied: bool,
	pub return_applied: bool,
}

pub struct Orchestrator<U, T>
{
	config: Config,
	topology: Topology,
	source: U,
	transport: T,
	stats: Stats,
}

impl<U: UtilizationSource, T: ShellTransport> Orchestrator<U, T>
{
	pub fn new(config: Config, topology: Topology, source: U, transport: T) -> Self
	{
		let stats = Stats::new(50);
		Orchestrator{ config, topology, source, transport, stats }
	}

	pub fn stats(&self) -> &Stats
	{
		&self.stats
	}

	/// Runs exactly one cycle (spec.md §4.6, steps 1-9). Sampling failures
	/// never abort the cycle; a connection failure on one edge does not
	/// prevent the other edge from being attempted.
	pub fn run_cycle(&mut self, mode: Mode) -> Result<CycleReport>
	{
		let started = Instant::now();
		let now = Utc::now();

		let counts = crate::sampler::update_weights(&mut self.topology, &self.source, self.config.weight_floor_epsilon);

		let forward_paths = plan_paths(
			&self.topology,
			self.topology.ingress,
			self.topology.egress,
			self.config.path_count,
			&self.config.weight_multipliers,
			InflationStrategy::Multiplicative,
		);
		if forward_paths.is_empty()
		{
			return Err(OrchestratorError::NoPath(self.topology.ingress, self.topology.egress));
		}

		// A tier whose path hits a hop with no endpoint mapping is dropped, not
		// fatal to the cycle — the other tiers still apply (spec.md §8, S4).
		let mut forward_decisions = Vec::with_capacity(forward_paths.len());
		let mut return_decisions = Vec::with_capacity(forward_paths.len());
		for (tier, path) in forward_paths.iter().enumerate()
		{
			let tier_name = TIER_NAMES.get(tier).copied().unwrap_or("tier-extra");
			let forward_table = &self.config.ingress_tables[tier.min(self.config.ingress_tables.len() - 1)];
			match translate(&self.topology, path, Direction::Forward)
			{
				Ok(forward_segments) => forward_decisions.push(TableDecision{
					key: DecisionKey{ direction: DirectionKind::Forward, tier: tier_name },
					table_id: forward_table.id,
					table_name: forward_table.name.clone(),
					path: path.clone(),
					segments: forward_segments,
					cost: path.cost,
				}),
				Err(e) => warn!("tier {} dropped from forward direction: {}", tier_name, e),
			}

			let return_path = path.reversed();
			let return_table = &self.config.egress_tables[tier.min(self.config.egress_tables.len() - 1)];
			match translate(&self.topology, &return_path, Direction::Return)
			{
				Ok(return_segments) => return_decisions.push(TableDecision{
					key: DecisionKey{ direction: DirectionKind::Return, tier: tier_name },
					table_id: return_table.id,
					table_name: return_table.name.clone(),
					path: return_path,
					segments: return_segments,
					cost: path.cost,
				}),
				Err(e) => warn!("tier {} dropped from return direction: {}", tier_name, e),
			}
		}

		let mut forward_applied = false;
		let mut return_applied = false;

		let tier_count = self.config.ingress_tables.len();

		if mode != Mode::AnalyzeOnce
		{
			match crate::applier::apply_decisions(&self.transport, &self.config, self.config.address_for(Edge::Ingress), &self.config.forward_prefix, &forward_decisions)
			{
				Ok(report) =>
				{
					forward_applied = report.all_succeeded(forward_decisions.len());
					info!("{} of {} tables updated on forward", report.applied.len(), tier_count);
				},
				Err(e) => warn!("forward direction not applied this cycle: {}", e),
			}

			if mode == Mode::Bidirectional
			{
				match crate::applier::apply_decisions(&self.transport, &self.config, self.config.address_for(Edge::Egress), &self.config.return_prefix, &return_decisions)
				{
					Ok(report) =>
					{
						return_applied = report.all_succeeded(return_decisions.len());
						info!("{} of {} tables updated on return", report.applied.len(), tier_count);
					},
					Err(e) => warn!("return direction not applied this cycle: {}", e),
				}
			}
		}

		let mut recorded: Vec<TableDecision> = forward_decisions.clone();
		recorded.extend(return_decisions.iter().cloned());
		self.stats.record_cycle(now, counts.updated, counts.missing, &recorded);

		info!(
			"cycle {} complete in {:.3}s: {} samples updated, {} missing, {} path changes so far",
			self.stats.cycles, started.elapsed().as_secs_f64(), counts.updated, counts.missing, self.stats.path_changes,
		);
		for event in self.stats.history().iter().rev().take(recorded.len().min(3))
		{
			info!("path change [{} {}]: {} -> {} ({})", event.key.direction, event.key.tier, event.previous_summary, event.current_summary, event.hop_diff);
		}

		Ok(CycleReport{ forward_decisions, return_decisions, samples_updated: counts.updated, samples_missing: counts.missing, forward_applied, return_applied })
	}

	/// Runs cycles on `poll_interval_seconds` spacing until `shutdown` fires
	/// or, if `once` is set, after the first cycle completes. Cancellation is
	/// honored only at the sleep boundary — a cycle in progress always runs
	/// to completion (spec.md §4.6, "Cancellation").
	pub async fn run(&mut self, mode: Mode, once: bool, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()>
	{
		let interval = Duration::from_secs(self.config.poll_interval_seconds);
		loop
		{
			if let Err(e) = self.run_cycle(mode)
			{
				warn!("cycle failed: {}", e);
			}
			if once
			{
				return Ok(());
			}
			tokio::select!
			{
				_ = tokio::time::sleep(interval) => {},
				_ = &mut shutdown =>
				{
					info!("shutdown requested, stopping after current cycle");
					return Ok(());
				}
			}
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::config::Config;
	use crate::shell::fake::{ok, FakeTransport};

	struct FixedSource;
	impl UtilizationSource for FixedSource
	{
		fn sample(&self, _key: &str) -> Option<f64> { None }
	}

	fn orchestrator(mode_transport: FakeTransport) -> Orchestrator<FixedSource, FakeTransport>
	{
		let mut config = Config::default_for_tests();
		config.shell_password = Some("secret".to_string());
		let topology = crate::reference_topology::build(&config);
		Orchestrator::new(config, topology, FixedSource, mode_transport)
	}

	#[test]
	fn analyze_once_never_opens_a_session()
	{
		let transport = FakeTransport::with_responses(Vec::new());
		let mut orch = orchestrator(transport);
		let report = orch.run_cycle(Mode::AnalyzeOnce).unwrap();
		assert_eq!(report.forward_decisions.len(), 3);
		assert_eq!(report.return_decisions.len(), 3);
		assert!(!report.forward_applied && !report.return_applied);
	}

	#[test]
	fn forward_only_applies_ingress_but_not_egress()
	{
		// 3 tiers x (list + add) = 6 responses for the one direction attempted.
		let responses: Vec<_> = (0..6).map(|_| ok("")).collect();
		let transport = FakeTransport::with_responses(responses);
		let mut orch = orchestrator(transport);
		let report = orch.run_cycle(Mode::ForwardOnly).unwrap();
		assert!(report.forward_applied);
		assert!(!report.return_applied);
	}

	#[test]
	fn bidirectional_applies_both_edges()
	{
		let responses: Vec<_> = (0..12).map(|_| ok("")).collect();
		let transport = FakeTransport::with_responses(responses);
		let mut orch = orchestrator(transport);
		let report = orch.run_cycle(Mode::Bidirectional).unwrap();
		assert!(report.forward_applied);
		assert!(report.return_applied);
	}

	#[test]
	fn repeated_cycles_with_stable_topology_report_no_further_changes()
	{
		let responses: Vec<_> = (0..24).map(|_| ok("")).collect();
		let transport = FakeTransport::with_responses(responses);
		let mut orch = orchestrator(transport);
		orch.run_cycle(Mode::Bidirectional).unwrap();
		// First cycle counts one initial change per (direction, tier) key.
		assert_eq!(orch.stats().path_changes, 6);
		orch.run_cycle(Mode::Bidirectional).unwrap();
		assert_eq!(orch.stats().path_changes, 6);
		assert_eq!(orch.stats().cycles, 2);
	}

	#[test]
	fn missing_samples_still_complete_a_cycle()
	{
		let transport = FakeTransport::with_responses(Vec::new());
		let mut orch = orchestrator(transport);
		let report = orch.run_cycle(Mode::AnalyzeOnce).unwrap();
		assert_eq!(report.samples_missing, 24);
		assert_eq!(report.samples_updated, 0);
	}
}
