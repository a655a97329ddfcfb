/*!

Orchestrator statistics and change detection (spec.md §4.6 step 5, §8).

Counts what each cycle did and remembers the previous cycle's decisions so
the next cycle can tell whether anything actually changed. Nothing here
drives behavior — the orchestrator consults it only to decide what to log —
so its own correctness never affects whether routes get installed.

*/

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::decision::{DecisionKey, TableDecision};

/// One entry in the bounded change-history ring: when a tier's path changed,
/// from what to what, and by how much the cost moved.
#[derive(Debug, Clone)]
pub struct ChangeEvent
{
	pub at: DateTime<Utc>,
	pub key: DecisionKey,
	pub previous_summary: String,
	pub current_summary: String,
	pub hop_diff: String,
	pub cost_delta: f64,
}

/// Running counters plus a capped history of path changes, across the life
/// of one orchestrator process.
#[derive(Debug, Clone)]
pub struct Stats
{
	pub cycles: u64,
	pub path_changes: u64,
	pub samples_updated: u64,
	pub samples_missing: u64,
	pub last_success: Option<DateTime<Utc>>,
	history: Vec<ChangeEvent>,
	history_capacity: usize,
	previous: BTreeMap<DecisionKey, TableDecision>,
}

impl Stats
{
	pub fn new(history_capacity: usize) -> Self
	{
		Stats{
			cycles: 0,
			path_changes: 0,
			samples_updated: 0,
			samples_missing: 0,
			last_success: None,
			history: Vec::new(),
			history_capacity,
			previous: BTreeMap::new(),
		}
	}

	pub fn history(&self) -> &[ChangeEvent]
	{
		&self.history
	}

	/// Folds in one cycle's outcome: a sample count, the completed cycle's
	/// timestamp, and the decisions actually applied (both directions, all
	/// tiers). Compares each decision against the one at the same key from
	/// the previous cycle, recording a `ChangeEvent` for anything that moved
	/// (spec.md §9, "Change detection requires stable key").
	pub fn record_cycle(&mut self, now: DateTime<Utc>, sample_updated: usize, sample_missing: usize, decisions: &[TableDecision])
	{
		self.cycles += 1;
		self.samples_updated += sample_updated as u64;
		self.samples_missing += sample_missing as u64;
		self.last_success = Some(now);

		for decision in decisions
		{
			match self.previous.get(&decision.key)
			{
				// A key seen for the first time counts as a change too — the
				// table just went from "undecided" to this path (spec.md §8,
				// S1's "six initial events").
				None =>
				{
					self.path_changes += 1;
					self.push_event(now, None, decision);
				},
				Some(prior) if prior.path.nodes != decision.path.nodes
					|| prior.segments.first_hop_interface != decision.segments.first_hop_interface =>
				{
					self.path_changes += 1;
					self.push_event(now, Some(prior), decision);
				},
				Some(_) => {},
			}
		}

		self.previous = decisions.iter().map(|d| (d.key.clone(), d.clone())).collect();
	}

	fn push_event(&mut self, at: DateTime<Utc>, prior: Option<&TableDecision>, current: &TableDecision)
	{
		let previous_nodes: &[u32] = prior.map(|p| p.path.nodes.as_slice()).unwrap_or(&[]);
		let event = ChangeEvent{
			at,
			key: current.key.clone(),
			previous_summary: prior.map(|p| p.summary()).unwrap_or_else(|| "(none)".to_string()),
			current_summary: current.summary(),
			hop_diff: hop_diff(previous_nodes, &current.path.nodes),
			cost_delta: current.cost - prior.map(|p| p.cost).unwrap_or(0.0),
		};
		if self.history.len() == self.history_capacity
		{
			self.history.remove(0);
		}
		self.history.push(event);
	}
}

/// Renders the line-oriented diff between two hop sequences (each hop on
/// its own line, so `diff::slice` lines them up one node at a time) as a
/// compact `+r7 -r8` style summary for the change-history log.
fn hop_diff(previous: &[u32], current: &[u32]) -> String
{
	let prev_lines: Vec<String> = previous.iter().map(|n| format!("r{}", n)).collect();
	let cur_lines: Vec<String> = current.iter().map(|n| format!("r{}", n)).collect();
	let prev_refs: Vec<&str> = prev_lines.iter().map(String::as_str).collect();
	let cur_refs: Vec<&str> = cur_lines.iter().map(String::as_str).collect();

	let mut parts = Vec::new();
	for change in diff::slice(&prev_refs, &cur_refs)
	{
		match change
		{
			diff::Result::Left(l) => parts.push(format!("-{}", l)),
			diff::Result::Right(r) => parts.push(format!("+{}", r)),
			diff::Result::Both(_, _) => {},
		}
	}
	if parts.is_empty() { "(no hop difference)".to_string() } else { parts.join(" ") }
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::decision::DirectionKind;
	use crate::planner::Path;
	use crate::segment::SegmentList;

	fn decision(tier: &'static str, nodes: Vec<u32>, cost: f64) -> TableDecision
	{
		decision_with_interface(tier, nodes, cost, "eth1")
	}

	fn decision_with_interface(tier: &'static str, nodes: Vec<u32>, cost: f64, interface: &str) -> TableDecision
	{
		TableDecision{
			key: DecisionKey{ direction: DirectionKind::Forward, tier },
			table_id: 100,
			table_name: "rt_table1".to_string(),
			path: Path{ nodes, cost },
			segments: SegmentList{ sids: vec!["fd01:1::12".parse().unwrap()], first_hop_interface: interface.to_string() },
			cost,
		}
	}

	fn now() -> DateTime<Utc>
	{
		DateTime::from_timestamp(1_700_000_000, 0).unwrap()
	}

	#[test]
	fn first_cycle_records_an_initial_change_per_key()
	{
		let mut stats = Stats::new(10);
		stats.record_cycle(now(), 24, 0, &[decision("tier-1", vec![1, 2, 16], 2.0)]);
		assert_eq!(stats.cycles, 1);
		assert_eq!(stats.path_changes, 1);
		assert_eq!(stats.history().len(), 1);
		assert_eq!(stats.history()[0].previous_summary, "(none)");
	}

	#[test]
	fn same_path_across_cycles_is_not_a_further_change()
	{
		let mut stats = Stats::new(10);
		let d = decision("tier-1", vec![1, 2, 16], 2.0);
		stats.record_cycle(now(), 24, 0, &[d.clone()]);
		stats.record_cycle(now(), 24, 0, &[d]);
		assert_eq!(stats.path_changes, 1);
	}

	#[test]
	fn differing_path_at_same_key_is_recorded()
	{
		let mut stats = Stats::new(10);
		stats.record_cycle(now(), 24, 0, &[decision("tier-1", vec![1, 2, 16], 2.0)]);
		stats.record_cycle(now(), 24, 0, &[decision("tier-1", vec![1, 3, 16], 2.5)]);
		assert_eq!(stats.path_changes, 2);
		assert_eq!(stats.history().len(), 2);
		assert!((stats.history()[1].cost_delta - 0.5).abs() < 1e-12);
		assert!(stats.history()[1].hop_diff.contains("-r2"));
		assert!(stats.history()[1].hop_diff.contains("+r3"));
	}

	#[test]
	fn interface_only_change_at_same_path_is_recorded()
	{
		let mut stats = Stats::new(10);
		stats.record_cycle(now(), 24, 0, &[decision_with_interface("tier-1", vec![1, 2, 16], 2.0, "eth1")]);
		stats.record_cycle(now(), 24, 0, &[decision_with_interface("tier-1", vec![1, 2, 16], 2.0, "eth2")]);
		assert_eq!(stats.path_changes, 2);
		assert_eq!(stats.history().len(), 2);
		assert_eq!(stats.history()[1].hop_diff, "(no hop difference)");
	}

	#[test]
	fn history_ring_is_bounded()
	{
		let mut stats = Stats::new(2);
		stats.record_cycle(now(), 24, 0, &[decision("tier-1", vec![1, 2, 16], 2.0)]);
		for alt in [3u32, 2, 3, 2]
		{
			stats.record_cycle(now(), 24, 0, &[decision("tier-1", vec![1, alt, 16], 2.0)]);
		}
		assert_eq!(stats.history().len(), 2);
	}

	#[test]
	fn unrelated_key_gets_its_own_independent_initial_change()
	{
		let mut stats = Stats::new(10);
		stats.record_cycle(now(), 24, 0, &[decision("tier-1", vec![1, 2, 16], 2.0)]);
		stats.record_cycle(now(), 24, 0, &[decision("tier-2", vec![1, 3, 16], 2.5)]);
		assert_eq!(stats.path_changes, 2);
		assert_eq!(stats.history().len(), 2);
	}
}
