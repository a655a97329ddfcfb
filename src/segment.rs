/*!

The segment translator (C4).

Maps a node path to an SRv6 segment list plus the egress interface used on
the first hop — the only interface that is actually installed, since the
remaining hops' interfaces are consumed on transit routers which don't run
this orchestrator (spec.md §4.4, §9).

*/

use std::net::Ipv6Addr;

use crate::error::{OrchestratorError, Result};
use crate::planner::Path;
use crate::topology::Topology;

/// Which table of endpoints to consult: the path from ingress toward
/// egress, or the reverse trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction
{
	Forward,
	Return,
}

/// A translated path: its ordered SID list and the interface to encapsulate
/// on at the first hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentList
{
	pub sids: Vec<Ipv6Addr>,
	pub first_hop_interface: String,
}

/// Translates a path into a segment list. Fails with `MissingEndpoint` if any
/// hop lacks a mapping in the chosen direction — a configuration bug, not a
/// runtime condition (spec.md §4.4).
pub fn translate(topology: &Topology, path: &Path, direction: Direction) -> Result<SegmentList>
{
	let mut sids = Vec::with_capacity(path.hops());
	let mut first_hop_interface = None;
	for window in path.nodes.windows(2)
	{
		let (a, b) = (window[0], window[1]);
		let endpoint = match direction
		{
			Direction::Forward => topology.forward(a, b)?,
			Direction::Return => topology.return_endpoint(a, b)?,
		};
		sids.push(endpoint.segment);
		if first_hop_interface.is_none()
		{
			first_hop_interface = Some(endpoint.interface.clone());
		}
	}
	let first_hop_interface = first_hop_interface
		.ok_or_else(|| OrchestratorError::MissingEndpoint(path.nodes.first().copied().unwrap_or(0), path.nodes.get(1).copied().unwrap_or(0)))?;
	Ok(SegmentList{ sids, first_hop_interface })
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::config::Config;
	use crate::planner::{plan_paths, InflationStrategy};

	#[test]
	fn segment_length_equals_hop_count()
	{
		let topology = crate::reference_topology::build(&Config::default_for_tests());
		let paths = plan_paths(&topology, 1, 16, 1, &[3.0], InflationStrategy::Multiplicative);
		let segments = translate(&topology, &paths[0], Direction::Forward).unwrap();
		assert_eq!(segments.sids.len(), paths[0].hops());
	}

	#[test]
	fn first_hop_interface_matches_forward_endpoint()
	{
		let topology = crate::reference_topology::build(&Config::default_for_tests());
		let paths = plan_paths(&topology, 1, 16, 1, &[3.0], InflationStrategy::Multiplicative);
		let segments = translate(&topology, &paths[0], Direction::Forward).unwrap();
		let (n0, n1) = (paths[0].nodes[0], paths[0].nodes[1]);
		let endpoint = topology.forward(n0, n1).unwrap();
		assert_eq!(segments.first_hop_interface, endpoint.interface);
	}

	#[test]
	fn missing_hop_endpoint_errors()
	{
		use crate::planner::Path;
		let topology = crate::reference_topology::build(&Config::default_for_tests());
		let bogus = Path{ nodes: vec![3, 99], cost: 1.0 };
		assert!(translate(&topology, &bogus, Direction::Forward).is_err());
	}
}
