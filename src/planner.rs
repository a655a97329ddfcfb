/*!

The path planner (C3).

Produces up to K ranked paths between a source and destination by iterated
shortest-path computation with multiplicative weight inflation on
previously-selected edges (spec.md §4.3). The planner is pure: it clones
the edge weights it needs before iterating, so nothing it does leaks back
into the shared topology — see "Graph mutation vs. planner purity" in
spec.md §9.

*/

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::error::NodeId;
use crate::topology::Topology;

/// A loop-free sequence of at least two nodes, with the scalar cost of
/// traversing it under the edge weights in effect when it was planned.
#[derive(Debug, Clone, PartialEq)]
pub struct Path
{
	pub nodes: Vec<NodeId>,
	pub cost: f64,
}

impl Path
{
	pub fn hops(&self) -> usize
	{
		self.nodes.len().saturating_sub(1)
	}

	/// The same nodes in reverse order, representing the return trip over
	/// the same physical links (spec.md §4.6 step 4).
	pub fn reversed(&self) -> Path
	{
		let mut nodes = self.nodes.clone();
		nodes.reverse();
		Path{ nodes, cost: self.cost }
	}
}

/// How inflation discourages reusing edges from an already-chosen path when
/// planning the next tier. `Multiplicative` is the default per spec.md §9's
/// resolution of its two observed strategies; `DeleteInterior` reproduces
/// the original system's other strategy (interior edges removed, first/last
/// edge weight multiplied by a large factor) for parity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InflationStrategy
{
	Multiplicative,
	DeleteInterior,
}

/// A private, mutable snapshot of edge weights the planner iterates on.
/// Keeps the caller's topology read-only for the duration of planning.
struct WeightSnapshot
{
	weights: BTreeMap<(NodeId, NodeId), f64>,
	removed: std::collections::BTreeSet<(NodeId, NodeId)>,
}

impl WeightSnapshot
{
	fn from_topology(topology: &Topology) -> Self
	{
		let mut weights = BTreeMap::new();
		for (a, b) in topology.links()
		{
			let w = topology.weight(a, b).expect("link returned by links() must have a weight");
			weights.insert((a, b), w);
			weights.insert((b, a), w);
		}
		WeightSnapshot{ weights, removed: Default::default() }
	}

	fn weight(&self, a: NodeId, b: NodeId) -> Option<f64>
	{
		if self.removed.contains(&(a.min(b), a.max(b)))
		{
			return None;
		}
		self.weights.get(&(a, b)).copied()
	}

	fn scale(&mut self, a: NodeId, b: NodeId, factor: f64)
	{
		if let Some(w) = self.weights.get_mut(&(a, b)) { *w *= factor; }
		if let Some(w) = self.weights.get_mut(&(b, a)) { *w *= factor; }
	}

	fn remove(&mut self, a: NodeId, b: NodeId)
	{
		self.removed.insert((a.min(b), a.max(b)));
	}
}

#[derive(PartialEq)]
struct HeapEntry
{
	cost: f64,
	node: NodeId,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry
{
	fn cmp(&self, other: &Self) -> Ordering
	{
		// Reversed so BinaryHeap (a max-heap) behaves as a min-heap on cost.
		// Ties broken on node id for a deterministic, reproducible order
		// within a single planning run (spec.md's Testable Property 2).
		other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
			.then_with(|| other.node.cmp(&self.node))
	}
}

impl PartialOrd for HeapEntry
{
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

fn dijkstra(topology: &Topology, snapshot: &WeightSnapshot, src: NodeId, dst: NodeId) -> Option<Path>
{
	let mut dist: BTreeMap<NodeId, f64> = BTreeMap::new();
	let mut prev: BTreeMap<NodeId, NodeId> = BTreeMap::new();
	let mut heap = BinaryHeap::new();

	dist.insert(src, 0.0);
	heap.push(HeapEntry{ cost: 0.0, node: src });

	while let Some(HeapEntry{ cost, node }) = heap.pop()
	{
		if node == dst
		{
			break;
		}
		if cost > *dist.get(&node).unwrap_or(&f64::INFINITY)
		{
			continue;
		}
		for &neighbour in topology.neighbours(node)
		{
			let Some(w) = snapshot.weight(node, neighbour) else { continue };
			let next_cost = cost + w;
			if next_cost < *dist.get(&neighbour).unwrap_or(&f64::INFINITY)
			{
				dist.insert(neighbour, next_cost);
				prev.insert(neighbour, node);
				heap.push(HeapEntry{ cost: next_cost, node: neighbour });
			}
		}
	}

	if !dist.contains_key(&dst)
	{
		return None;
	}
	let mut nodes = vec![dst];
	let mut current = dst;
	while current != src
	{
		current = *prev.get(&current)?;
		nodes.push(current);
	}
	nodes.reverse();
	Some(Path{ nodes, cost: dist[&dst] })
}

/// Plans up to `path_count` ranked paths from `src` to `dst`. `multipliers`
/// must have at least `path_count` entries; `multipliers[i]` is applied to
/// every edge of tier `i`'s path before tier `i+1` is computed. Returns
/// fewer than `path_count` paths if the graph runs out of distinct routes —
/// spec.md's "no further path" boundary behavior — and an empty vector if
/// `src == dst` or no path exists at all.
pub fn plan_paths(
	topology: &Topology,
	src: NodeId,
	dst: NodeId,
	path_count: usize,
	multipliers: &[f64],
	strategy: InflationStrategy,
) -> Vec<Path>
{
	if src == dst
	{
		return Vec::new();
	}
	let mut snapshot = WeightSnapshot::from_topology(topology);
	let mut paths = Vec::with_capacity(path_count);

	for tier in 0..path_count
	{
		let Some(path) = dijkstra(topology, &snapshot, src, dst) else { break };
		let factor = multipliers.get(tier).copied().unwrap_or(1.0);
		inflate(&mut snapshot, &path, factor, strategy);
		paths.push(path);
	}
	paths
}

fn inflate(snapshot: &mut WeightSnapshot, path: &Path, factor: f64, strategy: InflationStrategy)
{
	let hops = path.hops();
	if hops == 0
	{
		return;
	}
	match strategy
	{
		InflationStrategy::Multiplicative =>
		{
			for window in path.nodes.windows(2)
			{
				snapshot.scale(window[0], window[1], factor);
			}
		},
		InflationStrategy::DeleteInterior =>
		{
			for (i, window) in path.nodes.windows(2).enumerate()
			{
				let (a, b) = (window[0], window[1]);
				if i == 0 || i == hops - 1
				{
					snapshot.scale(a, b, 1000.0);
				}
				else
				{
					snapshot.remove(a, b);
				}
			}
		},
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::config::Config;

	fn topo() -> Topology
	{
		crate::reference_topology::build(&Config::default_for_tests())
	}

	#[test]
	fn determinism_same_inputs_same_output()
	{
		let topology = topo();
		let a = plan_paths(&topology, 1, 16, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		let b = plan_paths(&topology, 1, 16, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		assert_eq!(a, b);
	}

	#[test]
	fn cold_start_tier_one_is_shortest_hop_path()
	{
		let topology = topo();
		let paths = plan_paths(&topology, 1, 16, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		assert_eq!(paths.len(), 3);
		// All weights are epsilon at cold start, so tier 1 is a minimum-hop path.
		assert_eq!(paths[0].hops(), 5);
		assert_eq!(paths[0].nodes.first(), Some(&1));
		assert_eq!(paths[0].nodes.last(), Some(&16));
	}

	#[test]
	fn tiers_diverge_after_inflation()
	{
		let topology = topo();
		let paths = plan_paths(&topology, 1, 16, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		assert_ne!(paths[0].nodes, paths[1].nodes);
	}

	#[test]
	fn costs_are_non_decreasing_across_tiers()
	{
		let topology = topo();
		let paths = plan_paths(&topology, 1, 16, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		for window in paths.windows(2)
		{
			assert!(window[0].cost <= window[1].cost + 1e-12);
		}
	}

	#[test]
	fn source_equals_destination_yields_no_paths()
	{
		let topology = topo();
		let paths = plan_paths(&topology, 1, 1, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		assert!(paths.is_empty());
	}

	#[test]
	fn k_larger_than_available_paths_returns_fewer()
	{
		// A two-node topology has exactly one path between its endpoints.
		use crate::topology::{Endpoint, LinkSpec, Topology as Topo};
		let ep = |s: &str, i: &str| Endpoint{ segment: s.parse().unwrap(), interface: i.to_string() };
		let links = vec![LinkSpec{ a: 1, b: 2, max_bandwidth: 1e9, forward_ab: ep("fd01:1::12", "eth1"), forward_ba: ep("fd01:1::11", "eth1"), sample_key: None }];
		let topology = Topo::new(links, 1, 2, 1e-4);
		let paths = plan_paths(&topology, 1, 2, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		assert_eq!(paths.len(), 1);
	}

	#[test]
	fn reversed_path_traverses_same_links()
	{
		let topology = topo();
		let paths = plan_paths(&topology, 1, 16, 1, &[3.0], InflationStrategy::Multiplicative);
		let forward = &paths[0];
		let back = forward.reversed();
		let forward_links: std::collections::BTreeSet<_> = forward.nodes.windows(2).map(|w| (w[0].min(w[1]), w[0].max(w[1]))).collect();
		let back_links: std::collections::BTreeSet<_> = back.nodes.windows(2).map(|w| (w[0].min(w[1]), w[0].max(w[1]))).collect();
		assert_eq!(forward_links, back_links);
	}

	#[test]
	fn double_reverse_is_identity()
	{
		let topology = topo();
		let paths = plan_paths(&topology, 1, 16, 1, &[3.0], InflationStrategy::Multiplicative);
		assert_eq!(paths[0].reversed().reversed(), paths[0]);
	}

	#[test]
	fn congested_link_is_avoided_by_tier_one()
	{
		let config = Config::default_for_tests();
		let mut topology = crate::reference_topology::build(&config);
		topology.set_weight(14, 16, 0.9);
		let paths = plan_paths(&topology, 1, 16, 3, &[3.0, 2.0, 1.0], InflationStrategy::Multiplicative);
		let tier1_links: Vec<_> = paths[0].nodes.windows(2).map(|w| (w[0], w[1])).collect();
		assert!(!tier1_links.contains(&(14, 16)) && !tier1_links.contains(&(16, 14)));
	}
}
