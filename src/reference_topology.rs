/*!

The reference 16-node, 24-link topology and its segment mappings.

This is the one concrete topology the orchestrator ships with: a two-edge
mesh between node 1 (ingress) and node 16 (egress), with fourteen transit
nodes in between. Node numbering, edges, and segment/interface mappings
mirror the network this system was built to drive.

*/

use crate::config::Config;
use crate::topology::{Endpoint, LinkSpec, Topology};

fn ep(segment: &str, interface: &str) -> Endpoint
{
	Endpoint{
		segment: segment.parse().expect("reference topology segment addresses are valid IPv6"),
		interface: interface.to_string(),
	}
}

/// Build the reference topology. `bandwidth` is the uniform per-link
/// `max_bandwidth` (bytes/second); the reference network has no per-link
/// bandwidth heterogeneity, but the model supports it.
pub fn build(config: &Config) -> Topology
{
	// (a, b, sample_key)
	const EDGES: &[(u32, u32, &str)] = &[
		(1, 2, "r1-r2"), (1, 3, "r1-r3"),
		(2, 4, "r2-r4"), (2, 5, "r2-r5"),
		(3, 5, "r3-r5"), (3, 6, "r3-r6"),
		(4, 7, "r4-r7"), (4, 8, "r4-r8"),
		(5, 8, "r5-r8"), (5, 9, "r5-r9"),
		(6, 9, "r6-r9"), (6, 10, "r6-r10"),
		(7, 11, "r7-r11"), (8, 11, "r8-r11"),
		(8, 12, "r8-r12"), (9, 12, "r9-r12"),
		(9, 13, "r9-r13"), (10, 13, "r10-r13"),
		(11, 14, "r11-r14"), (12, 14, "r12-r14"),
		(12, 15, "r12-r15"), (13, 15, "r13-r15"),
		(14, 16, "r14-r16"), (15, 16, "r15-r16"),
	];

	let forward_map = forward_segments();
	let return_map = return_segments();

	let links = EDGES.iter().map(|&(a, b, key)| {
		let (fwd_seg, fwd_if) = forward_map.get(&(a, b)).cloned()
			.unwrap_or_else(|| panic!("reference topology missing forward segment for {}->{}", a, b));
		let (ret_seg, ret_if) = return_map.get(&(b, a)).cloned()
			.unwrap_or_else(|| panic!("reference topology missing return segment for {}->{}", b, a));
		LinkSpec{
			a, b,
			max_bandwidth: config.reference_link_bandwidth,
			forward_ab: ep(fwd_seg, fwd_if),
			forward_ba: ep(ret_seg, ret_if),
			sample_key: Some(key.to_string()),
		}
	}).collect();

	Topology::new(links, 1, 16, config.weight_floor_epsilon)
}

type SegMap = std::collections::BTreeMap<(u32, u32), (&'static str, &'static str)>;

/// Forward (ingress -> egress direction) segment/interface mapping. Only
/// the first-hop interfaces on node 1 are meaningful; interior nodes carry
/// placeholder interface names, per spec.md's note on asymmetric endpoint
/// definitions.
fn forward_segments() -> SegMap
{
	[
		((1, 2), ("fd01:1::12", "eth1")), ((1, 3), ("fd01:16::12", "eth2")),
		((2, 4), ("fd01:2::12", "eth2")), ((2, 5), ("fd01:4::12", "eth3")),
		((3, 5), ("fd01:17::12", "eth0")), ((3, 6), ("fd01:15::12", "eth0")),
		((4, 7), ("fd01:3::12", "eth2")), ((4, 8), ("fd01:6::12", "eth2")),
		((5, 8), ("fd01:5::12", "eth3")), ((5, 9), ("fd01:12::12", "eth3")),
		((6, 9), ("fd01:18::12", "eth3")), ((6, 10), ("fd01:14::12", "eth3")),
		((7, 11), ("fd01:8::12", "eth3")),
		((8, 11), ("fd01:7::12", "eth3")), ((8, 12), ("fd01:b::12", "eth3")),
		((9, 12), ("fd01:11::12", "eth3")), ((9, 13), ("fd01:10::12", "eth3")),
		((10, 13), ("fd01:13::12", "eth3")),
		((11, 14), ("fd01:9::12", "eth3")),
		((12, 14), ("fd01:c::12", "eth3")), ((12, 15), ("fd01:d::12", "eth3")),
		((13, 15), ("fd01:f::12", "eth3")),
		((14, 16), ("fd01:a::12", "eth3")),
		((15, 16), ("fd01:e::12", "eth3")),
	].into_iter().collect()
}

/// Return (egress -> ingress direction) segment/interface mapping.
fn return_segments() -> SegMap
{
	[
		((16, 15), ("fd01:e::11", "eth1")), ((16, 14), ("fd01:a::11", "eth2")),
		((15, 13), ("fd01:f::11", "eth1")), ((15, 12), ("fd01:d::11", "eth2")),
		((14, 12), ("fd01:c::11", "eth3")), ((14, 11), ("fd01:9::11", "eth3")),
		((13, 10), ("fd01:13::11", "eth3")), ((13, 9), ("fd01:10::11", "eth3")),
		((12, 9), ("fd01:11::11", "eth3")), ((12, 8), ("fd01:b::11", "eth3")),
		((11, 8), ("fd01:7::11", "eth3")), ((11, 7), ("fd01:8::11", "eth3")),
		((10, 6), ("fd01:14::11", "eth3")),
		((9, 6), ("fd01:18::11", "eth3")), ((9, 5), ("fd01:12::11", "eth3")),
		((8, 5), ("fd01:5::11", "eth3")), ((8, 4), ("fd01:6::11", "eth3")),
		((7, 4), ("fd01:3::11", "eth3")),
		((6, 3), ("fd01:15::11", "eth0")),
		((5, 3), ("fd01:17::11", "eth0")), ((5, 2), ("fd01:4::11", "eth3")),
		((4, 2), ("fd01:2::11", "eth2")),
		((3, 1), ("fd01:16::11", "eth2")),
		((2, 1), ("fd01:1::11", "eth1")),
	].into_iter().collect()
}
