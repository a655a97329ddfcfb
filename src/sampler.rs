/*!

The utilization sampler (C2).

Queries an external time-series source for each link's most recent
non-missing byte-rate and folds the result into the topology's edge
weights. The source itself is treated as opaque per spec.md §6: this
module defines the `UtilizationSource` trait plus a default RRDtool-backed
implementation, grounded in the original system's use of `rrdtool fetch`.

*/

use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;

use log::{debug, warn};

use crate::error::NodeId;
use crate::topology::Topology;

/// An opaque source of per-link byte-rate samples. `sample` returns `Ok(None)`
/// for "no non-missing value available" (store error, unknown key, all-NaN
/// response) — never a hard failure for the caller, per spec.md §4.2.
pub trait UtilizationSource
{
	fn sample(&self, key: &str) -> Option<f64>;
}

/// Queries RRD files the way the original Python implementation does:
/// `rrdtool fetch <path> AVERAGE --start -60s`, then scans the data lines
/// from most recent to oldest for the first non-NaN value.
pub struct RrdUtilizationSource
{
	paths: HashMap<String, String>,
	window_seconds: u64,
	command_timeout: Duration,
}

impl RrdUtilizationSource
{
	pub fn new(paths: HashMap<String, String>, window_seconds: u64, command_timeout: Duration) -> Self
	{
		RrdUtilizationSource{ paths, window_seconds, command_timeout }
	}
}

impl UtilizationSource for RrdUtilizationSource
{
	fn sample(&self, key: &str) -> Option<f64>
	{
		let path = self.paths.get(key)?;
		debug!("fetching rrd sample for {} from {}", key, path);
		let start_arg = format!("-{}s", self.window_seconds);
		let output = run_with_timeout(
			Command::new("rrdtool").args(["fetch", path, "AVERAGE", "--start", &start_arg]),
			self.command_timeout,
		);
		let output = match output
		{
			Ok(o) => o,
			Err(e) => { warn!("rrdtool fetch failed for {}: {}", path, e); return None; },
		};
		if !output.status.success()
		{
			warn!("rrdtool fetch for {} exited non-zero", path);
			return None;
		}
		let stdout = String::from_utf8_lossy(&output.stdout);
		parse_rrd_fetch_output(&stdout)
	}
}

fn run_with_timeout(command: &mut Command, timeout: Duration) -> std::io::Result<std::process::Output>
{
	// rrdtool fetch is a short-lived local process; a synchronous wait with
	// a coarse timeout is simpler here than spawning a watcher thread, and
	// matches the spirit of spec.md's per-operation timeout requirement.
	let start = std::time::Instant::now();
	let mut child = command.stdout(std::process::Stdio::piped()).stderr(std::process::Stdio::piped()).spawn()?;
	loop
	{
		if let Some(_status) = child.try_wait()?
		{
			return child.wait_with_output();
		}
		if start.elapsed() > timeout
		{
			let _ = child.kill();
			return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "rrdtool fetch timed out"));
		}
		std::thread::sleep(Duration::from_millis(20));
	}
}

/// Parses `rrdtool fetch` output: a header line, a blank line, then
/// `timestamp: value` data lines. Walks from the end backward and returns
/// the first value that isn't `nan`/`-nan`.
fn parse_rrd_fetch_output(stdout: &str) -> Option<f64>
{
	let lines: Vec<&str> = stdout.lines().collect();
	if lines.len() < 3
	{
		return None;
	}
	for line in lines[2..].iter().rev()
	{
		let mut parts = line.split_whitespace();
		let _timestamp = parts.next()?;
		let value = parts.next()?;
		if value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("-nan")
		{
			continue;
		}
		if let Ok(v) = value.parse::<f64>()
		{
			if !v.is_nan()
			{
				return Some(v);
			}
		}
	}
	None
}

/// Outcome of a single `update_weights` call: how many links got a fresh
/// sample, and how many fell back to the weight floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounts
{
	pub updated: usize,
	pub missing: usize,
}

/// Refreshes every link's weight from the utilization source. Never fails
/// the whole cycle for a subset of missing samples — a missing sample just
/// falls back to the weight floor, per spec.md §4.2's invariant.
pub fn update_weights(topology: &mut Topology, source: &dyn UtilizationSource, weight_floor_epsilon: f64) -> SampleCounts
{
	let mut counts = SampleCounts::default();
	let links: Vec<(NodeId, NodeId)> = topology.links().collect();
	for (a, b) in links
	{
		let weight = match topology.sample_key(a, b)
		{
			Some(key) =>
			{
				let key = key.to_string();
				match source.sample(&key)
				{
					Some(bytes_per_second) =>
					{
						let max_bandwidth = topology.max_bandwidth(a, b).unwrap_or(1.0);
						let utilization = (bytes_per_second / max_bandwidth).clamp(0.0, 1.0);
						counts.updated += 1;
						utilization.max(weight_floor_epsilon)
					},
					None =>
					{
						warn!("no sample available for link ({},{})", a, b);
						counts.missing += 1;
						weight_floor_epsilon
					},
				}
			},
			None => weight_floor_epsilon,
		};
		topology.set_weight(a, b, weight);
	}
	counts
}
