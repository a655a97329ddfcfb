/*!

The configuration surface (spec.md §6).

A single `Config` value is built once at process startup — from defaults,
optionally overridden by a TOML file, and finally by CLI flags — and passed
by value into the orchestrator and provisioner. Nothing here is a global;
see "Ambient configuration -> injected config" in spec.md's design notes.

*/

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// One of the three pre-provisioned policy routing tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSpec
{
	pub id: u32,
	pub name: String,
	pub mark: u32,
	pub rule_priority: u32,
}

/// Which edge a provisioner invocation targets; also used to pick the
/// table/prefix/mark constants that differ between ingress and egress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Edge
{
	Ingress,
	Egress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config
{
	// --- remote shell ---
	pub ingress_address: String,
	pub egress_address: String,
	pub shell_user: String,
	/// Absent means "prompt interactively", per spec.md §6/§9.
	pub shell_password: Option<String>,
	pub shell_port: u16,
	pub shell_timeout_seconds: u64,

	// --- destination prefixes ---
	pub forward_prefix: String,
	pub return_prefix: String,

	// --- policy tables, on ingress and egress respectively ---
	pub ingress_tables: [TableSpec; 3],
	pub egress_tables: [TableSpec; 3],

	// --- flow-label classifier ---
	pub flow_label_values: [String; 2],
	pub default_mark: u32,

	// --- loop cadence and planning ---
	pub poll_interval_seconds: u64,
	pub path_count: usize,
	pub weight_multipliers: Vec<f64>,
	pub weight_floor_epsilon: f64,

	/// Uniform per-link bandwidth used when building the reference topology
	/// (bytes/second). Not part of spec.md's enumerated surface, since the
	/// general data model allows per-link bandwidth; the reference network
	/// has none configured externally so one value suffices.
	pub reference_link_bandwidth: f64,

	/// Sample-averaging window passed to the utilization source, in seconds.
	pub sample_window_seconds: u64,
}

impl Config
{
	pub fn load(path: Option<&Path>) -> Result<Config, OrchestratorError>
	{
		let mut config = Config::default();
		if let Some(path) = path
		{
			let text = fs::read_to_string(path)
				.map_err(|e| OrchestratorError::Config(format!("reading {}: {}", path.display(), e)))?;
			let file_config: PartialConfig = toml::from_str(&text)
				.map_err(|e| OrchestratorError::Config(format!("parsing {}: {}", path.display(), e)))?;
			file_config.apply(&mut config);
		}
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), OrchestratorError>
	{
		if self.weight_floor_epsilon <= 0.0
		{
			return Err(OrchestratorError::Config("weight_floor_epsilon must be strictly positive".into()));
		}
		if self.path_count == 0 || self.path_count > self.ingress_tables.len()
		{
			return Err(OrchestratorError::Config(format!(
				"path_count ({}) must be between 1 and the number of provisioned tables ({})",
				self.path_count, self.ingress_tables.len(),
			)));
		}
		if self.weight_multipliers.len() < self.path_count
		{
			return Err(OrchestratorError::Config("weight_multipliers must have at least path_count entries".into()));
		}
		self.forward_prefix.parse::<ipnet::Ipv6Net>()
			.map_err(|e| OrchestratorError::Config(format!("invalid forward_prefix: {}", e)))?;
		self.return_prefix.parse::<ipnet::Ipv6Net>()
			.map_err(|e| OrchestratorError::Config(format!("invalid return_prefix: {}", e)))?;
		Ok(())
	}

	pub fn tables_for(&self, edge: Edge) -> &[TableSpec; 3]
	{
		match edge
		{
			Edge::Ingress => &self.ingress_tables,
			Edge::Egress => &self.egress_tables,
		}
	}

	pub fn address_for(&self, edge: Edge) -> &str
	{
		match edge
		{
			Edge::Ingress => &self.ingress_address,
			Edge::Egress => &self.egress_address,
		}
	}

	#[cfg(test)]
	pub fn default_for_tests() -> Config
	{
		Config::default()
	}
}

impl Default for Config
{
	fn default() -> Self
	{
		Config{
			ingress_address: "fd02:1::2".to_string(),
			egress_address: "fd02:1::11".to_string(),
			shell_user: "root".to_string(),
			shell_password: None,
			shell_port: 22,
			shell_timeout_seconds: 15,

			forward_prefix: "fd03:1::/64".to_string(),
			return_prefix: "fd00:1::/64".to_string(),

			ingress_tables: [
				TableSpec{ id: 100, name: "rt_table1".to_string(), mark: 4, rule_priority: 50 },
				TableSpec{ id: 101, name: "rt_table2".to_string(), mark: 6, rule_priority: 60 },
				TableSpec{ id: 102, name: "rt_table3".to_string(), mark: 9, rule_priority: 90 },
			],
			egress_tables: [
				TableSpec{ id: 200, name: "rt_table_1".to_string(), mark: 4, rule_priority: 50 },
				TableSpec{ id: 201, name: "rt_table_2".to_string(), mark: 6, rule_priority: 60 },
				TableSpec{ id: 202, name: "rt_table_3".to_string(), mark: 9, rule_priority: 90 },
			],

			flow_label_values: ["0xfffc4".to_string(), "0xfffc6".to_string()],
			default_mark: 9,

			poll_interval_seconds: 60,
			path_count: 3,
			weight_multipliers: vec![3.0, 2.0, 1.0],
			weight_floor_epsilon: 1e-4,

			reference_link_bandwidth: 1.0e9,
			sample_window_seconds: 60,
		}
	}
}

/// Mirrors `Config` but with every field optional, so a TOML file only
/// needs to name the fields it overrides.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig
{
	ingress_address: Option<String>,
	egress_address: Option<String>,
	shell_user: Option<String>,
	shell_password: Option<String>,
	shell_port: Option<u16>,
	shell_timeout_seconds: Option<u64>,
	forward_prefix: Option<String>,
	return_prefix: Option<String>,
	ingress_tables: Option<[TableSpec; 3]>,
	egress_tables: Option<[TableSpec; 3]>,
	flow_label_values: Option<[String; 2]>,
	default_mark: Option<u32>,
	poll_interval_seconds: Option<u64>,
	path_count: Option<usize>,
	weight_multipliers: Option<Vec<f64>>,
	weight_floor_epsilon: Option<f64>,
	reference_link_bandwidth: Option<f64>,
	sample_window_seconds: Option<u64>,
}

impl PartialConfig
{
	fn apply(self, config: &mut Config)
	{
		macro_rules! set
		{
			($field:ident) => { if let Some(v) = self.$field { config.$field = v; } }
		}
		set!(ingress_address);
		set!(egress_address);
		set!(shell_user);
		set!(shell_password);
		set!(shell_port);
		set!(shell_timeout_seconds);
		set!(forward_prefix);
		set!(return_prefix);
		set!(ingress_tables);
		set!(egress_tables);
		set!(flow_label_values);
		set!(default_mark);
		set!(poll_interval_seconds);
		set!(path_count);
		set!(weight_multipliers);
		set!(weight_floor_epsilon);
		set!(reference_link_bandwidth);
		set!(sample_window_seconds);
	}
}

/// Link sample-key -> RRD file path, for the default `RrdUtilizationSource`.
/// Kept here rather than hardcoded in the sampler so deployments can point
/// at a different mrtg/rrd layout.
pub fn default_rrd_paths() -> HashMap<String, String>
{
	const BASE: &str = "/opt/app/mrtg/mrtg_file";
	[
		"r1-r2", "r1-r3", "r2-r4", "r2-r5", "r3-r5", "r3-r6", "r4-r7", "r4-r8",
		"r5-r8", "r5-r9", "r6-r9", "r6-r10", "r7-r11", "r8-r11", "r8-r12",
		"r9-r12", "r9-r13", "r10-r13", "r11-r14", "r12-r14", "r12-r15",
		"r13-r15", "r14-r16", "r15-r16",
	].iter().map(|key| (key.to_string(), format!("{}/{}.rrd", BASE, key))).collect()
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn default_config_validates()
	{
		let config = Config::default();
		assert!(config.validate().is_ok());
	}

	#[test]
	fn rejects_zero_weight_floor()
	{
		let mut config = Config::default();
		config.weight_floor_epsilon = 0.0;
		assert!(config.validate().is_err());
	}

	#[test]
	fn rejects_path_count_over_table_count()
	{
		let mut config = Config::default();
		config.path_count = 4;
		assert!(config.validate().is_err());
	}
}
