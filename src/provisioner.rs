/*!

The one-shot edge provisioner.

Installs the invariants the orchestration loop depends on: numbered routing
tables, fwmark->table rules, and Flow-Label->fwmark classification rules
(spec.md §4.7). Two independent concerns, each idempotent: "already exists"
on create is success, cleanup ignores "does not exist".

*/

use std::time::Duration;

use log::{info, warn};

use crate::config::{Config, Edge, TableSpec};
use crate::error::OrchestratorError;
use crate::shell::{ShellSession, ShellTransport};

/// nftables mangle table/chain names differ between ingress and egress so
/// forward and return traffic classify independently (spec.md §4.7, last
/// paragraph), mirroring the original system's separate `ip6 mangle` /
/// `ip6 mangle_r16` tables.
fn nft_table_name(edge: Edge) -> &'static str
{
	match edge { Edge::Ingress => "ip6 mangle", Edge::Egress => "ip6 mangle_r16" }
}

fn nft_chain_name(edge: Edge) -> &'static str
{
	match edge { Edge::Ingress => "prerouting", Edge::Egress => "prerouting_r16" }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionReport
{
	pub tables_ok: bool,
	pub rules_ok: bool,
	pub classifier_ok: bool,
}

impl ProvisionReport
{
	pub fn all_ok(&self) -> bool
	{
		self.tables_ok && self.rules_ok && self.classifier_ok
	}
}

pub fn connect<T: ShellTransport>(transport: &T, config: &Config, edge: Edge) -> Result<T::Session, OrchestratorError>
{
	let password = config.shell_password.clone()
		.ok_or_else(|| OrchestratorError::Config("shell_password is required to provision an edge".to_string()))?;
	let timeout = Duration::from_secs(config.shell_timeout_seconds);
	transport.connect(config.address_for(edge), config.shell_port, &config.shell_user, &password, timeout)
}

/// Declares the three numbered tables and installs the fwmark rules that
/// select them (spec.md §4.7, "Policy routing tables & mark rules").
pub fn setup_tables_and_rules<S: ShellSession>(session: &mut S, tables: &[TableSpec; 3]) -> Result<bool, OrchestratorError>
{
	let mut ok = true;
	let existing = session.exec("cat /etc/iproute2/rt_tables")?;
	for table in tables
	{
		if existing.stdout.contains(&table.name)
		{
			info!("table {} already registered", table.name);
			continue;
		}
		let cmd = format!("echo '{} {}' >> /etc/iproute2/rt_tables", table.id, table.name);
		let out = session.exec(&cmd)?;
		if !out.is_success_or_idempotent()
		{
			warn!("failed to register table {}: {}", table.name, out.stderr);
			ok = false;
		}
	}

	let existing_rules = session.exec("ip -6 rule show")?;
	for table in tables
	{
		let marker = format!("fwmark 0x{:x}", table.mark);
		if existing_rules.stdout.contains(&marker) && existing_rules.stdout.contains(&table.name)
		{
			info!("rule mark={} -> {} already present", table.mark, table.name);
			continue;
		}
		let cmd = format!("ip -6 rule add pref {} fwmark {} table {}", table.rule_priority, table.mark, table.name);
		let out = session.exec(&cmd)?;
		if !out.is_success_or_idempotent()
		{
			warn!("failed to add rule mark={} table={}: {}", table.mark, table.name, out.stderr);
			ok = false;
		}
	}
	Ok(ok)
}

/// Creates the mangle/prerouting chain and the three Flow-Label
/// classification rules, in priority order, with the catch-all guarded by
/// `mark == 0` so it never overwrites a mark already set (spec.md §4.7).
pub fn setup_classifier<S: ShellSession>(session: &mut S, edge: Edge, flow_label_values: &[String; 2], default_mark: u32, table_marks: &[u32; 3]) -> Result<bool, OrchestratorError>
{
	let table = nft_table_name(edge);
	let chain = nft_chain_name(edge);
	let mut ok = true;

	let out = session.exec(&format!("nft add table {}", table))?;
	if !out.is_success_or_idempotent() { warn!("failed to create nft table {}: {}", table, out.stderr); ok = false; }

	let out = session.exec(&format!("nft 'add chain {} {} {{ type filter hook prerouting priority mangle; }}'", table, chain))?;
	if !out.is_success_or_idempotent() { warn!("failed to create nft chain {}: {}", chain, out.stderr); ok = false; }

	// Rule 1 and 2: specific flow labels map to the first two table marks.
	for (flow_label, mark) in flow_label_values.iter().zip(table_marks.iter())
	{
		let cmd = format!("nft 'add rule {} {} ip6 flowlabel {} mark set {}'", table, chain, flow_label, mark);
		let out = session.exec(&cmd)?;
		if !out.is_success_or_idempotent() { warn!("failed to add flow-label rule for {}: {}", flow_label, out.stderr); ok = false; }
	}

	// Catch-all: must be last and guarded so it never overwrites a mark
	// already set by one of the rules above.
	let cmd = format!("nft 'add rule {} {} mark 0 mark set {}'", table, chain, default_mark);
	let out = session.exec(&cmd)?;
	if !out.is_success_or_idempotent() { warn!("failed to add catch-all classifier rule: {}", out.stderr); ok = false; }

	Ok(ok)
}

pub fn verify<S: ShellSession>(session: &mut S, edge: Edge, tables: &[TableSpec; 3], flow_label_values: &[String; 2], default_mark: u32) -> Result<ProvisionReport, OrchestratorError>
{
	let rt_tables = session.exec("cat /etc/iproute2/rt_tables")?;
	let tables_ok = tables.iter().all(|t| rt_tables.stdout.contains(&format!("{} {}", t.id, t.name)));

	let rules = session.exec("ip -6 rule show")?;
	let rules_ok = tables.iter().all(|t| rules.stdout.contains(&format!("fwmark 0x{:x}", t.mark)) && rules.stdout.contains(&t.name));

	let table = nft_table_name(edge);
	let listing = session.exec(&format!("nft list table {}", table))?;
	let table_marks = [tables[0].mark, tables[1].mark];
	let classifier_ok = listing.status == 0
		&& flow_label_values.iter().zip(table_marks.iter()).all(|(label, mark)| {
			listing.stdout.contains(label) && listing.stdout.contains(&format!("mark set {}", mark))
		})
		&& listing.stdout.contains("mark 0")
		&& listing.stdout.contains(&format!("mark set {}", default_mark));

	Ok(ProvisionReport{ tables_ok, rules_ok, classifier_ok })
}

/// Removes the fwmark rules and the classifier table. Used for tests and
/// re-provisioning; "does not exist" on delete is success (spec.md §4.7).
pub fn cleanup<S: ShellSession>(session: &mut S, edge: Edge, tables: &[TableSpec; 3]) -> Result<(), OrchestratorError>
{
	for table in tables
	{
		let cmd = format!("ip -6 rule del fwmark {} table {}", table.mark, table.name);
		let out = session.exec(&cmd)?;
		if !out.is_success_or_idempotent()
		{
			warn!("could not remove rule for mark {}: {}", table.mark, out.stderr);
		}
	}
	let table = nft_table_name(edge);
	let out = session.exec(&format!("nft delete table {}", table))?;
	if !out.is_success_or_idempotent()
	{
		warn!("could not remove nft table {}: {}", table, out.stderr);
	}
	Ok(())
}
