/*!

The remote table applier (C5).

For an edge router, a routing table, a destination prefix, an egress
interface, and a segment list: ensures the table contains exactly one
route — `encap seg6` to that prefix — and nothing else (spec.md §4.5). One
shell session is opened per direction and reused across all three tables.

*/

use std::time::Duration;

use log::{debug, error, warn};

use crate::config::Config;
use crate::decision::TableDecision;
use crate::error::OrchestratorError;
use crate::shell::{ShellSession, ShellTransport};

/// Outcome of applying one direction's three table decisions.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport
{
	pub applied: Vec<String>,
	pub failed: Vec<(String, String)>,
}

impl ApplyReport
{
	/// spec.md §4.5: a direction is successful only if all three of its
	/// tables were updated.
	pub fn all_succeeded(&self, expected: usize) -> bool
	{
		self.failed.is_empty() && self.applied.len() == expected
	}
}

/// Opens one shell session to `host` and applies every decision's table in
/// turn. Per-table failures are logged and do not abort the remaining
/// tables in the same direction (spec.md §4.5, §7).
pub fn apply_decisions<T: ShellTransport>(
	transport: &T,
	config: &Config,
	host: &str,
	prefix: &str,
	decisions: &[TableDecision],
) -> Result<ApplyReport, OrchestratorError>
{
	let password = config.shell_password.clone()
		.ok_or_else(|| OrchestratorError::Config("shell_password is required to apply table decisions".to_string()))?;
	let timeout = Duration::from_secs(config.shell_timeout_seconds);
	let mut session = transport.connect(host, config.shell_port, &config.shell_user, &password, timeout)?;

	let mut report = ApplyReport::default();
	for decision in decisions
	{
		match apply_one(&mut session, &decision.table_name, prefix, &decision.segments.first_hop_interface, &decision.segments.sids)
		{
			Ok(()) =>
			{
				debug!("{}: table {} updated ({})", host, decision.table_name, decision.summary());
				report.applied.push(decision.table_name.clone());
			},
			Err(e) =>
			{
				error!("{}: table {} update failed: {}", host, decision.table_name, e);
				report.failed.push((decision.table_name.clone(), e.to_string()));
			},
		}
	}
	Ok(report)
}

fn apply_one<S: ShellSession>(session: &mut S, table: &str, prefix: &str, interface: &str, sids: &[std::net::Ipv6Addr]) -> Result<(), OrchestratorError>
{
	clear_table(session, table)?;

	if sids.is_empty()
	{
		return Err(OrchestratorError::Command{ host: String::new(), command: "route add".to_string(), code: None, stderr: "empty segment list".to_string() });
	}
	let sid_list = sids.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
	let add_cmd = format!("ip -6 route add {} encap seg6 mode encap segs {} dev {} table {}", prefix, sid_list, interface, table);
	let output = session.exec(&add_cmd)?;
	if !output.is_success_or_idempotent()
	{
		return Err(OrchestratorError::Command{ host: String::new(), command: add_cmd, code: Some(output.status), stderr: output.stderr });
	}
	Ok(())
}

/// Enumerates the table's current routes and deletes every entry whose
/// destination parses as an IPv6 prefix. Errors deleting individual entries
/// are logged but non-fatal (spec.md §4.5 step 2).
fn clear_table<S: ShellSession>(session: &mut S, table: &str) -> Result<(), OrchestratorError>
{
	let list_cmd = format!("ip -6 route show table {}", table);
	let listing = session.exec(&list_cmd)?;
	if !listing.is_success_or_idempotent() || listing.stdout.trim().is_empty()
	{
		return Ok(());
	}
	for line in listing.stdout.lines()
	{
		let Some(prefix) = line.split_whitespace().next() else { continue };
		if prefix.parse::<ipnet::Ipv6Net>().is_err()
		{
			continue;
		}
		let del_cmd = format!("ip -6 route del {} table {}", prefix, table);
		match session.exec(&del_cmd)
		{
			Ok(out) if !out.is_success_or_idempotent() => warn!("could not delete {} from table {}: {}", prefix, table, out.stderr),
			Err(e) => warn!("could not delete {} from table {}: {}", prefix, table, e),
			_ => {},
		}
	}
	Ok(())
}
