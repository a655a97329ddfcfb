/*!

The error taxonomy used throughout the orchestrator and provisioner.

Each variant corresponds to one of the failure classes from the error
handling design: configuration errors are fatal, everything else is
recovered at the smallest enclosing step (per-sample, per-table,
per-direction) by the caller.

*/

use thiserror::Error;

/// A node identifier that does not exist in the topology, or a node pair
/// with no recorded relationship.
pub type NodeId = u32;

#[derive(Error, Debug)]
pub enum OrchestratorError
{
	/// Missing or invalid credentials, unknown node id, malformed prefix.
	/// Surfaced immediately; the process exits non-zero.
	#[error("configuration error: {0}")]
	Config(String),

	/// A per-link sample could not be obtained this cycle. Non-fatal: the
	/// link's weight falls back to the weight floor.
	#[error("sample unavailable for link ({0},{1}): {2}")]
	SampleUnavailable(NodeId, NodeId, String),

	/// Could not open or maintain a shell session to an edge router. The
	/// affected direction is skipped for this cycle.
	#[error("could not connect to {0}: {1}")]
	Connect(String, String),

	/// A remote command failed non-idempotently. The affected table is
	/// skipped; other tables in the same direction are still attempted.
	#[error("command `{command}` on {host} failed (exit {code:?}): {stderr}")]
	Command
	{
		host: String,
		command: String,
		code: Option<i32>,
		stderr: String,
	},

	/// A hop in a planned path has no defined forward/return segment
	/// mapping. This is a configuration bug, not a runtime failure; the
	/// affected tier is dropped for this cycle.
	#[error("missing endpoint for hop {0}->{1}")]
	MissingEndpoint(NodeId, NodeId),

	/// The planner could not find any path between the requested source
	/// and destination.
	#[error("no path from {0} to {1}")]
	NoPath(NodeId, NodeId),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
