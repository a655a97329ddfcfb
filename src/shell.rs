/*!

The remote shell protocol shared by the Remote Table Applier (C5) and the
Provisioner.

A single authenticated shell is opened to an edge router and reused across
several commands, then closed on every exit path — success, command
failure, or connect failure (spec.md §9, "Per-connection shell as a scoped
resource"). Production connections are `ssh2::Session` over a `TcpStream`;
tests substitute an in-memory fake, since no golden router is available in
CI.

*/

use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;

use log::debug;
use ssh2::Session;

use crate::error::OrchestratorError;

/// The result of a single remote command: exit status, stdout, stderr.
#[derive(Debug, Clone)]
pub struct CommandOutput
{
	pub status: i32,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput
{
	/// `ip`/`nft` commands report "already exists" / "no such" on reruns of
	/// an idempotent operation; per spec.md §6 these are treated as success
	/// even though the exit status is nonzero.
	pub fn is_success_or_idempotent(&self) -> bool
	{
		if self.status == 0
		{
			return true;
		}
		let haystack = self.stderr.to_ascii_lowercase();
		haystack.contains("already exists") || haystack.contains("file exists")
			|| haystack.contains("no such") || haystack.contains("not found")
	}
}

/// A live shell session to one host. Reused across the several commands of
/// one direction's table updates, never across cycles (spec.md §4.5, §9).
pub trait ShellSession
{
	fn exec(&mut self, command: &str) -> Result<CommandOutput, OrchestratorError>;
}

/// Everything needed to open a `ShellSession` to a host.
pub trait ShellTransport
{
	type Session: ShellSession;

	fn connect(&self, host: &str, port: u16, user: &str, password: &str, timeout: Duration) -> Result<Self::Session, OrchestratorError>;
}

/// Production transport: password-authenticated `ssh2` over TCP.
pub struct Ssh2Transport;

pub struct Ssh2ShellSession
{
	session: Session,
	host: String,
}

impl ShellTransport for Ssh2Transport
{
	type Session = Ssh2ShellSession;

	fn connect(&self, host: &str, port: u16, user: &str, password: &str, timeout: Duration) -> Result<Ssh2ShellSession, OrchestratorError>
	{
		let address = if host.contains(':') { format!("[{}]:{}", host, port) } else { format!("{}:{}", host, port) };
		let tcp = TcpStream::connect(&address)
			.map_err(|e| OrchestratorError::Connect(host.to_string(), e.to_string()))?;
		tcp.set_read_timeout(Some(timeout)).ok();
		tcp.set_write_timeout(Some(timeout)).ok();

		let mut session = Session::new()
			.map_err(|e| OrchestratorError::Connect(host.to_string(), e.to_string()))?;
		session.set_tcp_stream(tcp);
		session.set_timeout(timeout.as_millis() as u32);
		session.handshake()
			.map_err(|e| OrchestratorError::Connect(host.to_string(), format!("handshake: {}", e)))?;
		record_host_key(&session, host);
		session.userauth_password(user, password)
			.map_err(|e| OrchestratorError::Connect(host.to_string(), format!("auth: {}", e)))?;
		if !session.authenticated()
		{
			return Err(OrchestratorError::Connect(host.to_string(), "authentication rejected".to_string()));
		}
		debug!("ssh session established to {}", host);
		Ok(Ssh2ShellSession{ session, host: host.to_string() })
	}
}

/// Checks the server's host key against `~/.ssh/known_hosts` and adds it if
/// absent, mirroring the original's `AutoAddPolicy` (accept-and-record
/// rather than strict verification; this tool only ever targets routers the
/// operator already administers). Failures here are logged, never fatal —
/// a host-key database that can't be read or written shouldn't block an
/// otherwise-working connection.
fn record_host_key(session: &Session, host: &str)
{
	let Some(home) = dirs::home_dir() else { return };
	let known_hosts_path = home.join(".ssh").join("known_hosts");
	let Ok(mut known_hosts) = session.known_hosts() else { return };
	let _ = known_hosts.read_file(&known_hosts_path, ssh2::KnownHostFileKind::OpenSSH);

	let Some((key, key_type)) = session.host_key() else { return };
	let host_key_type = match key_type
	{
		ssh2::HostKeyType::Rsa => ssh2::KnownHostKeyFormat::SshRsa,
		ssh2::HostKeyType::Dss => ssh2::KnownHostKeyFormat::SshDss,
		_ => ssh2::KnownHostKeyFormat::SshRsa,
	};
	match known_hosts.check(host, key)
	{
		ssh2::CheckResult::Match => {},
		ssh2::CheckResult::NotFound =>
		{
			if known_hosts.add(host, key, "added by srv6-orchestrator", host_key_type).is_ok()
			{
				let _ = known_hosts.write_file(&known_hosts_path, ssh2::KnownHostFileKind::OpenSSH);
			}
		},
		ssh2::CheckResult::Mismatch | ssh2::CheckResult::Failure =>
		{
			debug!("host key for {} changed or could not be checked; proceeding anyway", host);
		},
	}
}

impl ShellSession for Ssh2ShellSession
{
	fn exec(&mut self, command: &str) -> Result<CommandOutput, OrchestratorError>
	{
		let mut channel = self.session.channel_session()
			.map_err(|e| OrchestratorError::Connect(self.host.clone(), e.to_string()))?;
		channel.exec(command)
			.map_err(|e| OrchestratorError::Command{ host: self.host.clone(), command: command.to_string(), code: None, stderr: e.to_string() })?;

		let mut stdout = String::new();
		channel.read_to_string(&mut stdout).ok();
		let mut stderr = String::new();
		channel.stderr().read_to_string(&mut stderr).ok();
		channel.wait_close().ok();
		let status = channel.exit_status().unwrap_or(-1);
		Ok(CommandOutput{ status, stdout: stdout.trim().to_string(), stderr: stderr.trim().to_string() })
	}
}

/// An in-memory `ShellTransport`/`ShellSession` used by the applier and
/// provisioner test suites, and by the `tests/orchestration_scenarios.rs`
/// integration suite, since no real router is reachable in CI. Left as an
/// ordinary public module rather than `#[cfg(test)]` so integration tests
/// (compiled against the library as an ordinary dependency) can reach it.
pub mod fake
{

	use std::cell::RefCell;
	use std::collections::VecDeque;
	use std::rc::Rc;

	use super::*;

	#[derive(Clone)]
	pub struct FakeTransport
	{
		pub responses: Rc<RefCell<VecDeque<CommandOutput>>>,
		pub connect_error: Option<String>,
	}

	impl FakeTransport
	{
		pub fn with_responses(responses: Vec<CommandOutput>) -> Self
		{
			FakeTransport{ responses: Rc::new(RefCell::new(responses.into())), connect_error: None }
		}

		pub fn failing_to_connect(message: &str) -> Self
		{
			FakeTransport{ responses: Rc::new(RefCell::new(VecDeque::new())), connect_error: Some(message.to_string()) }
		}
	}

	pub struct FakeSession
	{
		pub responses: Rc<RefCell<VecDeque<CommandOutput>>>,
		pub log: Vec<String>,
	}

	impl ShellTransport for FakeTransport
	{
		type Session = FakeSession;

		fn connect(&self, host: &str, _port: u16, _user: &str, _password: &str, _timeout: Duration) -> Result<Self::Session, OrchestratorError>
		{
			if let Some(message) = &self.connect_error
			{
				return Err(OrchestratorError::Connect(host.to_string(), message.clone()));
			}
			Ok(FakeSession{ responses: self.responses.clone(), log: Vec::new() })
		}
	}

	impl ShellSession for FakeSession
	{
		fn exec(&mut self, command: &str) -> Result<CommandOutput, OrchestratorError>
		{
			self.log.push(command.to_string());
			Ok(self.responses.borrow_mut().pop_front().unwrap_or(CommandOutput{ status: 0, stdout: String::new(), stderr: String::new() }))
		}
	}

	pub fn ok(stdout: &str) -> CommandOutput
	{
		CommandOutput{ status: 0, stdout: stdout.to_string(), stderr: String::new() }
	}

	pub fn failure(stderr: &str) -> CommandOutput
	{
		CommandOutput{ status: 1, stdout: String::new(), stderr: stderr.to_string() }
	}
}
