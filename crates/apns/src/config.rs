use std::path::PathBuf;
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use serde::Deserialize;

use crate::error::Error;

/// APNs production endpoint.
pub const PRODUCTION_HOST: &str = "api.push.apple.com";
/// APNs sandbox endpoint, for development builds.
pub const SANDBOX_HOST: &str = "api.sandbox.push.apple.com";

fn default_max_concurrent_streams() -> usize {
	10
}

fn default_max_connections() -> usize {
	1
}

/// Caller-facing session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionConfig {
	/// Client certificate (PEM). Required unless `use_jwt`.
	#[serde(default)]
	pub certificate: Option<PathBuf>,
	/// Client private key (PEM). Required unless `use_jwt`.
	#[serde(default)]
	pub key: Option<PathBuf>,
	/// CA bundle used to verify the APNs server. Required unless `use_jwt`,
	/// which trusts the system store instead.
	#[serde(default)]
	pub ca: Option<PathBuf>,
	/// Authenticate with caller-supplied bearer tokens instead of a client
	/// certificate. The token itself travels with each send.
	#[serde(default)]
	pub use_jwt: bool,
	/// Target the sandbox environment.
	#[serde(default)]
	pub sandbox: bool,
	/// In-flight notification bound per connection.
	#[serde(default = "default_max_concurrent_streams")]
	pub max_concurrent_streams: usize,
	/// Live connection bound per session.
	#[serde(default = "default_max_connections")]
	pub max_connections: usize,
	/// Bundle id of the receiving application.
	pub topic: String,
}

impl SessionConfig {
	/// Configuration with defaults for the given bundle id. Callers fill in
	/// either the certificate triple or `use_jwt`.
	pub fn new(topic: impl Into<String>) -> SessionConfig {
		SessionConfig {
			certificate: None,
			key: None,
			ca: None,
			use_jwt: false,
			sandbox: false,
			max_concurrent_streams: default_max_concurrent_streams(),
			max_connections: default_max_connections(),
			topic: topic.into(),
		}
	}
}

/// Immutable connection parameters, captured once at session creation and
/// handed to the factory every time the pool dials.
#[derive(Clone)]
pub struct ConnectionInfo {
	pub(crate) hostname: String,
	pub(crate) server_name: ServerName<'static>,
	pub(crate) tls: Arc<ClientConfig>,
	pub(crate) topic: String,
	pub(crate) max_concurrent_streams: usize,
	pub(crate) use_jwt: bool,
}

impl ConnectionInfo {
	pub fn new(
		hostname: impl Into<String>,
		topic: impl Into<String>,
		max_concurrent_streams: usize,
		use_jwt: bool,
		tls: Arc<ClientConfig>,
	) -> Result<ConnectionInfo, Error> {
		let hostname = hostname.into();
		let server_name = ServerName::try_from(hostname.clone())
			.map_err(|_| Error::Config(format!("hostname {hostname} is not a valid dns name")))?;
		Ok(ConnectionInfo {
			hostname,
			server_name,
			tls,
			topic: topic.into(),
			max_concurrent_streams: max_concurrent_streams.max(1),
			use_jwt,
		})
	}

	pub fn hostname(&self) -> &str {
		&self.hostname
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub fn max_concurrent_streams(&self) -> usize {
		self.max_concurrent_streams
	}

	pub fn use_jwt(&self) -> bool {
		self.use_jwt
	}
}
