use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::config::{ConnectionInfo, PRODUCTION_HOST, SANDBOX_HOST, SessionConfig};
use crate::error::Error;
use crate::payload::{JsonAps, SILENT_BODY};
use crate::pool::Pool;
use crate::request::{Priority, PushType};
use crate::response::ApnResult;
use crate::tls;
use crate::token::ApnToken;

/// Top-level handle for sending notifications. Cheap to clone and fully
/// thread-safe; all clones share the connection pool and the open flag.
#[derive(Clone)]
pub struct ApnSession {
	state: Arc<SessionState>,
}

struct SessionState {
	info: Arc<ConnectionInfo>,
	pool: Pool,
	open: AtomicBool,
}

impl ApnSession {
	/// Builds a session from the configuration.
	///
	/// In certificate mode the trust store and client credentials load
	/// eagerly; a configuration whose credentials do not load is rejected
	/// here rather than at first send. No connection is dialed until the
	/// first send needs one.
	pub fn new(cfg: SessionConfig) -> Result<ApnSession, Error> {
		let hostname = if cfg.sandbox { SANDBOX_HOST } else { PRODUCTION_HOST };
		let tls = tls::client_config(&cfg)?;
		let info = Arc::new(ConnectionInfo::new(
			hostname,
			cfg.topic,
			cfg.max_concurrent_streams,
			cfg.use_jwt,
			tls,
		)?);
		debug!(
			hostname,
			topic = info.topic(),
			jwt = info.use_jwt(),
			"session created"
		);
		let pool = Pool::new(info.clone(), cfg.max_connections);
		Ok(ApnSession {
			state: Arc::new(SessionState {
				info,
				pool,
				open: AtomicBool::new(true),
			}),
		})
	}

	/// Whether `close` has not been called yet.
	pub fn is_open(&self) -> bool {
		self.state.open.load(Ordering::SeqCst)
	}

	/// Whether this session authenticates with caller-supplied bearer
	/// tokens instead of a client certificate.
	pub fn uses_jwt(&self) -> bool {
		self.state.info.use_jwt()
	}

	/// The bundle id this session addresses.
	pub fn topic(&self) -> &str {
		self.state.info.topic()
	}

	/// Closes the session and releases every pooled connection. Sends
	/// issued afterwards return `ClientError(SessionClosed)`.
	///
	/// Panics when called twice; closing a closed session is a programming
	/// error.
	pub fn close(&self) {
		let was_open = self.state.open.swap(false, Ordering::SeqCst);
		assert!(was_open, "session closed twice");
		self.state.pool.destroy_all();
	}

	/// Sends `payload` as `push_type` to `token`, optionally with an
	/// explicit priority and a bearer token. The full-control entry point;
	/// the other senders are conveniences over it.
	pub async fn send_message(
		&self,
		token: &ApnToken,
		payload: &JsonAps,
		push_type: PushType,
		priority: Option<Priority>,
		jwt: Option<&str>,
	) -> ApnResult {
		let body = match serde_json::to_vec(payload) {
			Ok(body) => body,
			Err(e) => return ApnResult::ClientError(Error::Json(e)),
		};
		self.send_raw(token, push_type, priority, jwt, &body).await
	}

	/// Sends an alert notification with the push-type default priority.
	pub async fn send(&self, token: &ApnToken, payload: &JsonAps) -> ApnResult {
		self.send_message(token, payload, PushType::Alert, None, None).await
	}

	/// Background ping waking the app with no user-visible content.
	pub async fn send_silent_message(&self, token: &ApnToken) -> ApnResult {
		self.send_raw(token, PushType::Background, None, None, SILENT_BODY)
			.await
	}

	/// Tells the device to refresh the app's widgets. The wire topic gains
	/// the widgets suffix and no priority header is sent unless the caller
	/// picks one.
	pub async fn send_widget_notification(
		&self,
		token: &ApnToken,
		jwt: Option<&str>,
		priority: Option<Priority>,
	) -> ApnResult {
		let payload = JsonAps::widget_message();
		self.send_message(token, &payload, PushType::Widgets, priority, jwt)
			.await
	}

	/// Sends caller-encoded body bytes. All errors below the result
	/// taxonomy are folded in here; this is the session boundary the rest
	/// of the stack propagates to.
	pub async fn send_raw(
		&self,
		token: &ApnToken,
		push_type: PushType,
		priority: Option<Priority>,
		jwt: Option<&str>,
		body: &[u8],
	) -> ApnResult {
		if !self.is_open() {
			return ApnResult::ClientError(Error::SessionClosed);
		}
		let res = self
			.state
			.pool
			.with_connection(|mut conn| async move {
				conn.send_raw(token, jwt, push_type, priority, body).await
			})
			.await;
		match res {
			Ok(result) => result,
			Err(e) => e.into(),
		}
	}
}
