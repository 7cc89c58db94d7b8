use std::time::Duration;

/// Everything that can go wrong below the result taxonomy. Callers of the
/// send APIs see these folded into [`ApnResult`](crate::ApnResult) as
/// `ClientError` (or `IoError` when the socket itself failed); the raw enum
/// only escapes from setup paths such as session construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("session is closed")]
	SessionClosed,
	#[error("connection is closed")]
	ConnectionClosed,
	#[error("request timed out after {0:?}")]
	Timeout(Duration),
	#[error("invalid configuration: {0}")]
	Config(String),
	#[error("credentials rejected: {0}")]
	Credentials(String),
	#[error("http/2 error: {0}")]
	Http2(#[from] h2::Error),
	#[error("invalid request: {0}")]
	Http(#[from] http::Error),
	#[error("tls error: {0}")]
	Tls(#[from] rustls::Error),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}
