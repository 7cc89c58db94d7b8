//! Client library for delivering push notifications to Apple's APNs over
//! HTTP/2 with TLS.
//!
//! An [`ApnSession`] multiplexes many concurrent sends over a small pool of
//! persistent, authenticated connections. Each send checks a connection out
//! of the pool, takes a stream slot on it, writes the request, and maps the
//! APNs response onto the [`ApnResult`] taxonomy. Authentication is either a
//! client certificate presented during the TLS handshake or a caller-minted
//! JWT bearer token forwarded per send; this library never mints tokens
//! itself.
//!
//! ```no_run
//! # async fn doc() -> Result<(), apns::Error> {
//! use apns::{ApnSession, ApnToken, JsonAps, SessionConfig};
//!
//! let mut cfg = SessionConfig::new("com.example.MyApp");
//! cfg.certificate = Some("cert.pem".into());
//! cfg.key = Some("key.pem".into());
//! cfg.ca = Some("ca.pem".into());
//! let session = ApnSession::new(cfg)?;
//!
//! let token = ApnToken::from_hex("0123456789abcdef");
//! let payload = JsonAps::alert_message("hello", "world", None);
//! let result = session.send(&token, &payload).await;
//! assert!(result.is_ok());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod error;
pub mod payload;
mod pool;
pub mod request;
pub mod response;
mod session;
pub mod tls;
mod token;

pub use client::ApnConnection;
pub use config::{ConnectionInfo, PRODUCTION_HOST, SANDBOX_HOST, SessionConfig};
pub use error::Error;
pub use payload::{ApsAlert, ApsMessage, InterruptionLevel, JsonAps, SILENT_BODY};
pub use request::{Priority, PushType, build_request, wire_topic};
pub use response::{ApnResult, FatalReason, TemporaryReason};
pub use session::ApnSession;
pub use token::ApnToken;
