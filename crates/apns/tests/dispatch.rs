//! Drives the real dispatcher against an in-process HTTP/2 server over an
//! in-memory duplex, asserting on what actually crosses the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::request::Parts;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, watch};

use apns::client::ApnConnection;
use apns::{
	ApnResult, ApnToken, ConnectionInfo, Error, FatalReason, JsonAps, PushType, SILENT_BODY,
	TemporaryReason,
};

fn connection_info(topic: &str, max_streams: usize) -> Arc<ConnectionInfo> {
	// The duplex transport never runs a handshake, so an empty trust store
	// is fine here.
	let tls = rustls::ClientConfig::builder_with_provider(apns::tls::provider())
		.with_protocol_versions(apns::tls::TLS_VERSIONS)
		.unwrap()
		.with_root_certificates(rustls::RootCertStore::empty())
		.with_no_client_auth();
	Arc::new(
		ConnectionInfo::new("api.push.apple.com", topic, max_streams, false, Arc::new(tls))
			.unwrap(),
	)
}

struct Received {
	parts: Parts,
	body: Vec<u8>,
}

/// Mock APNs: answers every stream with the given status and body, and
/// reports what it saw.
fn spawn_server(
	io: DuplexStream,
	status: u16,
	body: &'static [u8],
) -> mpsc::UnboundedReceiver<Received> {
	let (tx, rx) = mpsc::unbounded_channel();
	tokio::spawn(async move {
		let mut conn = h2::server::handshake(io).await.unwrap();
		while let Some(Ok((request, mut respond))) = conn.accept().await {
			let tx = tx.clone();
			tokio::spawn(async move {
				let (parts, mut recv) = request.into_parts();
				let mut collected = Vec::new();
				while let Some(chunk) = recv.data().await {
					let chunk = chunk.unwrap();
					let _ = recv.flow_control().release_capacity(chunk.len());
					collected.extend_from_slice(&chunk);
				}
				let response = http::Response::builder().status(status).body(()).unwrap();
				if body.is_empty() {
					respond.send_response(response, true).unwrap();
				} else {
					let mut stream = respond.send_response(response, false).unwrap();
					stream.send_data(Bytes::from_static(body), true).unwrap();
				}
				let _ = tx.send(Received {
					parts,
					body: collected,
				});
			});
		}
	});
	rx
}

async fn connected(
	topic: &str,
	max_streams: usize,
	status: u16,
	body: &'static [u8],
) -> (
	ApnConnection,
	mpsc::UnboundedReceiver<Received>,
	watch::Sender<bool>,
) {
	let (client_io, server_io) = tokio::io::duplex(64 * 1024);
	let seen = spawn_server(server_io, status, body);
	let (drain_tx, drain_rx) = watch::channel(false);
	let conn = ApnConnection::handshake(client_io, connection_info(topic, max_streams), drain_rx)
		.await
		.unwrap();
	(conn, seen, drain_tx)
}

fn token() -> ApnToken {
	ApnToken::from_hex("deadbeef00112233")
}

#[tokio::test]
async fn silent_send_wire_form() {
	let (mut conn, mut seen, _drain) = connected("com.example.MyApp", 10, 200, b"").await;

	let result = conn
		.send_raw(&token(), None, PushType::Background, None, SILENT_BODY)
		.await
		.unwrap();
	assert!(result.is_ok());

	let got = seen.recv().await.unwrap();
	assert_eq!(got.parts.method, http::Method::POST);
	assert_eq!(got.parts.uri.path(), "/3/device/deadbeef00112233");
	assert_eq!(got.parts.headers["apns-push-type"], "background");
	assert_eq!(got.parts.headers["apns-priority"], "5");
	assert_eq!(got.parts.headers["apns-topic"], "com.example.MyApp");
	assert_eq!(got.body, SILENT_BODY);
}

#[tokio::test]
async fn widget_send_addresses_widget_topic_without_priority() {
	let (mut conn, mut seen, _drain) = connected("com.example.MyApp", 10, 200, b"").await;

	let body = serde_json::to_vec(&JsonAps::widget_message()).unwrap();
	let result = conn
		.send_raw(&token(), None, PushType::Widgets, None, &body)
		.await
		.unwrap();
	assert!(result.is_ok());

	let got = seen.recv().await.unwrap();
	assert_eq!(
		got.parts.headers["apns-topic"],
		"com.example.MyApp.push-type.widgets"
	);
	assert_eq!(got.parts.headers["apns-push-type"], "widgets");
	assert!(got.parts.headers.get("apns-priority").is_none());
	assert_eq!(got.body, body);
}

#[tokio::test]
async fn bearer_token_crosses_the_wire() {
	let (mut conn, mut seen, _drain) = connected("com.example.MyApp", 10, 200, b"").await;

	let result = conn
		.send_raw(&token(), Some("provider-jwt"), PushType::Alert, None, b"{}")
		.await
		.unwrap();
	assert!(result.is_ok());

	let got = seen.recv().await.unwrap();
	assert_eq!(got.parts.headers["authorization"], "bearer provider-jwt");
}

#[tokio::test]
async fn fatal_rejection_is_classified() {
	let (mut conn, _seen, _drain) =
		connected("com.example.MyApp", 10, 410, br#"{"reason":"Unregistered"}"#).await;

	let result = conn
		.send_raw(&token(), None, PushType::Alert, None, b"{}")
		.await
		.unwrap();
	match result {
		ApnResult::Fatal(reason) => assert_eq!(reason, FatalReason::Unregistered),
		other => panic!("expected fatal, got {other:?}"),
	}
}

#[tokio::test]
async fn temporary_rejection_is_classified() {
	let (mut conn, _seen, _drain) =
		connected("com.example.MyApp", 10, 429, br#"{"reason":"TooManyRequests"}"#).await;

	let result = conn
		.send_raw(&token(), None, PushType::Alert, None, b"{}")
		.await
		.unwrap();
	match result {
		ApnResult::Temporary(reason) => assert_eq!(reason, TemporaryReason::TooManyRequests),
		other => panic!("expected temporary, got {other:?}"),
	}
}

#[tokio::test]
async fn unknown_temporary_reason_is_a_client_error() {
	let (mut conn, _seen, _drain) =
		connected("com.example.MyApp", 10, 503, br#"{"reason":"HeatDeath"}"#).await;

	let result = conn
		.send_raw(&token(), None, PushType::Alert, None, b"{}")
		.await;
	assert!(matches!(result, Err(Error::Json(_))));
}

#[tokio::test]
async fn stream_slots_bound_in_flight_requests() {
	let (client_io, server_io) = tokio::io::duplex(64 * 1024);
	let in_flight = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));
	{
		let in_flight = in_flight.clone();
		let peak = peak.clone();
		tokio::spawn(async move {
			let mut conn = h2::server::handshake(server_io).await.unwrap();
			while let Some(Ok((request, mut respond))) = conn.accept().await {
				let in_flight = in_flight.clone();
				let peak = peak.clone();
				tokio::spawn(async move {
					let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					let (_parts, mut recv) = request.into_parts();
					while let Some(chunk) = recv.data().await {
						let chunk = chunk.unwrap();
						let _ = recv.flow_control().release_capacity(chunk.len());
					}
					tokio::time::sleep(Duration::from_millis(50)).await;
					in_flight.fetch_sub(1, Ordering::SeqCst);
					let response = http::Response::builder().status(200).body(()).unwrap();
					respond.send_response(response, true).unwrap();
				});
			}
		});
	}

	let (_drain_tx, drain_rx) = watch::channel(false);
	let conn = ApnConnection::handshake(client_io, connection_info("com.example.MyApp", 2), drain_rx)
		.await
		.unwrap();

	let mut tasks = Vec::new();
	for _ in 0..6 {
		let mut conn = conn.clone();
		let token = token();
		tasks.push(tokio::spawn(async move {
			conn.send_raw(&token, None, PushType::Background, None, SILENT_BODY)
				.await
		}));
	}
	for task in tasks {
		assert!(task.await.unwrap().unwrap().is_ok());
	}
	assert!(
		peak.load(Ordering::SeqCst) <= 2,
		"more than two streams were in flight at once"
	);
}

#[tokio::test]
async fn drained_connection_refuses_sends() {
	let (mut conn, _seen, drain) = connected("com.example.MyApp", 10, 200, b"").await;

	drain.send(true).unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert!(!conn.is_open());
	let result = conn
		.send_raw(&token(), None, PushType::Alert, None, b"{}")
		.await;
	assert!(matches!(result, Err(Error::ConnectionClosed)));
}
