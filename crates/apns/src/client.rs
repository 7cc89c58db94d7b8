use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::future::poll_fn;
use h2::Reason;
use h2::client::SendRequest;
use http::{Request, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Semaphore, watch};
use tracing::{Instrument, debug, trace, warn};

use crate::config::ConnectionInfo;
use crate::error::Error;
use crate::request::{self, Priority, PushType};
use crate::response::{self, ApnResult};
use crate::token::ApnToken;

/// HTTP/2 SETTINGS advertised to APNs.
const MAX_FRAME_SIZE: u32 = 16_384;
const MAX_HEADER_LIST_SIZE: u32 = 4_096;
const INITIAL_WINDOW_SIZE: u32 = 65_536;
/// Cadence of the per-connection worker replenishing the connection-level
/// inbound flow window.
const WINDOW_REPLENISH_PERIOD: Duration = Duration::from_secs(1);

/// One TLS-secured HTTP/2 connection to APNs.
///
/// Cheap to clone; every clone shares the stream-slot semaphore and the open
/// flag. A connection reporting `is_open() == false` must be discarded, not
/// reused; the pool enforces that at checkout.
#[derive(Clone)]
pub struct ApnConnection {
	sender: SendRequest<Bytes>,
	info: Arc<ConnectionInfo>,
	streams: Arc<Semaphore>,
	open: Arc<AtomicBool>,
}

/// Dials one connection per the session's [`ConnectionInfo`]: TCP to
/// `<hostname>:443`, TLS handshake, HTTP/2 handshake.
pub(crate) async fn connect(
	info: Arc<ConnectionInfo>,
	drain: watch::Receiver<bool>,
) -> Result<ApnConnection, Error> {
	let tcp = TcpStream::connect((info.hostname.as_str(), 443)).await?;
	tcp.set_nodelay(true)?;
	let connector = tokio_rustls::TlsConnector::from(info.tls.clone());
	let stream = connector.connect(info.server_name.clone(), tcp).await?;
	trace!(hostname = %info.hostname, "transport connected, handshaking");
	ApnConnection::handshake(stream, info, drain).await
}

impl ApnConnection {
	/// HTTP/2 handshake over an established transport, spawning the driver
	/// task that polls the connection state machine and pumps the flow
	/// window. Generic over the transport so tests can run it over an
	/// in-memory duplex.
	pub async fn handshake<IO>(
		io: IO,
		info: Arc<ConnectionInfo>,
		drain: watch::Receiver<bool>,
	) -> Result<ApnConnection, Error>
	where
		IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let mut builder = h2::client::Builder::new();
		builder
			.max_frame_size(MAX_FRAME_SIZE)
			.max_concurrent_streams(info.max_concurrent_streams as u32)
			.initial_max_send_streams(info.max_concurrent_streams)
			.max_header_list_size(MAX_HEADER_LIST_SIZE)
			.initial_window_size(INITIAL_WINDOW_SIZE)
			.initial_connection_window_size(INITIAL_WINDOW_SIZE)
			.enable_push(true);
		let (sender, connection) = builder.handshake::<_, Bytes>(io).await?;

		let open = Arc::new(AtomicBool::new(true));
		tokio::spawn(drive_connection(connection, drain, open.clone()).in_current_span());

		Ok(ApnConnection {
			sender,
			streams: Arc::new(Semaphore::new(info.max_concurrent_streams)),
			info,
			open,
		})
	}

	/// Lowered on GOAWAY, driver exit, or session close.
	pub fn is_open(&self) -> bool {
		self.open.load(Ordering::SeqCst)
	}

	fn mark_closed(&self) {
		self.open.store(false, Ordering::SeqCst);
	}

	/// A pooled connection may have died while idle (GOAWAY, socket error).
	/// Cheap poll before reuse, on top of the open flag.
	pub(crate) fn ready_to_use(&mut self) -> bool {
		if !self.is_open() {
			return false;
		}
		let cx = &mut Context::from_waker(futures::task::noop_waker_ref());
		match self.sender.poll_ready(cx) {
			Poll::Ready(Ok(())) => true,
			// We may have gotten GOAWAY while idle.
			Poll::Ready(Err(_)) => {
				self.mark_closed();
				false
			},
			Poll::Pending => {
				warn!("pooled connection is pending, skipping");
				false
			},
		}
	}

	/// Sends one notification over this connection and classifies the
	/// response.
	///
	/// A slot on the stream semaphore is held for the whole exchange and
	/// released on every exit path, including cancellation. A peer refusal
	/// to open the stream maps to `Backoff`; everything else is classified
	/// from the response status and reason body.
	pub async fn send_raw(
		&mut self,
		token: &ApnToken,
		jwt: Option<&str>,
		push_type: PushType,
		priority: Option<Priority>,
		body: &[u8],
	) -> Result<ApnResult, Error> {
		let _slot = self
			.streams
			.clone()
			.acquire_owned()
			.await
			.map_err(|_| Error::ConnectionClosed)?;

		if !self.is_open() {
			return Err(Error::ConnectionClosed);
		}

		let request = request::build_request(
			&self.info.hostname,
			&self.info.topic,
			token,
			push_type,
			priority,
			jwt,
		)?;
		trace!(
			token = token.as_hex(),
			push_type = push_type.as_str(),
			"sending notification"
		);

		match self.exchange(request, body).await {
			Ok((status, body)) => response::classify(status, &body),
			Err(e) if e.reason() == Some(Reason::REFUSED_STREAM) => {
				debug!("stream refused, backing off");
				Ok(ApnResult::Backoff)
			},
			Err(e) => {
				if e.is_go_away() {
					debug!("received GOAWAY, retiring connection");
					self.mark_closed();
				}
				Err(Error::Http2(e))
			},
		}
	}

	/// One request/response exchange on a fresh stream, respecting outgoing
	/// flow control.
	async fn exchange(
		&mut self,
		request: Request<()>,
		body: &[u8],
	) -> Result<(StatusCode, Vec<u8>), h2::Error> {
		// Must resolve before send_request may be called.
		poll_fn(|cx| self.sender.poll_ready(cx)).await?;
		let (response, mut stream) = self.sender.send_request(request, body.is_empty())?;

		if !body.is_empty() {
			let mut remaining = Bytes::copy_from_slice(body);
			stream.reserve_capacity(remaining.len());
			while !remaining.is_empty() {
				let granted = match poll_fn(|cx| stream.poll_capacity(cx)).await {
					Some(granted) => granted?,
					None => return Err(Reason::STREAM_CLOSED.into()),
				};
				let chunk = remaining.split_to(granted.min(remaining.len()));
				stream.send_data(chunk, remaining.is_empty())?;
			}
		}

		let response = response.await?;
		let (parts, mut recv) = response.into_parts();
		let mut buf = Vec::new();
		while let Some(chunk) = recv.data().await {
			let chunk = chunk?;
			let _ = recv.flow_control().release_capacity(chunk.len());
			buf.extend_from_slice(&chunk);
		}
		Ok((parts.status, buf))
	}
}

/// Drives the HTTP/2 state machine for one connection and, once per second,
/// replenishes the connection-level inbound flow window. Terminates when
/// the peer hangs up, the transport errors, or the pool drains; the open
/// flag is lowered on the way out so the pool cannot reuse the connection.
async fn drive_connection<IO>(
	mut connection: h2::client::Connection<IO, Bytes>,
	mut drain: watch::Receiver<bool>,
	open: Arc<AtomicBool>,
) where
	IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	let mut replenish = tokio::time::interval(WINDOW_REPLENISH_PERIOD);
	loop {
		tokio::select! {
			res = &mut connection => {
				match res {
					Ok(()) => debug!("connection closed by peer"),
					Err(e) => warn!("connection failed: {e}"),
				}
				break;
			}
			_ = replenish.tick() => {
				connection.set_target_window_size(INITIAL_WINDOW_SIZE);
			}
			_ = drain.changed() => {
				debug!("draining connection");
				break;
			}
		}
	}
	open.store(false, Ordering::SeqCst);
}
