use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tracing::{Instrument, debug, trace};

use crate::client::{self, ApnConnection};
use crate::config::ConnectionInfo;
use crate::error::Error;

/// Unused connections are evicted after five minutes.
const IDLE_TTL: Duration = Duration::from_secs(300);
/// Bound on one acquire+send+receive sequence, pool waits included.
pub(crate) const CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// A capacity-bounded pool of connections to one APNs host.
///
/// Invariants:
/// - at most `max_connections` live connections exist at once. Connections
///   are only dialed under a held checkout permit with the idle shelf empty,
///   so the permit count bounds them; callers past the bound wait.
/// - a connection whose open flag is down is dropped at checkout, never
///   handed to a caller.
pub(crate) struct Pool {
	state: Arc<PoolState>,
}

struct PoolState {
	info: Arc<ConnectionInfo>,
	/// One permit per concurrent checkout.
	slots: Arc<Semaphore>,
	/// Idle shelf. Entries are popped by checkouts, by their idle timer, or
	/// by the drain watch.
	idle: Arc<pingora_pool::ConnectionPool<ApnConnection>>,
	/// Distinguishes entries on the idle shelf.
	conn_id: AtomicI32,
	/// Group key for the single host this pool serves.
	group: u64,
	drain_tx: watch::Sender<bool>,
	drain_rx: watch::Receiver<bool>,
}

impl Pool {
	pub(crate) fn new(info: Arc<ConnectionInfo>, max_connections: usize) -> Pool {
		let max_connections = max_connections.max(1);
		let (drain_tx, drain_rx) = watch::channel(false);
		let mut hasher = DefaultHasher::new();
		info.hostname().hash(&mut hasher);
		let group = hasher.finish();
		Pool {
			state: Arc::new(PoolState {
				info,
				slots: Arc::new(Semaphore::new(max_connections)),
				idle: Arc::new(pingora_pool::ConnectionPool::new(max_connections)),
				conn_id: AtomicI32::new(0),
				group,
				drain_tx,
				drain_rx,
			}),
		}
	}

	/// Runs `f` with a checked-out connection under the call timeout.
	///
	/// On success the connection goes back to the idle shelf. If `f` errors
	/// or the timeout fires, the connection is dropped instead, so the next
	/// caller gets a fresh one.
	pub(crate) async fn with_connection<T, F, Fut>(&self, f: F) -> Result<T, Error>
	where
		F: FnOnce(ApnConnection) -> Fut,
		Fut: Future<Output = Result<T, Error>>,
	{
		let run = async {
			let _slot = self
				.state
				.slots
				.clone()
				.acquire_owned()
				.await
				.map_err(|_| Error::SessionClosed)?;
			let conn = self.state.checkout().await?;
			let res = f(conn.clone()).await;
			match res {
				Ok(value) => {
					self.state.checkin(conn);
					Ok(value)
				},
				Err(e) => {
					debug!("dropping connection after error: {e}");
					Err(e)
				},
			}
		};
		match tokio::time::timeout(CALL_TIMEOUT, run).await {
			Ok(res) => res,
			Err(_) => Err(Error::Timeout(CALL_TIMEOUT)),
		}
	}

	/// Closes every pooled connection and refuses new checkouts.
	pub(crate) fn destroy_all(&self) {
		debug!("destroying connection pool");
		self.state.slots.close();
		let _ = self.state.drain_tx.send(true);
	}
}

impl PoolState {
	/// Pops idle connections until a healthy one surfaces, or dials a new
	/// one. Always called with a checkout permit held.
	async fn checkout(&self) -> Result<ApnConnection, Error> {
		while let Some(mut conn) = self.idle.get(&self.group) {
			if conn.ready_to_use() {
				trace!("reusing pooled connection");
				return Ok(conn);
			}
			debug!("dropping dead pooled connection");
		}
		debug!("dialing new connection");
		client::connect(self.info.clone(), self.drain_rx.clone()).await
	}

	/// Shelves a connection and arms its idle timer. The timer pops the
	/// entry after `IDLE_TTL` unless a checkout or the drain watch gets
	/// there first.
	fn checkin(&self, conn: ApnConnection) {
		if !conn.is_open() {
			debug!("not shelving closed connection");
			return;
		}
		let meta = pingora_pool::ConnectionMeta::new(
			self.group,
			self.conn_id.fetch_add(1, Ordering::SeqCst),
		);
		let (evict, pickup) = self.idle.put(&meta, conn);
		let idle = self.idle.clone();
		let drain = self.drain_rx.clone();
		tokio::spawn(
			async move {
				idle.idle_timeout(&meta, IDLE_TTL, evict, drain, pickup).await;
			}
			.in_current_span(),
		);
	}
}

// Dropping the last pool handle drains every connection driver and cancels
// the outstanding idle timers.
impl Drop for PoolState {
	fn drop(&mut self) {
		debug!("pool dropping, draining connections");
		let _ = self.drain_tx.send(true);
	}
}
