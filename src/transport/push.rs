//! Send-only side of the transport
//!
//! The push channel listens on the node's port. Every accepted connection is
//! a puller; pullers never write, so the push side only reads them to notice
//! when they go away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};
use crate::protocol::write_frame;

// ─────────────────────────────────────────────────────────────────
// Connected pullers
// ─────────────────────────────────────────────────────────────────

/// One connected pull-side peer
struct Puller {
    id: u64,
    addr: SocketAddr,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    closed: CancellationToken,
}

impl Puller {
    async fn write(&self, frame: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, frame).await
    }
}

struct PullerSetInner {
    pullers: Vec<Arc<Puller>>,
    cursor: usize,
    next_id: u64,
}

/// Round-robin set of connected pullers
///
/// Publishes the connection count on a watch channel so senders can wait
/// for the first puller without polling.
struct PullerSet {
    inner: Mutex<PullerSetInner>,
    count: watch::Sender<usize>,
}

impl PullerSet {
    fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Mutex::new(PullerSetInner {
                pullers: Vec::new(),
                cursor: 0,
                next_id: 0,
            }),
            count,
        }
    }

    /// Register an accepted connection and start watching it for EOF
    fn attach(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr, shutdown: &CancellationToken) {
        let (reader, writer) = stream.into_split();
        let closed = shutdown.child_token();

        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.pullers.push(Arc::new(Puller {
                id,
                addr,
                writer: tokio::sync::Mutex::new(writer),
                closed: closed.clone(),
            }));
            self.count.send_replace(inner.pullers.len());
            id
        };

        let set = Arc::clone(self);
        tokio::spawn(async move {
            watch_puller(set, id, addr, reader, closed).await;
        });
    }

    /// Next puller in round-robin order
    fn next(&self) -> Option<Arc<Puller>> {
        let mut inner = self.inner.lock();
        if inner.pullers.is_empty() {
            return None;
        }
        let index = inner.cursor % inner.pullers.len();
        inner.cursor = index + 1;
        Some(Arc::clone(&inner.pullers[index]))
    }

    /// Drop a puller; returns false if it was already gone
    fn evict(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let Some(position) = inner.pullers.iter().position(|p| p.id == id) else {
            return false;
        };
        let puller = inner.pullers.remove(position);
        puller.closed.cancel();
        if inner.cursor > position {
            inner.cursor -= 1;
        }
        self.count.send_replace(inner.pullers.len());
        true
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        for puller in inner.pullers.drain(..) {
            puller.closed.cancel();
        }
        inner.cursor = 0;
        self.count.send_replace(0);
    }

    fn len(&self) -> usize {
        self.inner.lock().pullers.len()
    }

    fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

// ─────────────────────────────────────────────────────────────────
// Push Channel
// ─────────────────────────────────────────────────────────────────

/// Longer send timeouts are clamped so the deadline cannot overflow `Instant`
const MAX_SEND_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Milliseconds in `duration`, saturating at `u64::MAX`
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Outbound channel bound to this node's port
pub struct PushChannel {
    local_addr: SocketAddr,
    pullers: Arc<PullerSet>,
    shutdown: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl PushChannel {
    /// Bind on all interfaces and start accepting pullers
    pub async fn bind(port: u16) -> Result<Self> {
        let bind_addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Outbound channel bound");

        let pullers = Arc::new(PullerSet::new());
        let shutdown = CancellationToken::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&pullers),
            shutdown.clone(),
        ));

        Ok(Self {
            local_addr,
            pullers,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of pullers currently connected
    pub fn connected_pullers(&self) -> usize {
        self.pullers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Deliver one frame to exactly one connected puller
    ///
    /// Waits up to `timeout` for a puller to be available. A puller whose
    /// write fails is evicted and the next one is tried before the deadline.
    /// A write that overruns the deadline also evicts its puller, since the
    /// frame may be half-written.
    pub async fn send(&self, frame: &[u8], timeout: Duration) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }

        let deadline = Instant::now() + timeout.min(MAX_SEND_WAIT);
        let timeout_ms = whole_millis(timeout);
        let mut changes = self.pullers.subscribe();

        loop {
            while let Some(puller) = self.pullers.next() {
                match tokio::time::timeout_at(deadline, puller.write(frame)).await {
                    Ok(Ok(())) => {
                        trace!(puller = %puller.addr, bytes = frame.len(), "Frame pushed");
                        return Ok(());
                    }
                    Ok(Err(e)) => {
                        debug!(puller = %puller.addr, error = %e, "Write failed, evicting puller");
                        self.pullers.evict(puller.id);
                    }
                    Err(_) => {
                        debug!(puller = %puller.addr, "Write overran send timeout, evicting puller");
                        self.pullers.evict(puller.id);
                        return Err(Error::SendTimeout { timeout_ms });
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Error::ChannelClosed),
                changed = tokio::time::timeout_at(deadline, changes.changed()) => match changed {
                    Ok(Ok(())) => continue,
                    Ok(Err(_)) => return Err(Error::ChannelClosed),
                    Err(_) => return Err(Error::SendTimeout { timeout_ms }),
                },
            }
        }
    }

    /// Signal shutdown without waiting for the accept loop to exit
    pub fn close_now(&self) {
        self.shutdown.cancel();
        self.pullers.clear();
    }

    /// Stop accepting, disconnect every puller and release the port
    pub async fn close(&self) {
        self.close_now();

        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Accept loop panicked");
                }
            }
            info!(addr = %self.local_addr, "Outbound channel closed");
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.close_now();
    }
}

// ─────────────────────────────────────────────────────────────────
// Background tasks
// ─────────────────────────────────────────────────────────────────

async fn accept_loop(listener: TcpListener, pullers: Arc<PullerSet>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(puller = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }
                    pullers.attach(stream, addr, &shutdown);
                    debug!(puller = %addr, connected = pullers.len(), "Puller connected");
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }

    pullers.clear();
}

/// Evict a puller once its connection reaches EOF
async fn watch_puller(
    pullers: Arc<PullerSet>,
    id: u64,
    addr: SocketAddr,
    mut reader: OwnedReadHalf,
    closed: CancellationToken,
) {
    let mut buf = [0u8; 256];
    loop {
        tokio::select! {
            _ = closed.cancelled() => return,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => trace!(puller = %addr, bytes = n, "Ignoring bytes from puller"),
                Err(e) => {
                    trace!(puller = %addr, error = %e, "Puller read error");
                    break;
                }
            },
        }
    }

    if pullers.evict(id) {
        debug!(puller = %addr, "Puller disconnected");
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
