//! Receive-only side of the transport
//!
//! A pull channel owns a background connector that dials the peer, reads
//! whole frames, and hands them over through a bounded queue. If the peer is
//! down or drops the connection, the connector keeps retrying until the
//! channel is closed.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::TransportSettings;
use crate::error::{Error, Result};
use crate::protocol::read_frame;

use super::PeerAddress;

/// Frames read from the socket but not yet received by the listener
const FRAME_QUEUE_DEPTH: usize = 64;

/// Timing and limits the connector needs
#[derive(Debug, Clone, Copy)]
struct ConnectorSettings {
    connect_timeout: Duration,
    reconnect_interval: Duration,
    max_frame_bytes: u32,
}

/// Inbound channel to one peer
pub struct PullChannel {
    address: PeerAddress,
    frames: mpsc::Receiver<Vec<u8>>,
    connector: JoinHandle<()>,
}

impl PullChannel {
    /// Open a channel to `address`; the first connection attempt happens in
    /// the background
    pub fn connect(address: PeerAddress, transport: &TransportSettings) -> Self {
        let settings = ConnectorSettings {
            connect_timeout: transport.connect_timeout(),
            reconnect_interval: transport.reconnect_interval(),
            max_frame_bytes: transport.max_frame_bytes,
        };
        let (tx, frames) = mpsc::channel(FRAME_QUEUE_DEPTH);

        let connector = tokio::spawn(run_connector(address.clone(), settings, tx));

        Self {
            address,
            frames,
            connector,
        }
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// Wait up to `timeout` for one whole frame
    ///
    /// Returns `Ok(None)` when nothing arrived in time. Cancel-safe.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(timeout, self.frames.recv()).await {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => Err(Error::ChannelClosed),
            Err(_) => Ok(None),
        }
    }

    /// Disconnect and stop reconnecting
    pub fn close(&mut self) {
        self.frames.close();
        self.connector.abort();
        debug!(peer = %self.address, "Inbound channel closed");
    }
}

impl Drop for PullChannel {
    fn drop(&mut self) {
        self.connector.abort();
    }
}

async fn run_connector(address: PeerAddress, settings: ConnectorSettings, tx: mpsc::Sender<Vec<u8>>) {
    let mut failures: u32 = 0;

    loop {
        match tokio::time::timeout(settings.connect_timeout, TcpStream::connect(address.endpoint())).await {
            Ok(Ok(stream)) => {
                failures = 0;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(peer = %address, error = %e, "Failed to set TCP_NODELAY");
                }
                info!(peer = %address, "Connected to peer");

                match forward_frames(stream, &tx, settings.max_frame_bytes).await {
                    Ok(()) => return,
                    Err(e) => debug!(peer = %address, error = %e, "Peer connection lost, reconnecting"),
                }
            }
            Ok(Err(e)) => {
                failures += 1;
                if failures == 1 {
                    debug!(peer = %address, error = %e, "Peer unreachable, retrying");
                } else {
                    trace!(peer = %address, error = %e, failures, "Peer still unreachable");
                }
            }
            Err(_) => {
                failures += 1;
                debug!(peer = %address, failures, "Connection attempt timed out");
            }
        }

        tokio::select! {
            _ = tx.closed() => return,
            _ = tokio::time::sleep(settings.reconnect_interval) => {}
        }
    }
}

/// Forward frames until the connection fails or the receiver goes away
///
/// `Ok(())` means the receiver is gone and the connector should exit.
async fn forward_frames(mut stream: TcpStream, tx: &mpsc::Sender<Vec<u8>>, max_frame_bytes: u32) -> Result<()> {
    loop {
        let frame = tokio::select! {
            _ = tx.closed() => return Ok(()),
            frame = read_frame(&mut stream, max_frame_bytes) => frame?,
        };

        if tx.send(frame).await.is_err() {
            return Ok(());
        }
    }
}
