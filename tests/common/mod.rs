//! Common test utilities and fixtures
//!
//! Shared helpers for spinning up nodes on loopback and waiting on their
//! buffers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use peerqueue::{PeerQueueProvider, ProviderConfig, QueueProvider, TransportSettings};
use tokio::time::Instant;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Ask the OS for a port that is free right now
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Whether a listener could bind `0.0.0.0:port` right now
///
/// Uses SO_REUSEADDR like the provider does, so TIME_WAIT leftovers from
/// closed connections do not count as the port being held.
pub fn can_bind(port: u16) -> bool {
    let Ok(socket) = tokio::net::TcpSocket::new_v4() else {
        return false;
    };
    socket.set_reuseaddr(true).is_ok()
        && socket.bind(([0, 0, 0, 0], port).into()).is_ok()
        && socket.listen(16).is_ok()
}

/// Loopback endpoint for a peer on `port`
pub fn loopback(port: u16) -> String {
    format!("127.0.0.1:{}", port)
}

/// Transport timings short enough for tests
pub fn fast_transport() -> TransportSettings {
    TransportSettings {
        send_timeout_ms: 2000,
        receive_timeout_ms: 200,
        connect_timeout_ms: 500,
        reconnect_interval_ms: 50,
        ..Default::default()
    }
}

pub fn fast_config(port: u16, peers: &[String], can_take_work: bool) -> ProviderConfig {
    let mut config = ProviderConfig::new(port, peers.iter().cloned(), can_take_work);
    config.transport = fast_transport();
    config
}

pub async fn started_node(port: u16, peers: &[String], can_take_work: bool) -> PeerQueueProvider {
    let provider = PeerQueueProvider::new(fast_config(port, peers, can_take_work)).unwrap();
    provider.start().await.unwrap();
    provider
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Collect `expected` work items across `nodes`, tagged with the index of
/// the node that received each one
pub async fn drain_work(nodes: &[&PeerQueueProvider], expected: usize, timeout: Duration) -> Vec<(usize, String)> {
    let deadline = Instant::now() + timeout;
    let mut received = Vec::new();

    while received.len() < expected && Instant::now() < deadline {
        let mut idle = true;
        for (index, node) in nodes.iter().enumerate() {
            while let Some(id) = node.dequeue_for_processing() {
                received.push((index, id));
                idle = false;
            }
        }
        if idle {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
    }

    #[test]
    fn test_valid_config_exists() {
        assert!(valid_config_fixture().exists(), "Valid config fixture should exist");
    }

    #[test]
    fn test_invalid_config_exists() {
        assert!(invalid_config_fixture().exists(), "Invalid config fixture should exist");
    }
}
