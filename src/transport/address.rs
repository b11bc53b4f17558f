//! Peer addressing

use std::fmt;

use crate::error::{Error, Result};

/// Whether an inbound connection targets this node or another one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Loop-back to this node's own outbound channel
    SelfLoop,

    /// Another node in the cluster
    Remote,
}

/// A `host:port` endpoint to pull work from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    role: PeerRole,
    endpoint: String,
}

impl PeerAddress {
    /// Validate and wrap a remote endpoint
    ///
    /// Accepts `host:port` with an optional `tcp://` prefix. IPv6 literals are
    /// rejected: every node's outbound channel listens on IPv4 only, so a pull
    /// channel to one could never connect.
    pub fn remote(endpoint: impl Into<String>) -> Result<Self> {
        let raw = endpoint.into();
        let trimmed = raw.trim();
        let endpoint = trimmed.strip_prefix("tcp://").unwrap_or(trimmed);

        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| Error::invalid_address(&raw, "expected host:port"))?;

        if host.is_empty() || host == "[]" {
            return Err(Error::invalid_address(&raw, "missing host"));
        }
        if host.contains(':') || host.starts_with('[') {
            return Err(Error::invalid_address(
                &raw,
                "IPv6 peers are not supported, nodes listen on IPv4 only",
            ));
        }
        match port.parse::<u16>() {
            Ok(0) => return Err(Error::invalid_address(&raw, "port must not be 0")),
            Ok(_) => {}
            Err(_) => return Err(Error::invalid_address(&raw, "port is not a number")),
        }

        Ok(Self {
            role: PeerRole::Remote,
            endpoint: endpoint.to_string(),
        })
    }

    /// Loop-back address for this node's own outbound port
    pub fn self_loop(port: u16) -> Self {
        Self {
            role: PeerRole::SelfLoop,
            endpoint: format!("127.0.0.1:{}", port),
        }
    }

    /// Inbound connection list for a node
    ///
    /// A node that cannot take work pulls from nobody. Otherwise it pulls from
    /// itself first, then from every configured peer in order.
    pub fn topology(bound_port: u16, peers: &[String], can_take_work: bool) -> Result<Vec<Self>> {
        if !can_take_work {
            return Ok(Vec::new());
        }

        let mut addresses = Vec::with_capacity(peers.len() + 1);
        addresses.push(Self::self_loop(bound_port));
        for peer in peers {
            addresses.push(Self::remote(peer.as_str())?);
        }
        Ok(addresses)
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            PeerRole::SelfLoop => write!(f, "self@{}", self.endpoint),
            PeerRole::Remote => f.write_str(&self.endpoint),
        }
    }
}
