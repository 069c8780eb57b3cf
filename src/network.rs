//! Peer addresses and the registered peer set.

use crate::error::{ChainError, Result};
use std::collections::BTreeSet;
use url::Url;

/// Port assumed when an address names a host only.
pub const DEFAULT_PEER_PORT: u16 = 80;

/// Reduce a peer address to its `host:port` network location.
///
/// Accepts `http://host:port/anything` as well as a bare `host:port`, which is
/// read as if it were an `http` URL. Everything but the host and port is
/// dropped. A missing port becomes the scheme's default, or
/// [`DEFAULT_PEER_PORT`] for schemes without one.
pub fn normalize_peer_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("http://{}", trimmed))
    }
    .map_err(|e| ChainError::InvalidPeerAddress(format!("{}: {}", address, e)))?;

    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ChainError::InvalidPeerAddress(format!("{}: missing host", address)))?;
    let port = parsed.port_or_known_default().unwrap_or(DEFAULT_PEER_PORT);

    Ok(format!("{}:{}", host.to_ascii_lowercase(), port))
}

/// Registered peers, deduplicated by normalized address.
///
/// Iteration is in sorted address order, which makes conflict resolution
/// deterministic for a given set of peers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: BTreeSet<String>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert. Returns the stored form; re-registering is a no-op.
    pub fn register(&mut self, address: &str) -> Result<String> {
        let normalized = normalize_peer_address(address)?;
        self.peers.insert(normalized.clone());
        Ok(normalized)
    }

    pub fn contains(&self, address: &str) -> bool {
        normalize_peer_address(address).is_ok_and(|a| self.peers.contains(&a))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
