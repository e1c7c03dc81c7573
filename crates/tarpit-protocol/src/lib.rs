//! Tarpit Protocol -- shared domain types and tuning constants.
//!
//! Every other crate in the workspace depends on this one for the peer
//! addressing scheme, the gossip broadcast envelope, and the timing
//! constants that bind the timeout watcher, staller pool, and recast
//! controller together.

pub mod era;
pub mod message;

pub use era::{Era, ERA_0};
pub use message::BroadcastAction;

use std::fmt;

/// A peer identity: an opaque, protocol-namespaced string.
///
/// HTTP peers are keyed `http-<ip>`, FTP peers `ftp-<ctx-id>`, so the same
/// remote IP connecting over both protocols learns independently, per
/// spec section 3 ("Peer identity").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PeerKey(String);

impl PeerKey {
    pub fn new(namespace: &str, addr: &str) -> Self {
        Self(format!("{namespace}-{addr}"))
    }

    /// Build a peer key from a bare address with no namespace prefix, for
    /// callers (gossip, CLI tooling) that already hold a fully-qualified key.
    pub fn bare(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("codec error: {0}")]
    Codec(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_key_namespacing_keeps_protocols_independent() {
        let http_key = PeerKey::new("http", "1.2.3.4");
        let ftp_key = PeerKey::new("ftp", "1.2.3.4");
        assert_ne!(http_key, ftp_key);
        assert_eq!(http_key.as_str(), "http-1.2.3.4");
    }
}
