//! Implements `tarpit_timeout::ColdCachePublisher` by handing
//! serialized broadcast actions to the swarm task's outbound channel.
//!
//! The channel is built here, before the swarm exists, so the
//! watcher/gossip construction cycle resolves without a setter: a
//! caller builds `(publisher, outbound_rx)` first, constructs
//! `TimeoutWatcher::new(era, publisher)`, and only then hands the
//! receiver to [`crate::GossipOverlay::spawn`] along with the
//! already-built watcher.

use std::sync::Arc;
use std::time::Duration;

use tarpit_protocol::BroadcastAction;
use tarpit_timeout::ColdCachePublisher;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub struct GossipPublisher {
    outbound: UnboundedSender<Vec<u8>>,
}

impl GossipPublisher {
    /// Builds the channel a `GossipPublisher` sends on and the
    /// receiver the swarm task reads from, independently of whether a
    /// swarm ever gets built at all (the "no cluster overlay, use a
    /// `NullPublisher`" path never touches the receiver).
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { outbound: tx }), rx)
    }
}

impl ColdCachePublisher for GossipPublisher {
    fn publish_cold_ip(&self, peer: &str, timeout: Duration) {
        let action = BroadcastAction::add_cold_ip(peer, timeout);
        let bytes = match serde_json::to_vec(&action) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "gossip: failed to encode broadcast action");
                return;
            }
        };
        if self.outbound.send(bytes).is_err() {
            tracing::debug!("gossip: swarm task gone, dropping broadcast");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_enqueues_a_json_broadcast_action() {
        let (publisher, mut rx) = GossipPublisher::channel();

        publisher.publish_cold_ip("1.2.3.4", Duration::from_secs(7));

        let bytes = rx.try_recv().unwrap();
        let action: BroadcastAction = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(action.as_add_cold_ip(), Some(("1.2.3.4", Duration::from_secs(7))));
    }
}
