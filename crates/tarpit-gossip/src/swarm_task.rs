//! Owns the libp2p Swarm and dispatches its events, in the same shape
//! as the teacher's `swarm_task.rs`: a single `tokio::select!` loop
//! over an outbound-message channel, the swarm's own event stream, and
//! a shutdown signal. Unlike the teacher's request/response protocols,
//! the only traffic here is gossipsub publish/deliver of broadcast
//! actions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use libp2p::futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic};
use libp2p::swarm::SwarmEvent;
use libp2p::{identity, PeerId, Swarm};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::behaviour::{GossipBehaviour, GossipBehaviourEvent};
use crate::options::GossipOptions;
use crate::GossipError;

pub const TOPIC_NAME: &str = "tarpit/cold-ip/1";

pub fn build_swarm(
    keypair: identity::Keypair,
    options: &GossipOptions,
) -> Result<Swarm<GossipBehaviour>, GossipError> {
    let peer_id = PeerId::from(keypair.public());

    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .history_length(options.retransmit_multiplier.max(1))
        .history_gossip(options.retransmit_multiplier.max(1))
        .validation_mode(gossipsub::ValidationMode::Permissive)
        .build()
        .map_err(|err| GossipError::Behaviour(err.to_string()))?;

    let gossipsub = gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(keypair.clone()),
        gossipsub_config,
    )
    .map_err(|err| GossipError::Behaviour(err.to_string()))?;

    let identify = libp2p::identify::Behaviour::new(libp2p::identify::Config::new(
        "/tarpit/gossip/1".into(),
        keypair.public(),
    ));

    let ping =
        libp2p::ping::Behaviour::new(libp2p::ping::Config::new().with_interval(Duration::from_secs(15)));

    let behaviour = GossipBehaviour { gossipsub, identify, ping };

    let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            libp2p::tcp::Config::default(),
            libp2p::noise::Config::new,
            libp2p::yamux::Config::default,
        )
        .map_err(|err| GossipError::Transport(err.to_string()))?
        .with_dns()
        .map_err(|err| GossipError::Transport(err.to_string()))?
        .with_behaviour(|_| behaviour)
        .map_err(|err| GossipError::Behaviour(err.to_string()))?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(Duration::from_secs(120)))
        .build();

    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&IdentTopic::new(TOPIC_NAME))
        .map_err(|err| GossipError::Behaviour(err.to_string()))?;

    swarm
        .listen_on(options.listen_addr.clone())
        .map_err(|err| GossipError::Transport(err.to_string()))?;

    for seed in options.seeds() {
        if let Err(err) = swarm.dial(seed.clone()) {
            tracing::warn!(%seed, %err, "gossip: seed dial failed");
        }
    }

    tracing::info!(%peer_id, "gossip swarm built");
    Ok(swarm)
}

/// Runs the swarm event loop until `shutdown` fires. Inbound gossipsub
/// payloads are handed to `on_inbound`; outbound broadcasts arrive on
/// `outbound_rx` and get published to the shared topic. `peer_count`
/// tracks live connections so `GossipOverlay::wait_for_join` can judge
/// when the join has succeeded.
pub fn spawn(
    mut swarm: Swarm<GossipBehaviour>,
    mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    peer_count: Arc<AtomicUsize>,
    on_inbound: impl Fn(&[u8]) + Send + 'static,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let topic = IdentTopic::new(TOPIC_NAME);

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    let Some(bytes) = outbound else { break };
                    if let Err(err) = swarm.behaviour_mut().gossipsub.publish(topic.clone(), bytes) {
                        tracing::debug!(%err, "gossip: publish failed (no peers yet?)");
                    }
                }

                event = swarm.select_next_some() => {
                    match event {
                        SwarmEvent::NewListenAddr { address, .. } => {
                            tracing::info!(%address, "gossip: listening");
                        }
                        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                            peer_count.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(%peer_id, "gossip: peer connected");
                        }
                        SwarmEvent::ConnectionClosed { peer_id, .. } => {
                            let _ = peer_count.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                                Some(c.saturating_sub(1))
                            });
                            tracing::debug!(%peer_id, "gossip: peer disconnected");
                        }
                        SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                            tracing::warn!(?peer_id, %error, "gossip: outgoing connection failed");
                        }
                        SwarmEvent::Behaviour(GossipBehaviourEvent::Gossipsub(
                            gossipsub::Event::Message { message, .. },
                        )) => {
                            on_inbound(&message.data);
                        }
                        SwarmEvent::Behaviour(GossipBehaviourEvent::Identify(
                            libp2p::identify::Event::Received { peer_id, .. },
                        )) => {
                            tracing::debug!(%peer_id, "gossip: identified peer");
                        }
                        _ => {}
                    }
                }

                _ = shutdown.recv() => {
                    tracing::info!("gossip: shutting down swarm task");
                    break;
                }
            }
        }
    })
}
