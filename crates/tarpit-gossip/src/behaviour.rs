//! libp2p network behaviour for the gossip overlay: gossipsub carries
//! broadcast actions, identify and ping keep membership and liveness
//! bookkeeping flowing, the way the teacher's `CordeliaBehaviour` does
//! for its own protocols.

use libp2p::swarm::NetworkBehaviour;
use libp2p::{gossipsub, identify, ping};

#[derive(NetworkBehaviour)]
pub struct GossipBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}
