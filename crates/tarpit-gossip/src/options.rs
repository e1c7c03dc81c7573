//! Join configuration: advertise address, seed discovery mode, and the
//! retry policy from spec.md section 4.6.

use std::time::Duration;

use libp2p::Multiaddr;

/// How the node learns its own advertise address and its initial peer
/// list -- spec.md section 4.6's three join modes.
#[derive(Debug, Clone)]
pub enum SeedMode {
    Lan { seeds: Vec<Multiaddr> },
    Wan { seeds: Vec<Multiaddr> },
    /// Self and sibling addresses come from the container-runtime
    /// metadata service rather than static configuration; see
    /// `crate::orchestrator`.
    ContainerOrchestrator,
}

#[derive(Debug, Clone)]
pub struct GossipOptions {
    pub listen_addr: Multiaddr,
    pub seed_mode: SeedMode,
    pub bind_port: u16,
    pub connection_attempts: u32,
    pub connection_timeout: Duration,
    /// Gossipsub mesh redundancy, standing in for SWIM's retransmit
    /// multiplier -- spec.md section 4.6 names it 2 by default.
    pub retransmit_multiplier: usize,
}

impl GossipOptions {
    pub fn lan(listen_addr: Multiaddr, seeds: Vec<Multiaddr>) -> Self {
        Self {
            listen_addr,
            seed_mode: SeedMode::Lan { seeds },
            bind_port: 7946,
            connection_attempts: 3,
            connection_timeout: Duration::from_secs(5),
            retransmit_multiplier: 2,
        }
    }

    pub fn wan(listen_addr: Multiaddr, seeds: Vec<Multiaddr>) -> Self {
        Self {
            bind_port: 7947,
            seed_mode: SeedMode::Wan { seeds },
            ..Self::lan(listen_addr, Vec::new())
        }
    }

    pub fn container_orchestrator(listen_addr: Multiaddr) -> Self {
        Self {
            seed_mode: SeedMode::ContainerOrchestrator,
            ..Self::lan(listen_addr, Vec::new())
        }
    }

    pub fn seeds(&self) -> &[Multiaddr] {
        match &self.seed_mode {
            SeedMode::Lan { seeds } | SeedMode::Wan { seeds } => seeds,
            SeedMode::ContainerOrchestrator => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lan_and_wan_default_to_different_ports() {
        let addr: Multiaddr = "/ip4/0.0.0.0/tcp/0".parse().unwrap();
        let lan = GossipOptions::lan(addr.clone(), Vec::new());
        let wan = GossipOptions::wan(addr, Vec::new());
        assert_eq!(lan.bind_port, 7946);
        assert_eq!(wan.bind_port, 7947);
    }

    #[test]
    fn container_orchestrator_mode_has_no_static_seeds() {
        let addr: Multiaddr = "/ip4/0.0.0.0/tcp/0".parse().unwrap();
        let options = GossipOptions::container_orchestrator(addr);
        assert!(options.seeds().is_empty());
    }
}
