//! Container-orchestrator seed discovery -- spec.md section 4.6's
//! third join mode: the advertise address is the first private-range
//! IPv4 reported by the local task-metadata service, and peers are the
//! metadata service's sibling task list with self filtered out.

use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

/// Supplies the node's own address and its sibling tasks' addresses.
/// Production callers query the orchestrator's metadata endpoint (e.g.
/// `ECS_CONTAINER_METADATA_URI_V4`); tests substitute a fixed list.
pub trait OrchestratorMetadata: Send + Sync {
    fn own_candidate_addresses(&self) -> Vec<Ipv4Addr>;
    fn sibling_addresses(&self) -> Vec<Ipv4Addr>;
}

const PRIVATE_RANGES: &[&str] = &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

pub fn is_private_ipv4(addr: Ipv4Addr) -> bool {
    PRIVATE_RANGES
        .iter()
        .filter_map(|cidr| Ipv4Net::from_str(cidr).ok())
        .any(|net| net.contains(&addr))
}

/// Picks the first private-range address from a metadata service's
/// advertised candidates.
pub fn first_private_address(candidates: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    candidates.iter().copied().find(|a| is_private_ipv4(*a))
}

/// Filters `self_addr` out of a sibling list.
pub fn siblings_excluding_self(siblings: &[Ipv4Addr], self_addr: Ipv4Addr) -> Vec<Ipv4Addr> {
    siblings.iter().copied().filter(|a| *a != self_addr).collect()
}

/// Resolves advertise address and seed peers from an
/// [`OrchestratorMetadata`] source. Returns `None` for the advertise
/// address if the metadata service reported no private-range
/// candidate -- callers should treat that as a join failure.
pub fn resolve(source: &dyn OrchestratorMetadata) -> (Option<Ipv4Addr>, Vec<Ipv4Addr>) {
    let candidates = source.own_candidate_addresses();
    let advertise = first_private_address(&candidates);
    let siblings = match advertise {
        Some(self_addr) => siblings_excluding_self(&source.sibling_addresses(), self_addr),
        None => source.sibling_addresses(),
    };
    (advertise, siblings)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMetadata {
        own: Vec<Ipv4Addr>,
        siblings: Vec<Ipv4Addr>,
    }

    impl OrchestratorMetadata for FixedMetadata {
        fn own_candidate_addresses(&self) -> Vec<Ipv4Addr> {
            self.own.clone()
        }

        fn sibling_addresses(&self) -> Vec<Ipv4Addr> {
            self.siblings.clone()
        }
    }

    #[test]
    fn recognizes_rfc1918_ranges() {
        assert!(is_private_ipv4(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(is_private_ipv4(Ipv4Addr::new(172, 16, 3, 4)));
        assert!(is_private_ipv4(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn picks_first_private_candidate_and_filters_self_from_siblings() {
        let metadata = FixedMetadata {
            own: vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(10, 1, 2, 3)],
            siblings: vec![Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(10, 1, 2, 4)],
        };

        let (advertise, siblings) = resolve(&metadata);
        assert_eq!(advertise, Some(Ipv4Addr::new(10, 1, 2, 3)));
        assert_eq!(siblings, vec![Ipv4Addr::new(10, 1, 2, 4)]);
    }

    #[test]
    fn no_private_candidate_leaves_advertise_unset() {
        let metadata = FixedMetadata {
            own: vec![Ipv4Addr::new(8, 8, 8, 8)],
            siblings: vec![Ipv4Addr::new(10, 1, 2, 4)],
        };

        let (advertise, siblings) = resolve(&metadata);
        assert_eq!(advertise, None);
        assert_eq!(siblings, vec![Ipv4Addr::new(10, 1, 2, 4)]);
    }
}
