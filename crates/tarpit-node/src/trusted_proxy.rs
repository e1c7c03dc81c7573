//! Trusted-proxy header handling (spec.md section 6): the configured
//! forwarded-for header is only honoured when the connecting socket
//! peer itself falls inside one of the configured CIDR ranges.

use std::net::IpAddr;

use ipnet::IpNet;
use tarpit_config::ServerSection;

/// Resolves the IP address a connection should be attributed to under
/// the timeout watcher and the staller pool's group key: the raw
/// socket peer, unless a trusted proxy CIDR match lets the configured
/// header override it.
pub fn resolve_peer(socket_peer: IpAddr, header_value: Option<&str>, cfg: &ServerSection) -> String {
    let Some(forwarded) = header_value else {
        return socket_peer.to_string();
    };

    let from_trusted_proxy = cfg
        .trusted_proxy_cidrs
        .iter()
        .filter_map(|cidr| cidr.parse::<IpNet>().ok())
        .any(|net| net.contains(&socket_peer));

    if !from_trusted_proxy {
        return socket_peer.to_string();
    }

    match forwarded.split(',').next().map(str::trim) {
        Some(first) if !first.is_empty() => first.to_string(),
        _ => socket_peer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(cidrs: &[&str]) -> ServerSection {
        ServerSection {
            trusted_proxy_cidrs: cidrs.iter().map(|s| s.to_string()).collect(),
            ..ServerSection::default()
        }
    }

    #[test]
    fn header_is_ignored_when_peer_is_not_trusted() {
        let peer: IpAddr = "203.0.113.5".parse().unwrap();
        let resolved = resolve_peer(peer, Some("198.51.100.9"), &cfg(&["10.0.0.0/8"]));
        assert_eq!(resolved, "203.0.113.5");
    }

    #[test]
    fn header_is_honoured_when_peer_is_trusted() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let resolved = resolve_peer(peer, Some("198.51.100.9, 10.0.0.1"), &cfg(&["10.0.0.0/8"]));
        assert_eq!(resolved, "198.51.100.9");
    }

    #[test]
    fn no_header_falls_back_to_socket_peer() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let resolved = resolve_peer(peer, None, &cfg(&["10.0.0.0/8"]));
        assert_eq!(resolved, "10.0.0.1");
    }
}
