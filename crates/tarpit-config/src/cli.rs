//! CLI override surface, grounded on the flag-to-config-key mapping in
//! `original_source/config/flags.go` -- each flag targets exactly one
//! config key, applied as the last and highest-priority overlay pass.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Default)]
pub struct ConfigOverrides {
    /// Path to a TOML config file. Missing file is not an error -- falls
    /// back to built-in defaults.
    #[arg(long, env = "GOPOT_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    #[arg(long)]
    pub server_port: Option<u16>,

    #[arg(long)]
    pub ftp_port: Option<u16>,

    #[arg(long)]
    pub cluster_mode: Option<String>,

    #[arg(long = "cluster-known-peers", value_delimiter = ',')]
    pub cluster_known_peers: Option<Vec<String>>,

    #[arg(long)]
    pub log_filter: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut crate::sections::TarpitConfig) -> Result<(), String> {
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(port) = self.ftp_port {
            config.ftp_server.port = port;
        }
        if let Some(mode) = &self.cluster_mode {
            config.cluster.mode = parse_cluster_mode(mode)?;
        }
        if let Some(peers) = &self.cluster_known_peers {
            config.cluster.known_peers = peers.clone();
        }
        if let Some(filter) = &self.log_filter {
            config.logging.filter = filter.clone();
        }
        Ok(())
    }
}

fn parse_cluster_mode(raw: &str) -> Result<crate::sections::ClusterMode, String> {
    use crate::sections::ClusterMode;
    match raw.to_lowercase().as_str() {
        "disabled" => Ok(ClusterMode::Disabled),
        "lan" => Ok(ClusterMode::Lan),
        "wan" => Ok(ClusterMode::Wan),
        "container_orchestrator" | "container-orchestrator" => Ok(ClusterMode::ContainerOrchestrator),
        other => Err(format!("unknown cluster mode: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::TarpitConfig;

    #[test]
    fn overrides_apply_onto_defaults() {
        let overrides = ConfigOverrides {
            server_port: Some(9001),
            cluster_known_peers: Some(vec!["10.0.0.1:7946".into(), "10.0.0.2:7946".into()]),
            ..Default::default()
        };
        let mut config = TarpitConfig::default();
        overrides.apply(&mut config).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.cluster.known_peers.len(), 2);
    }

    #[test]
    fn unknown_cluster_mode_is_rejected() {
        let overrides = ConfigOverrides { cluster_mode: Some("bogus".into()), ..Default::default() };
        let mut config = TarpitConfig::default();
        assert!(overrides.apply(&mut config).is_err());
    }
}
