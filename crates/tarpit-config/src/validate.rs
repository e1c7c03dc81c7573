//! Validation pass, grounded on `original_source/config/validation.go`'s
//! rule set (port range bounds, ordered bounds, non-empty peer lists for
//! clustered modes). Collects every violation instead of stopping at the
//! first one, matching the original's "report everything wrong at once"
//! behaviour.

use crate::sections::{ClusterMode, TarpitConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub fn validate(config: &TarpitConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    check_port("server.port", config.server.port, &mut errors);
    check_port("ftp_server.port", config.ftp_server.port, &mut errors);
    check_port("cluster.bind_port", config.cluster.bind_port, &mut errors);

    if config.server.enabled && config.ftp_server.enabled && config.server.port == config.ftp_server.port {
        errors.push(format!(
            "server.port and ftp_server.port must be disjoint, both are {}",
            config.server.port
        ));
    }
    if config.server.enabled && config.server.port == config.cluster.bind_port {
        errors.push(format!(
            "server.port and cluster.bind_port must be disjoint, both are {}",
            config.server.port
        ));
    }
    if config.ftp_server.enabled && config.ftp_server.port == config.cluster.bind_port {
        errors.push(format!(
            "ftp_server.port and cluster.bind_port must be disjoint, both are {}",
            config.ftp_server.port
        ));
    }

    if config.timeout_watcher.lower_timeout_bound_secs >= config.timeout_watcher.upper_timeout_bound_secs {
        errors.push(format!(
            "timeout_watcher.lower_timeout_bound_secs ({}) must be less than upper_timeout_bound_secs ({})",
            config.timeout_watcher.lower_timeout_bound_secs, config.timeout_watcher.upper_timeout_bound_secs
        ));
    }

    if config.recast.enabled
        && config.recast.minimum_recast_interval_min >= config.recast.maximum_recast_interval_min
    {
        errors.push(format!(
            "recast.minimum_recast_interval_min ({}) must be less than maximum_recast_interval_min ({})",
            config.recast.minimum_recast_interval_min, config.recast.maximum_recast_interval_min
        ));
    }

    match config.cluster.mode {
        ClusterMode::Lan | ClusterMode::Wan => {
            if config.cluster.known_peers.is_empty() {
                errors.push(format!(
                    "cluster.known_peers must be non-empty when cluster.mode is {:?}",
                    config.cluster.mode
                ));
            }
        }
        ClusterMode::Disabled | ClusterMode::ContainerOrchestrator => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

fn check_port(field: &str, port: u16, errors: &mut Vec<String>) {
    if port == 0 {
        errors.push(format!("{field} must be in range 1-65535, got 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&TarpitConfig::default()).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = TarpitConfig::default();
        config.server.port = 0;
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::Invalid(messages) => {
                assert!(messages.iter().any(|m| m.contains("server.port")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn colliding_ports_are_rejected() {
        let mut config = TarpitConfig::default();
        config.ftp_server.port = config.server.port;
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::Invalid(messages) => {
                assert!(messages.iter().any(|m| m.contains("disjoint")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn lan_mode_requires_known_peers() {
        let mut config = TarpitConfig::default();
        config.cluster.mode = ClusterMode::Lan;
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::Invalid(messages) => {
                assert!(messages.iter().any(|m| m.contains("known_peers")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn lan_mode_with_peers_is_valid() {
        let mut config = TarpitConfig::default();
        config.cluster.mode = ClusterMode::Lan;
        config.cluster.known_peers.push("10.0.0.5:7946".into());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn inverted_timeout_bounds_are_rejected() {
        let mut config = TarpitConfig::default();
        config.timeout_watcher.lower_timeout_bound_secs = 100;
        config.timeout_watcher.upper_timeout_bound_secs = 10;
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::Invalid(messages) => {
                assert!(messages.iter().any(|m| m.contains("lower_timeout_bound_secs")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }
}
