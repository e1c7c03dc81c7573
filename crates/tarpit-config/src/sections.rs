//! Config section types, grounded on `cordelia-node::config::NodeConfig`'s
//! shape (one struct per section, `#[serde(default)]` throughout so a
//! partial TOML file only overlays the keys it mentions) and the
//! section list from `original_source/config/default.go`.

use serde::{Deserialize, Serialize};
use tarpit_protocol::ERA_0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TarpitConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub ftp_server: FtpServerSection,
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub timeout_watcher: TimeoutWatcherSection,
    #[serde(default)]
    pub staller: StallerSection,
    #[serde(default)]
    pub recast: RecastSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub multi_protocol: MultiProtocolSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for TarpitConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            ftp_server: FtpServerSection::default(),
            cluster: ClusterSection::default(),
            timeout_watcher: TimeoutWatcherSection::default(),
            staller: StallerSection::default(),
            recast: RecastSection::default(),
            telemetry: TelemetrySection::default(),
            multi_protocol: MultiProtocolSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_multi_protocol_port")]
    pub port: u16,
    #[serde(default = "default_network")]
    pub network: String,
    /// Header trusted to carry the real client IP, honoured only when
    /// the connecting peer falls inside `trusted_proxy_cidrs`.
    #[serde(default = "default_trusted_proxy_header")]
    pub trusted_proxy_header: String,
    #[serde(default)]
    pub trusted_proxy_cidrs: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_multi_protocol_port(),
            network: default_network(),
            trusted_proxy_header: default_trusted_proxy_header(),
            trusted_proxy_cidrs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FtpServerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default = "default_false")]
    pub tls_enabled: bool,
    #[serde(default = "default_tls_common_name")]
    pub tls_common_name: String,
    #[serde(default = "default_passive_port_range")]
    pub passive_port_range: String,
    #[serde(default = "default_advertised_file_size")]
    pub advertised_file_size_bytes: u64,
    #[serde(default = "default_max_pending_operations")]
    pub max_pending_operations: usize,
}

impl Default for FtpServerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_ftp_port(),
            tls_enabled: false,
            tls_common_name: default_tls_common_name(),
            passive_port_range: default_passive_port_range(),
            advertised_file_size_bytes: default_advertised_file_size(),
            max_pending_operations: default_max_pending_operations(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    Disabled,
    Lan,
    Wan,
    ContainerOrchestrator,
}

impl Default for ClusterMode {
    fn default() -> Self {
        ClusterMode::Disabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSection {
    #[serde(default)]
    pub mode: ClusterMode,
    #[serde(default = "default_cluster_bind_port")]
    pub bind_port: u16,
    #[serde(default)]
    pub known_peers: Vec<String>,
    #[serde(default = "default_3")]
    pub connection_attempts: u32,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            mode: ClusterMode::default(),
            bind_port: default_cluster_bind_port(),
            known_peers: Vec::new(),
            connection_attempts: default_3(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutWatcherSection {
    #[serde(default = "default_lower_timeout_bound_secs")]
    pub lower_timeout_bound_secs: u64,
    #[serde(default = "default_upper_timeout_bound_secs")]
    pub upper_timeout_bound_secs: u64,
    #[serde(default = "default_hot_cache_ttl_secs")]
    pub hot_cache_ttl_secs: u64,
    #[serde(default = "default_cold_cache_ttl_secs")]
    pub cold_cache_ttl_secs: u64,
}

impl Default for TimeoutWatcherSection {
    fn default() -> Self {
        Self {
            lower_timeout_bound_secs: default_lower_timeout_bound_secs(),
            upper_timeout_bound_secs: default_upper_timeout_bound_secs(),
            hot_cache_ttl_secs: default_hot_cache_ttl_secs(),
            cold_cache_ttl_secs: default_cold_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StallerSection {
    #[serde(default = "default_transfer_rate_ms")]
    pub transfer_rate_ms: u64,
    #[serde(default = "default_maximum_connections")]
    pub maximum_connections: usize,
    /// Per-group cap: the most connections a single remote IP may hold
    /// open at once, regardless of fleet headroom.
    #[serde(default = "default_group_limit")]
    pub group_limit: usize,
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for StallerSection {
    fn default() -> Self {
        Self {
            transfer_rate_ms: default_transfer_rate_ms(),
            maximum_connections: default_maximum_connections(),
            group_limit: default_group_limit(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecastSection {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_minimum_recast_interval_min")]
    pub minimum_recast_interval_min: u64,
    #[serde(default = "default_maximum_recast_interval_min")]
    pub maximum_recast_interval_min: u64,
    #[serde(default = "default_time_wasted_ratio")]
    pub time_wasted_ratio: f64,
}

impl Default for RecastSection {
    fn default() -> Self {
        Self {
            enabled: false,
            minimum_recast_interval_min: default_minimum_recast_interval_min(),
            maximum_recast_interval_min: default_maximum_recast_interval_min(),
            time_wasted_ratio: default_time_wasted_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    #[serde(default = "default_push_interval_secs")]
    pub push_interval_secs: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self { push_interval_secs: default_push_interval_secs() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiProtocolSection {
    #[serde(default = "default_initial_read_timeout_secs")]
    pub initial_read_timeout_secs: u64,
    #[serde(default = "default_detect_read_timeout_secs")]
    pub detect_read_timeout_secs: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
}

impl Default for MultiProtocolSection {
    fn default() -> Self {
        Self {
            initial_read_timeout_secs: default_initial_read_timeout_secs(),
            detect_read_timeout_secs: default_detect_read_timeout_secs(),
            probe_interval_ms: default_probe_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { format: default_log_format(), filter: default_log_filter() }
    }
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_network() -> String {
    "tcp".into()
}
fn default_trusted_proxy_header() -> String {
    "X-Forwarded-For".into()
}
fn default_multi_protocol_port() -> u16 {
    8080
}
fn default_ftp_port() -> u16 {
    2121
}
fn default_tls_common_name() -> String {
    "tarpit.local".into()
}
fn default_passive_port_range() -> String {
    "50000-50100".into()
}
fn default_advertised_file_size() -> u64 {
    20 * 1024 * 1024
}
fn default_max_pending_operations() -> usize {
    16
}
fn default_cluster_bind_port() -> u16 {
    7946
}
fn default_3() -> u32 {
    3
}
fn default_connection_timeout_secs() -> u64 {
    5
}
fn default_lower_timeout_bound_secs() -> u64 {
    ERA_0.lower_timeout_bound_secs
}
fn default_upper_timeout_bound_secs() -> u64 {
    ERA_0.upper_timeout_bound_secs
}
fn default_hot_cache_ttl_secs() -> u64 {
    ERA_0.hot_cache_ttl_secs
}
fn default_cold_cache_ttl_secs() -> u64 {
    ERA_0.cold_cache_ttl_secs
}
fn default_transfer_rate_ms() -> u64 {
    ERA_0.default_transfer_rate_ms
}
fn default_maximum_connections() -> usize {
    1024
}
fn default_group_limit() -> usize {
    64
}
fn default_report_interval_secs() -> u64 {
    ERA_0.staller_report_interval_secs
}
fn default_minimum_recast_interval_min() -> u64 {
    60
}
fn default_maximum_recast_interval_min() -> u64 {
    120
}
fn default_time_wasted_ratio() -> f64 {
    ERA_0.time_wasted_ratio
}
fn default_push_interval_secs() -> u64 {
    30
}
fn default_initial_read_timeout_secs() -> u64 {
    ERA_0.initial_read_timeout_secs
}
fn default_detect_read_timeout_secs() -> u64 {
    ERA_0.detect_read_timeout_secs
}
fn default_probe_interval_ms() -> u64 {
    ERA_0.probe_interval_ms
}
fn default_log_format() -> String {
    "compact".into()
}
fn default_log_filter() -> String {
    "tarpit_node=info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = TarpitConfig::default();
        let serialized = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TarpitConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn partial_file_only_overlays_mentioned_keys() {
        let toml_str = r#"
[server]
port = 9999
"#;
        let cfg: TarpitConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.port, 9999);
        assert_eq!(cfg.server.host, default_host());
        assert_eq!(cfg.ftp_server.port, default_ftp_port());
    }
}
