//! Shared bootstrap: builds every long-lived component once and hands
//! out the `Arc`s each protocol front door needs, mirroring
//! `cordelia-node::run_node`'s shape (identity/storage/swarm built up
//! front, background tasks spawned, then the protocol server runs).

use std::sync::Arc;
use std::time::Duration;

use libp2p::Multiaddr;
use tarpit_config::{ClusterMode, TarpitConfig};
use tarpit_ftp::{FtpBackendFactory, FtpDriverOptions};
use tarpit_gossip::{GossipOptions, GossipOverlay, GossipPublisher};
use tarpit_protocol::ERA_0;
use tarpit_recast::{RecastController, RecastOptions};
use tarpit_stall::{StallerPool, StallerPoolOptions};
use tarpit_telemetry::Telemetry;
use tarpit_timeout::TimeoutWatcher;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Node {
    pub config: TarpitConfig,
    pub telemetry: Arc<Telemetry>,
    pub staller_pool: Arc<StallerPool>,
    pub timeout_watcher: Arc<TimeoutWatcher>,
    pub ftp_factory: Arc<FtpBackendFactory>,
    pub recast: Option<Arc<RecastController>>,
    gossip: Option<GossipOverlay>,
}

impl Node {
    pub async fn bootstrap(config: TarpitConfig, shutdown: broadcast::Sender<()>) -> anyhow::Result<Self> {
        let telemetry = Telemetry::new();

        let staller_pool = StallerPool::new(StallerPoolOptions {
            maximum_connections: config.staller.maximum_connections,
            group_limit: config.staller.group_limit,
            prune_interval: Duration::from_secs(ERA_0.pool_prune_interval_secs),
            prune_target_ratio: ERA_0.pool_prune_target_ratio,
        });

        let (timeout_watcher, gossip) = init_cluster(&config, shutdown).await;

        let ftp_factory = FtpBackendFactory::new(
            staller_pool.clone(),
            FtpDriverOptions {
                max_pending_operations: config.ftp_server.max_pending_operations,
                throttle_release_interval: Duration::from_millis(200),
                transfer_rate: Duration::from_millis(config.staller.transfer_rate_ms),
                advertised_file_size: config.ftp_server.advertised_file_size_bytes,
            },
        );

        let recast = if config.recast.enabled {
            Some(RecastController::new(
                telemetry.clone(),
                RecastOptions {
                    minimum_recast_interval: Duration::from_secs(config.recast.minimum_recast_interval_min * 60),
                    maximum_recast_interval: Duration::from_secs(config.recast.maximum_recast_interval_min * 60),
                    time_wasted_ratio: config.recast.time_wasted_ratio,
                },
            ))
        } else {
            None
        };

        Ok(Self {
            config,
            telemetry,
            staller_pool,
            timeout_watcher,
            ftp_factory,
            recast,
            gossip,
        })
    }

    /// Spawns every background task the node needs regardless of which
    /// protocol subcommand is serving connections: pool upkeep, FTP
    /// throttle release, telemetry push, timeout-cache sweep, and the
    /// optional recast checker.
    pub fn start_background_tasks(&self, shutdown: broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let (dereg, prune) = self.staller_pool.start(shutdown.clone());
        handles.push(dereg);
        handles.push(prune);

        handles.push(self.ftp_factory.start(shutdown.clone()));

        handles.push(
            self.telemetry
                .start_push_loop(Duration::from_secs(self.config.telemetry.push_interval_secs), shutdown.clone()),
        );

        handles.push(spawn_timeout_sweep(self.timeout_watcher.clone(), shutdown.clone()));

        if let Some(recast) = &self.recast {
            handles.push(recast.clone().start(shutdown.clone()));
        }

        handles
    }

    /// Aborts the gossip overlay's swarm task, if one is running.
    pub fn abort_gossip(&self) {
        if let Some(overlay) = &self.gossip {
            overlay.abort();
        }
    }
}

fn spawn_timeout_sweep(watcher: Arc<TimeoutWatcher>, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = ticker.tick() => watcher.sweep(),
                _ = shutdown_rx.recv() => return,
            }
        }
    })
}

/// Builds the timeout watcher and, if clustering is enabled, the
/// gossip overlay publishing into it. A join failure or spawn error is
/// logged and treated as "run locally" rather than fatal -- spec.md
/// section 7's `ClusterJoinFailed` path.
async fn init_cluster(config: &TarpitConfig, shutdown: broadcast::Sender<()>) -> (Arc<TimeoutWatcher>, Option<GossipOverlay>) {
    if matches!(config.cluster.mode, ClusterMode::Disabled) {
        return (Arc::new(TimeoutWatcher::with_null_publisher(ERA_0)), None);
    }

    let (publisher, outbound_rx) = GossipPublisher::channel();
    let watcher = Arc::new(TimeoutWatcher::new(ERA_0, publisher));

    let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/tcp/{}", config.cluster.bind_port)
        .parse()
        .expect("well-formed multiaddr");
    let seeds: Vec<Multiaddr> = config.cluster.known_peers.iter().filter_map(|raw| parse_peer_multiaddr(raw)).collect();

    let mut options = match config.cluster.mode {
        ClusterMode::Lan => GossipOptions::lan(listen_addr, seeds),
        ClusterMode::Wan => GossipOptions::wan(listen_addr, seeds),
        ClusterMode::ContainerOrchestrator => GossipOptions::container_orchestrator(listen_addr),
        ClusterMode::Disabled => unreachable!(),
    };
    options.connection_attempts = config.cluster.connection_attempts;
    options.connection_timeout = Duration::from_secs(config.cluster.connection_timeout_secs);

    match GossipOverlay::spawn(options.clone(), watcher.clone(), outbound_rx, shutdown) {
        Ok(overlay) => {
            if let Err(err) = overlay.wait_for_join(&options).await {
                tracing::warn!(%err, "cluster join failed, continuing with a local-only timeout watcher");
            }
            (watcher, Some(overlay))
        }
        Err(err) => {
            tracing::warn!(%err, "failed to start gossip overlay, continuing with a local-only timeout watcher");
            (watcher, None)
        }
    }
}

fn parse_peer_multiaddr(raw: &str) -> Option<Multiaddr> {
    let (host, port) = raw.rsplit_once(':')?;
    if host.parse::<std::net::Ipv6Addr>().is_ok() {
        format!("/ip6/{host}/tcp/{port}").parse().ok()
    } else {
        format!("/ip4/{host}/tcp/{port}").parse().ok()
    }
}
