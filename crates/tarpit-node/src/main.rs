//! Tarpit Node -- single binary HTTP/FTP honeypot.
//!
//! Usage:
//!   tarpit-node start            # run every enabled protocol
//!   tarpit-node http             # HTTP only, no detection front door
//!   tarpit-node ftp              # FTP only
//!   tarpit-node version

mod auth;
mod chunked;
mod ftp;
mod http;
mod runtime;
mod signals;
mod tls_bridge;
mod trusted_proxy;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tarpit_config::ConfigOverrides;
use tarpit_detect::{FtpDetector, HttpDetector, MultiProtocolListener, ProtocolDetector};
use tarpit_protocol::ERA_0;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use runtime::Node;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "tarpit-node", about = "Synthetic HTTP/FTP tarpit honeypot")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Subcommand)]
enum Command {
    /// Run every enabled protocol behind the shared-port detection front door (FTP still gets its own listener).
    Start,
    /// Run the HTTP tarpit alone, bound directly -- no protocol detection.
    Http,
    /// Run the FTP tarpit alone.
    Ftp,
    /// Print the build version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::Version) {
        println!("tarpit-node {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match tarpit_config::load(&cli.overrides) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.filter.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let (shutdown_tx, _) = broadcast::channel(16);

    let node = Arc::new(Node::bootstrap(config, shutdown_tx.clone()).await?);

    let mut handles = node.start_background_tasks(shutdown_tx.clone());

    handles.push(match cli.command {
        Command::Start => spawn_start(node.clone(), shutdown_tx.clone()),
        Command::Http => spawn_http_only(node.clone(), shutdown_tx.clone()),
        Command::Ftp => spawn_ftp_only(node.clone(), shutdown_tx.clone()),
        Command::Version => unreachable!("handled above"),
    });

    signals::wait_for_shutdown_signal().await;

    tracing::info!("shutdown requested, draining connections");
    node.staller_pool.stop();
    let _ = shutdown_tx.send(());
    node.abort_gossip();

    if tokio::time::timeout(SHUTDOWN_GRACE, join_all(handles)).await.is_err() {
        tracing::warn!("shutdown grace period elapsed, forcing exit");
        std::process::exit(1);
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

fn spawn_http_only(node: Arc<Node>, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
    let bind_addr: SocketAddr = format!("{}:{}", node.config.server.host, node.config.server.port)
        .parse()
        .expect("valid http bind address");

    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(%err, "failed to bind http listener");
                return;
            }
        };
        tracing::info!(addr = %bind_addr, "http front door listening");

        let connection_id = AtomicU64::new(1);
        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            let id = connection_id.fetch_add(1, Ordering::SeqCst);
                            spawn_http_connection(node.clone(), socket, peer, id);
                        }
                        Err(err) => tracing::error!(%err, "http accept failed"),
                    }
                }
                _ = shutdown_rx.recv() => return,
            }
        }
    })
}

fn spawn_http_connection(node: Arc<Node>, socket: tokio::net::TcpStream, peer: SocketAddr, id: u64) {
    tokio::spawn(async move {
        http::handle_connection(
            socket,
            peer,
            id,
            &node.config.server,
            &node.config.staller,
            node.staller_pool.clone(),
            node.timeout_watcher.clone(),
            node.telemetry.clone(),
        )
        .await;
    });
}

fn spawn_ftp_only(node: Arc<Node>, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = ftp::run(node.ftp_factory.clone(), &node.config.ftp_server, shutdown).await {
            tracing::error!(%err, "ftp server exited with an error");
        }
    })
}

/// Multi-protocol mode shares the front-door port for HTTP only. FTP
/// always keeps its own listener: `libunftp::Server` owns its accept
/// loop outright and has no entry point for a connection someone else
/// already accepted, so it cannot be handed detected sockets.
fn spawn_start(node: Arc<Node>, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
    let bind_addr: SocketAddr = format!("{}:{}", node.config.server.host, node.config.server.port)
        .parse()
        .expect("valid http bind address");

    tokio::spawn(async move {
        let detectors: Vec<Arc<dyn ProtocolDetector>> = vec![Arc::new(HttpDetector), Arc::new(FtpDetector)];
        let multi = MultiProtocolListener::new(detectors, ERA_0);

        let http_listener = multi.listener_for("http");
        let http_node = node.clone();
        let connection_id = Arc::new(AtomicU64::new(1));
        let http_task = tokio::spawn(async move {
            while let Some(conn) = http_listener.accept().await {
                let peer = conn.peer_addr();
                let id = connection_id.fetch_add(1, Ordering::SeqCst);
                let node = http_node.clone();
                tokio::spawn(async move {
                    http::handle_connection(
                        conn,
                        peer,
                        id,
                        &node.config.server,
                        &node.config.staller,
                        node.staller_pool.clone(),
                        node.timeout_watcher.clone(),
                        node.telemetry.clone(),
                    )
                    .await;
                });
            }
        });

        let ftp_node = node.clone();
        let ftp_shutdown = shutdown.clone();
        let ftp_task = tokio::spawn(async move {
            if let Err(err) = ftp::run(ftp_node.ftp_factory.clone(), &ftp_node.config.ftp_server, ftp_shutdown).await {
                tracing::error!(%err, "ftp server exited with an error");
            }
        });

        let multi_result = multi.run(bind_addr, shutdown).await;
        if let Err(err) = multi_result {
            tracing::error!(%err, "multi-protocol front door exited with an error");
        }

        http_task.abort();
        let _ = ftp_task.await;
    })
}
