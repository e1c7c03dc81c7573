//! FTP front door (spec.md section 6 / 4.8): wires `libunftp`'s server
//! onto `tarpit_ftp::FtpBackendFactory`, with an always-accept
//! authenticator and optional FTPS via a freshly minted certificate.

use std::ops::RangeInclusive;
use std::sync::Arc;

use tarpit_config::FtpServerSection;
use tarpit_ftp::FtpBackendFactory;
use tokio::sync::broadcast;

use crate::auth::AcceptAllAuthenticator;
use crate::tls_bridge;

pub async fn run(
    factory: Arc<FtpBackendFactory>,
    cfg: &FtpServerSection,
    shutdown: broadcast::Sender<()>,
) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", cfg.host, cfg.port);
    let passive_ports = parse_port_range(&cfg.passive_port_range)?;

    let factory_for_builder = factory.clone();
    let mut builder = libunftp::Server::with_authenticator(
        move || factory_for_builder.build(),
        Arc::new(AcceptAllAuthenticator),
    )
    .greeting("synthetic FTP service ready")
    .passive_ports(passive_ports);

    // Held for the lifetime of the server: dropping it deletes the
    // temp PEM pair libunftp was pointed at.
    let _tls_guard = if cfg.tls_enabled {
        let minted = tarpit_ftp::mint_self_signed(&cfg.tls_common_name)?;
        let guard = tls_bridge::materialize(&minted)?;
        builder = builder.ftps(guard.cert_path().to_path_buf(), guard.key_path().to_path_buf());
        Some(guard)
    } else {
        None
    };

    let server = builder.build().map_err(|err| anyhow::anyhow!("ftp server build failed: {err}"))?;

    tracing::info!(addr = %bind_addr, tls = cfg.tls_enabled, "ftp front door listening");

    let mut shutdown_rx = shutdown.subscribe();
    tokio::select! {
        result = server.listen(bind_addr) => result.map_err(|err| anyhow::anyhow!("ftp server error: {err}")),
        _ = shutdown_rx.recv() => Ok(()),
    }
}

fn parse_port_range(raw: &str) -> anyhow::Result<RangeInclusive<u16>> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("invalid passive port range: {raw}"))?;
    Ok(start.trim().parse()?..=end.trim().parse()?)
}
