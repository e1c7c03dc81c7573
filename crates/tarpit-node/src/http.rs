//! HTTP front door (spec.md section 6): parses just enough of the
//! request line and headers to pick a content generator and resolve
//! the trusted-proxy peer, then hands the connection to
//! `tarpit_stall::HttpStaller` for the actual stall.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tarpit_config::{ServerSection, StallerSection};
use tarpit_generator::{registry, DocumentSource, GeneratorTuning};
use tarpit_rng::SeededRng;
use tarpit_stall::{HttpStaller, HttpStallerOptions, StallerPool};
use tarpit_telemetry::Telemetry;
use tarpit_timeout::TimeoutWatcher;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, AsyncRead, BufReader};

use crate::chunked::ChunkedWriter;
use crate::trusted_proxy;

/// One HTTP exchange: parses the request, picks a generator from the
/// path suffix, and stalls the response until the peer's learned
/// timeout elapses or the pool evicts the connection.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: SocketAddr,
    connection_id: u64,
    server_cfg: &ServerSection,
    staller_cfg: &StallerSection,
    pool: Arc<StallerPool>,
    watcher: Arc<TimeoutWatcher>,
    telemetry: Arc<Telemetry>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);

    let Some((path, forwarded_for)) = read_request(&mut reader, &server_cfg.trusted_proxy_header).await else {
        return;
    };

    let peer_ip = trusted_proxy::resolve_peer(peer_addr.ip(), forwarded_for.as_deref(), server_cfg);

    let format = registry::for_path(&path);
    let content_type = format.content_type();

    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nTransfer-Encoding: chunked\r\nConnection: keep-alive\r\n\r\n"
    );
    if reader.write_all(header.as_bytes()).await.is_err() || reader.flush().await.is_err() {
        return;
    }

    let rng = SeededRng::from_time();
    let generator = Box::new(
        DocumentSource::new(rng, format, GeneratorTuning::default()).with_secrets_sink(telemetry.clone()),
    );

    let staller = HttpStaller::new(HttpStallerOptions {
        ip_address: peer_ip.clone(),
        connection_id,
        transfer_rate: Duration::from_millis(staller_cfg.transfer_rate_ms),
        report_interval: Duration::from_secs(staller_cfg.report_interval_secs),
        generator,
        wasted_time_sink: telemetry,
    });

    if pool.register(staller.clone()).is_err() {
        return;
    }
    staller.bind_to_pool(pool.deregister_sender());

    let deadline = watcher.get_timeout(&peer_ip);
    let started_at = Instant::now();

    // `run` returns `Ok` when the deadline elapsed or the pool evicted
    // the staller, `Err` when the write failed because the peer closed
    // the connection first -- the same `OnTimeout`/`OnClose` split the
    // learner needs to keep the valid-timeout ring and instant-commit
    // path from mixing up "we waited long enough" with "they hung up".
    let was_closed_by_peer = staller.run(ChunkedWriter::new(reader), deadline).await.is_err();

    watcher.record_response(&peer_ip, started_at.elapsed(), was_closed_by_peer);
}

/// Reads the request line and headers, returning the URL path and the
/// value of the configured trusted-proxy header if present. Returns
/// `None` on a malformed or truncated request.
async fn read_request<S>(reader: &mut BufReader<S>, proxy_header: &str) -> Option<(String, Option<String>)>
where
    S: AsyncRead + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.ok()? == 0 {
        return None;
    }

    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut forwarded_for = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case(proxy_header) {
                forwarded_for = Some(value.trim().to_string());
            }
        }
    }

    Some((path, forwarded_for))
}
