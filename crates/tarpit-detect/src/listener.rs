//! Virtual listeners and the multi-protocol accept loop, grounded on
//! `protocol/detect/conditionallistener.go` and
//! `protocol/detect/listener.go`.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tarpit_protocol::Era;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

use crate::detector::ProtocolDetector;
use crate::fallback;
use crate::rewind::RewindableConn;

/// A connection that has cleared detection: reads replay the detection
/// bytes first (the rewind), writes pass straight through.
pub struct DetectedConn {
    read: RewindableConn<OwnedReadHalf>,
    write: OwnedWriteHalf,
    peer_addr: SocketAddr,
}

impl DetectedConn {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl AsyncRead for DetectedConn {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().read).poll_read(cx, buf)
    }
}

impl AsyncWrite for DetectedConn {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().write).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().write).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().write).poll_shutdown(cx)
    }
}

/// A channel-backed listener a sub-protocol server attaches to as if
/// it were its own `TcpListener` -- mirrors `ConditionalListener`'s
/// `Accept()`/`Dispatch()` pair.
pub struct ConditionalListener {
    sender: mpsc::Sender<DetectedConn>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<DetectedConn>>,
}

impl ConditionalListener {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    fn dispatch(&self, conn: DetectedConn) {
        if self.sender.try_send(conn).is_err() {
            tracing::warn!("multi-protocol: virtual listener queue full, dropping connection");
        }
    }

    /// The standard `Accept()` contract: blocks until a connection is
    /// routed here, or returns `None` once the listener is closed.
    pub async fn accept(&self) -> Option<DetectedConn> {
        self.receiver.lock().await.recv().await
    }
}

/// A single TCP socket shared by every configured sub-protocol plus a
/// `fallback` listener for unclassified traffic.
pub struct MultiProtocolListener {
    detectors: Vec<Arc<dyn ProtocolDetector>>,
    listeners: HashMap<&'static str, Arc<ConditionalListener>>,
    fallback: Arc<ConditionalListener>,
    era: Era,
}

impl MultiProtocolListener {
    pub fn new(detectors: Vec<Arc<dyn ProtocolDetector>>, era: Era) -> Arc<Self> {
        let listeners = detectors
            .iter()
            .map(|d| (d.protocol_name(), Arc::new(ConditionalListener::new(16))))
            .collect();

        Arc::new(Self {
            detectors,
            listeners,
            fallback: Arc::new(ConditionalListener::new(16)),
            era,
        })
    }

    pub fn listener_for(&self, protocol: &str) -> Arc<ConditionalListener> {
        self.listeners.get(protocol).cloned().unwrap_or_else(|| self.fallback.clone())
    }

    pub fn fallback_listener(&self) -> Arc<ConditionalListener> {
        self.fallback.clone()
    }

    /// Binds the shared socket, accepts connections, and spawns one
    /// detection task per connection until `shutdown` fires. Also
    /// drives the fallback listener's own write-only keepalive loop.
    pub async fn run(
        self: Arc<Self>,
        bind_addr: SocketAddr,
        shutdown: broadcast::Sender<()>,
    ) -> io::Result<()> {
        let tcp_listener = TcpListener::bind(bind_addr).await?;

        tokio::spawn(fallback::run_fallback_loop(
            self.fallback_listener(),
            self.era.fallback_write_interval(),
            shutdown.subscribe(),
        ));

        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = tcp_listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            let this = self.clone();
                            tokio::spawn(async move { this.handle_connection(socket, peer).await; });
                        }
                        Err(err) => tracing::error!(%err, "multi-protocol: accept failed"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("multi-protocol: shutting down accept loop");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, socket: TcpStream, peer: SocketAddr) {
        let (owned_read, mut write_half) = socket.into_split();
        let mut conn = RewindableConn::new(owned_read, self.era.rewind_buffer_size);

        match self.attempt_handoff(&mut conn, self.era.initial_read_timeout()).await {
            Ok(Some(data)) => {
                self.dispatch(data, conn, write_half, peer);
                return;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(%peer, %err, "multi-protocol: initial read failed");
                return;
            }
        }

        let probe_detectors = self.detectors.clone();
        let probe_interval = self.era.probe_interval();
        let probe_deadline = self.era.detect_read_timeout();

        let (detect_result, returned_write) = tokio::join!(
            self.attempt_handoff(&mut conn, probe_deadline),
            send_probes(write_half, probe_detectors, probe_interval, probe_deadline)
        );
        write_half = returned_write;

        match detect_result {
            Ok(Some(data)) => self.dispatch(data, conn, write_half, peer),
            Ok(None) => {
                tracing::debug!(%peer, "multi-protocol: no data read during probe, using fallback");
                self.dispatch(Vec::new(), conn, write_half, peer);
            }
            Err(err) => {
                tracing::debug!(%peer, %err, "multi-protocol: probe-phase read failed");
            }
        }
    }

    async fn attempt_handoff(
        &self,
        conn: &mut RewindableConn<OwnedReadHalf>,
        timeout: Duration,
    ) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.era.rewind_buffer_size];
        match tokio::time::timeout(timeout, conn.read(&mut buf)).await {
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(n)) => Ok(Some(buf[..n].to_vec())),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Ok(None),
        }
    }

    fn find_matching_protocol(&self, data: &[u8]) -> Option<&'static str> {
        self.detectors.iter().find(|d| d.is_match(data)).map(|d| d.protocol_name())
    }

    fn dispatch(
        &self,
        data: Vec<u8>,
        mut conn: RewindableConn<OwnedReadHalf>,
        write: OwnedWriteHalf,
        peer: SocketAddr,
    ) {
        let target = match self.find_matching_protocol(&data) {
            Some(protocol) => {
                tracing::info!(%peer, protocol, "multi-protocol: matched");
                self.listener_for(protocol)
            }
            None => {
                tracing::info!(%peer, "multi-protocol: no matching detector, routing to fallback");
                self.fallback.clone()
            }
        };

        conn.rewind();
        target.dispatch(DetectedConn { read: conn, write, peer_addr: peer });
    }
}

async fn send_probes(
    mut write_half: OwnedWriteHalf,
    detectors: Vec<Arc<dyn ProtocolDetector>>,
    interval: Duration,
    deadline: Duration,
) -> OwnedWriteHalf {
    use tokio::io::AsyncWriteExt;

    let mut ticker = tokio::time::interval(interval);
    let sleep = tokio::time::sleep(deadline);
    tokio::pin!(sleep);

    for detector in &detectors {
        let Some(probe) = detector.probe() else { continue };
        tokio::select! {
            _ = &mut sleep => break,
            _ = ticker.tick() => {
                if let Err(err) = write_half.write_all(probe).await {
                    tracing::debug!(protocol = detector.protocol_name(), %err, "multi-protocol: probe write failed");
                    break;
                }
            }
        }
    }

    write_half
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{FtpDetector, HttpDetector};
    use tarpit_protocol::ERA_0;
    use tokio::io::AsyncWriteExt;

    async fn connect_pair(addr: SocketAddr) -> TcpStream {
        TcpStream::connect(addr).await.unwrap()
    }

    #[tokio::test]
    async fn http_traffic_is_routed_to_the_http_listener() {
        let detectors: Vec<Arc<dyn ProtocolDetector>> = vec![Arc::new(HttpDetector), Arc::new(FtpDetector)];
        let listener = MultiProtocolListener::new(detectors, ERA_0);

        let tcp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bind_addr = tcp_listener.local_addr().unwrap();
        drop(tcp_listener);

        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let listener_clone = listener.clone();
        let shutdown_for_run = shutdown_tx.clone();
        tokio::spawn(async move {
            let _ = listener_clone.run(bind_addr, shutdown_for_run).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut client = connect_pair(bind_addr).await;
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        let http_listener = listener.listener_for("http");
        let conn = tokio::time::timeout(Duration::from_secs(1), http_listener.accept())
            .await
            .expect("accept did not time out")
            .expect("listener closed unexpectedly");

        assert_eq!(conn.peer_addr().ip(), bind_addr.ip());

        let _ = shutdown_tx.send(());
    }
}
