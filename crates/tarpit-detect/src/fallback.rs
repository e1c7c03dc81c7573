//! The fallback virtual listener: traffic no detector recognized ends
//! up here, and gets a zero-width-joiner byte sequence written to it
//! every `interval` until the peer disconnects. No reads are ever
//! attempted, per `protocol/detect/listener.go`'s fallback behaviour.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::listener::{ConditionalListener, DetectedConn};

const ZERO_WIDTH_JOINER: &[u8] = "\u{200D}".as_bytes();

async fn keep_alive(mut conn: DetectedConn, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if conn.write_all(ZERO_WIDTH_JOINER).await.is_err() {
            return;
        }
    }
}

/// Accepts connections routed to the fallback listener and spawns a
/// keepalive writer for each, until `shutdown` fires.
pub async fn run_fallback_loop(
    listener: Arc<ConditionalListener>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Some(conn) => {
                        tokio::spawn(keep_alive(conn, interval));
                    }
                    None => return,
                }
            }
            _ = shutdown.recv() => return,
        }
    }
}
