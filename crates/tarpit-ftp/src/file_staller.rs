//! The FTP file staller (spec.md section 4.8 / C10): wraps a
//! [`tarpit_generator::ContentSource`] so a `RETR` reads back paced,
//! synthetic bytes that total exactly the advertised file size,
//! grounded on `protocol/ftp/stall/file_stall.go` (the staller is
//! registered with the pool under group `ftp-<ctx-id>` so a single
//! abusive FTP client is pruned alongside its other connections) and
//! `tarpit_stall::HttpStaller`'s byte-paced drip for the pacing shape.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tarpit_generator::ContentSource;
use tarpit_stall::{StallError, Staller, StallerHandle, StallerPool};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use crate::filesystem;

/// The pool-facing half: only `group_identifier`/`identifier`/`close`,
/// same as every other staller. Held by the pool as `Arc<dyn Staller>`
/// independently of the [`FtpFileReader`] the storage backend actually
/// reads from.
struct FtpFileStallerCore {
    group_id: String,
    id: u64,
    closed: AtomicBool,
}

impl Staller for FtpFileStallerCore {
    fn group_identifier(&self) -> &str {
        &self.group_id
    }

    fn identifier(&self) -> u64 {
        self.id
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// The `AsyncRead` half a `RETR` actually streams from. Bytes are
/// produced by a background task paced on `transfer_rate` and handed
/// across a bounded channel; this side just drains it.
pub struct FtpFileReader {
    _core: Arc<FtpFileStallerCore>,
    rx: mpsc::Receiver<u8>,
}

impl AsyncRead for FtpFileReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let mut progressed = false;
        loop {
            if buf.remaining() == 0 {
                return Poll::Ready(Ok(()));
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(byte)) => {
                    buf.put_slice(&[byte]);
                    progressed = true;
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return if progressed { Poll::Ready(Ok(())) } else { Poll::Pending },
            }
        }
    }
}

/// Builds file stallers for one FTP client context, registering each
/// with the shared [`StallerPool`] under `ftp-<ctx_id>`.
pub struct FtpFileStallerFactory {
    pool: Arc<StallerPool>,
    transfer_rate: Duration,
    advertised_file_size: u64,
}

impl FtpFileStallerFactory {
    pub fn new(pool: Arc<StallerPool>, transfer_rate: Duration, advertised_file_size: u64) -> Self {
        Self { pool, transfer_rate, advertised_file_size }
    }

    pub fn advertised_file_size(&self) -> u64 {
        self.advertised_file_size
    }

    /// Opens a synthetic `RETR` stream for `path` as seen by
    /// `ctx_id`/`client_id`. `start_pos` is accepted (`REST` support)
    /// but ignored past the padding math: a reject-resume content
    /// source has no meaningful byte offset to seek to.
    pub fn open_for_read(
        &self,
        ctx_id: u64,
        client_id: u64,
        path: &str,
    ) -> Result<FtpFileReader, StallError> {
        let group_id = format!("ftp-{ctx_id}");
        let id = filesystem::crc64(path.as_bytes());

        let core = Arc::new(FtpFileStallerCore { group_id, id, closed: AtomicBool::new(false) });
        self.pool.register(core.clone() as StallerHandle)?;

        let format = tarpit_generator::registry::for_path(path);
        let seed = client_id ^ filesystem::crc64(path.as_bytes());
        let rng = tarpit_rng::SeededRng::from_seed(seed);
        let generator: Box<dyn ContentSource> =
            Box::new(tarpit_generator::DocumentSource::new(rng, format, tarpit_generator::GeneratorTuning::default()));

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pace_content(core.clone(), generator, self.transfer_rate, self.advertised_file_size, tx));

        Ok(FtpFileReader { _core: core, rx })
    }
}

/// Drains `generator` byte by byte onto `tx`, pacing each byte by
/// `transfer_rate` and padding the final record with spaces so the
/// total emitted exactly matches `advertised_size`, matching
/// `file_stall.go`'s "always finish at the advertised length"
/// contract.
async fn pace_content(
    core: Arc<FtpFileStallerCore>,
    mut generator: Box<dyn ContentSource>,
    transfer_rate: Duration,
    advertised_size: u64,
    tx: mpsc::Sender<u8>,
) {
    let mut ticker = tokio::time::interval(transfer_rate);
    let mut emitted: u64 = 0;

    macro_rules! send_paced {
        ($bytes:expr) => {
            for byte in $bytes {
                ticker.tick().await;
                if core.closed.load(Ordering::SeqCst) || tx.send(byte).await.is_err() {
                    return;
                }
            }
        };
    }

    send_paced!(generator.start());

    loop {
        let mut chunk = generator.generate_chunk();
        chunk.extend_from_slice(&generator.chunk_separator());

        let remaining = advertised_size.saturating_sub(emitted);
        if chunk.len() as u64 > remaining {
            break;
        }
        emitted += chunk.len() as u64;
        send_paced!(chunk);
    }

    let end = generator.end();
    let remaining = advertised_size.saturating_sub(emitted);
    let pad_len = remaining.saturating_sub(end.len() as u64);

    send_paced!(std::iter::repeat(b' ').take(pad_len as usize));
    send_paced!(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarpit_stall::StallerPoolOptions;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn read_total_matches_advertised_size() {
        let pool = StallerPool::new(StallerPoolOptions::default());
        let factory = FtpFileStallerFactory::new(pool, Duration::from_micros(1), 512);
        let mut reader = factory.open_for_read(1, 99, "/export/report.json").unwrap();

        let mut buf = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), reader.read_to_end(&mut buf))
            .await
            .expect("read did not finish")
            .unwrap();

        assert_eq!(buf.len(), 512);
    }

    #[tokio::test]
    async fn same_client_and_path_reproduce_identical_bytes() {
        let pool = StallerPool::new(StallerPoolOptions::default());
        let factory = FtpFileStallerFactory::new(pool, Duration::from_micros(1), 256);

        let mut a = Vec::new();
        factory
            .open_for_read(1, 7, "/backup.sql")
            .unwrap()
            .read_to_end(&mut a)
            .await
            .unwrap();

        let mut b = Vec::new();
        factory
            .open_for_read(2, 7, "/backup.sql")
            .unwrap()
            .read_to_end(&mut b)
            .await
            .unwrap();

        assert_eq!(a, b);
    }
}
