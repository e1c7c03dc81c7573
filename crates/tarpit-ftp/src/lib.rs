//! Synthetic FTP surface (C10, C11): a libunftp `StorageBackend` that
//! never touches a real filesystem, a per-client operation throttle,
//! and a self-minted TLS certificate for optional FTPS. Grounded on
//! `protocol/ftp/driver/*.go`, `protocol/ftp/throttle/ftp_throttle.go`
//! and `protocol/ftp/stall/file_stall.go`.

mod file_staller;
mod filesystem;
mod storage_backend;
mod throttle;
mod tls;

pub use file_staller::FtpFileStallerFactory;
pub use storage_backend::{SyntheticMetadata, TarpitFtpBackend};
pub use throttle::{FtpThrottle, ThrottleError};
pub use tls::{mint_self_signed, MintedCertificate, TlsError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tarpit_stall::StallerPool;

/// Tuning a `TarpitFtpBackend` factory is built from -- the pieces
/// that come from `tarpit-protocol::Era` plus `tarpit-config`.
#[derive(Debug, Clone, Copy)]
pub struct FtpDriverOptions {
    pub max_pending_operations: usize,
    pub throttle_release_interval: Duration,
    pub transfer_rate: Duration,
    pub advertised_file_size: u64,
}

/// Builds one `TarpitFtpBackend` per connecting client, allocating a
/// fresh client id each time so the throttle queue and synthetic
/// listings stay scoped to a single session.
pub struct FtpBackendFactory {
    next_client_id: AtomicU64,
    throttle: Arc<FtpThrottle>,
    staller_factory: Arc<FtpFileStallerFactory>,
    throttle_release_interval: Duration,
}

impl FtpBackendFactory {
    pub fn new(pool: Arc<StallerPool>, options: FtpDriverOptions) -> Arc<Self> {
        let throttle = FtpThrottle::new(options.max_pending_operations);
        let staller_factory = Arc::new(FtpFileStallerFactory::new(pool, options.transfer_rate, options.advertised_file_size));

        Arc::new(Self {
            next_client_id: AtomicU64::new(1),
            throttle,
            staller_factory,
            throttle_release_interval: options.throttle_release_interval,
        })
    }

    /// Spawns the throttle's release ticker; call once at startup
    /// alongside the rest of the node's background tasks.
    pub fn start(&self, shutdown: tokio::sync::broadcast::Sender<()>) -> tokio::task::JoinHandle<()> {
        self.throttle.start(self.throttle_release_interval, shutdown)
    }

    pub fn build(&self) -> TarpitFtpBackend {
        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        TarpitFtpBackend::new(client_id, self.throttle.clone(), self.staller_factory.clone())
    }

    /// Releases whatever is still queued for `client_id`, called when
    /// a session's connection drops so its waiters don't sit until
    /// the next release tick for nothing.
    pub fn release(&self, client_id: u64) {
        self.throttle.release_all(client_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarpit_stall::StallerPoolOptions;

    #[test]
    fn each_build_allocates_a_distinct_client_id() {
        let pool = StallerPool::new(StallerPoolOptions::default());
        let factory = FtpBackendFactory::new(
            pool,
            FtpDriverOptions {
                max_pending_operations: 8,
                throttle_release_interval: Duration::from_secs(1),
                transfer_rate: Duration::from_millis(75),
                advertised_file_size: 1024,
            },
        );

        let a = factory.build();
        let b = factory.build();
        assert_ne!(a.client_id(), b.client_id());
    }
}
