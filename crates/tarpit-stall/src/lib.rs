//! Tarpit Stall -- the byte-paced connection drip (spec.md section
//! 4.3) and the pool that bounds how many of them can run at once
//! (spec.md section 4.4).

mod collection;
mod http_staller;
mod pool;

pub use collection::StallerCollection;
pub use http_staller::{HttpStaller, HttpStallerOptions, NullWastedTimeSink, WastedTimeSink};
pub use pool::{StallerPool, StallerPoolOptions};

use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StallError {
    #[error("maximum connections reached, cannot register staller")]
    PoolFull,
    #[error("staller group already has groupLimit members, cannot register staller")]
    GroupFull,
    #[error("io error while stalling connection: {0}")]
    Io(#[from] std::io::Error),
}

/// A registrable, closeable connection-stalling task.
///
/// Mirrors the original's minimal `Staller` interface: the pool only
/// ever needs to group, identify, and shut one down -- it never needs
/// to know what protocol is driving it.
pub trait Staller: Send + Sync {
    /// The bucket a staller is pruned alongside -- typically the
    /// remote IP, so a single abusive client's connections are pruned
    /// together before any other client's.
    fn group_identifier(&self) -> &str;

    /// Identifies this staller within its group (e.g. the connection
    /// ID), so the pool can tell two stallers in the same group apart.
    fn identifier(&self) -> u64;

    /// Signals the staller's write loop to stop and release its
    /// connection. Idempotent: closing twice is a no-op.
    fn close(&self);
}

pub type StallerHandle = Arc<dyn Staller>;
