//! Protocol detector and multi-listener (C8, C9): a single shared TCP
//! socket fronting several sub-protocols, grounded on
//! `protocol/detect/listener.go`, `conditionallistener.go`, and
//! `conn.go`.

mod detector;
mod fallback;
mod listener;
mod rewind;

pub use detector::{FtpDetector, HttpDetector, ProtocolDetector};
pub use listener::{ConditionalListener, DetectedConn, MultiProtocolListener};
pub use rewind::RewindableConn;
