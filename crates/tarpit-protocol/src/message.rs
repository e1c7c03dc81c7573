//! Gossip broadcast envelope.
//!
//! The only defined action today is `ADD_COLD_IP`, whose payload is
//! `"<peer>,<duration-nanos>"` per spec.md section 3. Kept as a flat
//! `{action, data}` struct (not an enum) so unknown actions from newer
//! nodes round-trip instead of failing to parse.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ACTION_ADD_COLD_IP: &str = "ADD_COLD_IP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastAction {
    pub action: String,
    pub data: String,
}

impl BroadcastAction {
    pub fn add_cold_ip(peer: &str, timeout: Duration) -> Self {
        Self {
            action: ACTION_ADD_COLD_IP.to_string(),
            data: format!("{peer},{}", timeout.as_nanos()),
        }
    }

    /// Parse an `ADD_COLD_IP` payload into `(peer, duration)`. Returns
    /// `None` for any other action or a malformed payload -- callers
    /// discard and log rather than propagate, per spec.md section 7
    /// ("Errors in gossip message parsing are logged and the message
    /// discarded").
    pub fn as_add_cold_ip(&self) -> Option<(&str, Duration)> {
        if self.action != ACTION_ADD_COLD_IP {
            return None;
        }
        let (peer, nanos) = self.data.split_once(',')?;
        let nanos: u128 = nanos.parse().ok()?;
        Some((peer, Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let action = BroadcastAction::add_cold_ip("1.2.3.4", Duration::from_secs(30));
        let json = serde_json::to_string(&action).unwrap();
        let back: BroadcastAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
        let (peer, d) = back.as_add_cold_ip().unwrap();
        assert_eq!(peer, "1.2.3.4");
        assert_eq!(d, Duration::from_secs(30));
    }

    #[test]
    fn unknown_action_is_not_add_cold_ip() {
        let action = BroadcastAction {
            action: "SOMETHING_ELSE".into(),
            data: "x".into(),
        };
        assert!(action.as_add_cold_ip().is_none());
    }

    #[test]
    fn malformed_payload_is_none_not_panic() {
        let action = BroadcastAction {
            action: ACTION_ADD_COLD_IP.into(),
            data: "no-comma-here".into(),
        };
        assert!(action.as_add_cold_ip().is_none());
    }
}
