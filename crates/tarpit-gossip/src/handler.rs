//! Broadcast-action handler (C7): applies an inbound `ADD_COLD_IP`
//! fact into the timeout watcher, grounded on
//! `http/gossip/action/broadcast.go`.

use tarpit_protocol::BroadcastAction;
use tarpit_timeout::TimeoutWatcher;

/// Applies one inbound broadcast action. Unknown actions and malformed
/// payloads are logged and discarded (spec.md section 7); never
/// propagated as an error.
pub fn handle_inbound(watcher: &TimeoutWatcher, raw: &[u8]) {
    let action: BroadcastAction = match serde_json::from_slice(raw) {
        Ok(action) => action,
        Err(err) => {
            tracing::warn!(%err, "gossip: discarding unparseable broadcast action");
            return;
        }
    };

    let Some((peer, timeout)) = action.as_add_cold_ip() else {
        tracing::debug!(action = %action.action, "gossip: ignoring unrecognized action");
        return;
    };

    // Rumor-spreading gate: a fact we already hold dies here; a new
    // one is re-committed with broadcast so it keeps propagating.
    if watcher.has_cold_cache_timeout(peer) {
        watcher.commit_to_cold_cache(peer, timeout);
    } else {
        watcher.commit_to_cold_cache_with_broadcast(peer, timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tarpit_protocol::ERA_0;

    #[test]
    fn new_fact_is_committed() {
        let watcher = TimeoutWatcher::with_null_publisher(ERA_0);
        let action = BroadcastAction::add_cold_ip("1.2.3.4", Duration::from_secs(30));
        let raw = serde_json::to_vec(&action).unwrap();

        handle_inbound(&watcher, &raw);

        assert!(watcher.has_cold_cache_timeout("1.2.3.4"));
        assert_eq!(watcher.get_timeout("1.2.3.4"), Duration::from_secs(30));
    }

    #[test]
    fn malformed_payload_is_discarded_without_panicking() {
        let watcher = TimeoutWatcher::with_null_publisher(ERA_0);
        handle_inbound(&watcher, b"not json");
        assert!(!watcher.has_cold_cache_timeout("anything"));
    }

    #[test]
    fn unrecognized_action_is_ignored() {
        let watcher = TimeoutWatcher::with_null_publisher(ERA_0);
        let raw = serde_json::to_vec(&serde_json::json!({"action": "NOOP", "data": ""})).unwrap();
        handle_inbound(&watcher, &raw);
        assert!(!watcher.has_cold_cache_timeout("anything"));
    }
}
