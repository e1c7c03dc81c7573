//! Group-then-identifier map of active stallers, grounded on the
//! original's `StallerCollection`: a `map[string]map[uint64]Staller`
//! behind a single mutex, so pruning can always find "the group with
//! the most active connections" without scanning the whole fleet more
//! than once.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{StallError, Staller, StallerHandle};

pub struct StallerCollection {
    stallers: Mutex<HashMap<String, HashMap<u64, StallerHandle>>>,
    group_limit: usize,
}

impl StallerCollection {
    pub fn new(group_limit: usize) -> Self {
        Self { stallers: Mutex::new(HashMap::new()), group_limit }
    }

    /// Inserts `staller`, failing with [`StallError::GroupFull`] if its
    /// group is already at `group_limit` members (spec.md section 4.4).
    pub fn add(&self, staller: StallerHandle) -> Result<(), StallError> {
        let mut guard = self.stallers.lock().expect("staller collection lock poisoned");
        let group_key = staller.group_identifier().to_string();

        let current_len = guard.get(&group_key).map(HashMap::len).unwrap_or(0);
        if current_len >= self.group_limit {
            return Err(StallError::GroupFull);
        }

        guard.entry(group_key).or_default().insert(staller.identifier(), staller);
        Ok(())
    }

    pub fn delete(&self, group: &str, id: u64) {
        let mut guard = self.stallers.lock().expect("staller collection lock poisoned");
        if let Some(group_map) = guard.get_mut(group) {
            group_map.remove(&id);
            if group_map.is_empty() {
                guard.remove(group);
            }
        }
    }

    pub fn len(&self) -> usize {
        let guard = self.stallers.lock().expect("staller collection lock poisoned");
        guard.values().map(|group| group.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn group_len(&self, group: &str) -> usize {
        let guard = self.stallers.lock().expect("staller collection lock poisoned");
        guard.get(group).map(HashMap::len).unwrap_or(0)
    }

    /// Closes and removes one staller from the largest group, `count`
    /// times. Matches `PruneNByIp`: each iteration re-finds the
    /// largest group, since closing one member can shrink it below
    /// another group's size.
    pub fn prune_n(&self, count: usize) {
        for _ in 0..count {
            self.prune_one();
        }
    }

    fn prune_one(&self) {
        let victim = {
            let guard = self.stallers.lock().expect("staller collection lock poisoned");
            let largest_group = guard.iter().max_by_key(|(_, members)| members.len());
            largest_group.and_then(|(_, members)| members.values().next().cloned())
        };

        if let Some(staller) = victim {
            staller.close();
            self.delete(staller.group_identifier(), staller.identifier());
        }
    }

    /// Closes and removes every staller in `group`. Matches the
    /// original's `StopByIdentifier`/`PruneByIdentifierGroup`.
    pub fn close_group(&self, group: &str) {
        let members = {
            let mut guard = self.stallers.lock().expect("staller collection lock poisoned");
            guard.remove(group)
        };

        if let Some(members) = members {
            for staller in members.values() {
                staller.close();
            }
        }
    }

    /// Closes every staller and empties the collection. Used on pool
    /// shutdown.
    pub fn close_all(&self) {
        let mut guard = self.stallers.lock().expect("staller collection lock poisoned");
        for group in guard.values() {
            for staller in group.values() {
                staller.close();
            }
        }
        guard.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeStaller {
        group: String,
        id: u64,
        closed: AtomicBool,
    }

    impl crate::Staller for FakeStaller {
        fn group_identifier(&self) -> &str {
            &self.group
        }
        fn identifier(&self) -> u64 {
            self.id
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn fake(group: &str, id: u64) -> StallerHandle {
        std::sync::Arc::new(FakeStaller {
            group: group.to_string(),
            id,
            closed: AtomicBool::new(false),
        })
    }

    #[test]
    fn len_counts_across_groups() {
        let collection = StallerCollection::new(64);
        collection.add(fake("1.1.1.1", 1)).unwrap();
        collection.add(fake("1.1.1.1", 2)).unwrap();
        collection.add(fake("2.2.2.2", 3)).unwrap();
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn prune_n_removes_from_the_largest_group_first() {
        let collection = StallerCollection::new(64);
        collection.add(fake("heavy", 1)).unwrap();
        collection.add(fake("heavy", 2)).unwrap();
        collection.add(fake("heavy", 3)).unwrap();
        collection.add(fake("light", 4)).unwrap();

        collection.prune_n(2);

        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn delete_removes_empty_groups() {
        let collection = StallerCollection::new(64);
        collection.add(fake("solo", 1)).unwrap();
        collection.delete("solo", 1);
        assert_eq!(collection.len(), 0);
    }

    #[test]
    fn add_rejects_once_a_group_is_at_its_limit() {
        let collection = StallerCollection::new(2);
        collection.add(fake("x", 1)).unwrap();
        collection.add(fake("x", 2)).unwrap();
        assert!(matches!(collection.add(fake("x", 3)), Err(StallError::GroupFull)));
        assert_eq!(collection.group_len("x"), 2);
    }

    #[test]
    fn group_limit_does_not_affect_other_groups() {
        let collection = StallerCollection::new(1);
        collection.add(fake("x", 1)).unwrap();
        assert!(collection.add(fake("y", 2)).is_ok());
    }

    #[test]
    fn close_group_closes_and_removes_only_that_group() {
        let collection = StallerCollection::new(64);
        collection.add(fake("x", 1)).unwrap();
        collection.add(fake("y", 2)).unwrap();

        collection.close_group("x");

        assert_eq!(collection.group_len("x"), 0);
        assert_eq!(collection.group_len("y"), 1);
    }
}
