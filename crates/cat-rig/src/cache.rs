//! Short-lived cache of radio state
//!
//! Entries are keyed by operation and slot, stamped with the instant they
//! were read or written, and expire after a fixed TTL. The cache is owned
//! by the connection actor, so no locking is needed.

use std::collections::HashMap;
use std::time::Duration;

use cat_protocol::Slot;
use tokio::time::Instant;

use crate::engine::{Operation, Value};

/// Default time-to-live of a cached value
pub const DEFAULT_TTL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    captured: Instant,
}

/// TTL cache of operation values
#[derive(Debug, Clone)]
pub struct StateCache {
    ttl: Duration,
    entries: HashMap<(Operation, Slot), Entry>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl StateCache {
    /// Create an empty cache
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Fresh value for the key, if any
    pub fn get(&self, op: Operation, slot: Slot) -> Option<Value> {
        self.entries
            .get(&(op, slot))
            .filter(|entry| entry.captured.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Store a value read from or written to the radio
    pub fn put(&mut self, op: Operation, slot: Slot, value: Value) {
        if !op.is_cacheable() {
            return;
        }
        self.entries.insert(
            (op, slot),
            Entry {
                value,
                captured: Instant::now(),
            },
        );
    }

    /// Drop one key
    pub fn invalidate(&mut self, op: Operation, slot: Slot) {
        self.entries.remove(&(op, slot));
    }

    /// Drop every slot's entry for the given operations
    pub fn invalidate_ops(&mut self, ops: &[Operation]) {
        self.entries.retain(|(op, _), _| !ops.contains(op));
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let mut cache = StateCache::new(Duration::from_millis(250));
        cache.put(Operation::Frequency, Slot::MAIN_A, Value::Frequency(7_074_000));
        assert_eq!(
            cache.get(Operation::Frequency, Slot::MAIN_A),
            Some(Value::Frequency(7_074_000))
        );

        tokio::time::advance(Duration::from_millis(249)).await;
        assert!(cache.get(Operation::Frequency, Slot::MAIN_A).is_some());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(Operation::Frequency, Slot::MAIN_A).is_none());
    }

    #[test]
    fn test_keys_are_per_slot() {
        let mut cache = StateCache::default();
        cache.put(Operation::Frequency, Slot::MAIN_A, Value::Frequency(14_200_000));
        assert!(cache.get(Operation::Frequency, Slot::MAIN_B).is_none());
        assert!(cache.get(Operation::Mode, Slot::MAIN_A).is_none());
    }

    #[test]
    fn test_uncacheable_ops_never_stored() {
        let mut cache = StateCache::default();
        cache.put(Operation::Ptt, Slot::MAIN_A, Value::Ptt(true));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidation() {
        let mut cache = StateCache::default();
        cache.put(Operation::Frequency, Slot::MAIN_A, Value::Frequency(1));
        cache.put(Operation::Frequency, Slot::SUB_A, Value::Frequency(2));
        cache.put(Operation::Power, Slot::MAIN_A, Value::Power(100));

        cache.invalidate(Operation::Power, Slot::MAIN_A);
        assert_eq!(cache.len(), 2);
        cache.invalidate_ops(&[Operation::Frequency, Operation::Mode]);
        assert!(cache.is_empty());

        cache.put(Operation::Power, Slot::MAIN_A, Value::Power(100));
        cache.clear();
        assert!(cache.is_empty());
    }
}
