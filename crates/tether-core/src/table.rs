//! Keyed listener storage shared by the event center and observation tables.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One registered listener.
pub(crate) struct Slot<T> {
    active: AtomicBool,
    value: T,
}

impl<T> Slot<T> {
    /// `false` once the slot was removed; a snapshot taken earlier may still hold it.
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }
}

/// Listeners grouped by key in registration order, with an id index for removal.
///
/// Each listener is stored under an insertion sequence number, so removal is
/// a keyed lookup rather than a scan of its list. No shard lock is held while
/// callers use a snapshot, and removed slots are dropped only after their
/// shard lock is released.
pub(crate) struct ListenerTable<I, T> {
    slots: DashMap<String, BTreeMap<u64, Arc<Slot<T>>>>,
    index: DashMap<I, (String, u64)>,
    next_seq: AtomicU64,
    prune_empty: bool,
}

impl<I, T> ListenerTable<I, T>
where
    I: Copy + Eq + Hash,
{
    pub(crate) fn new(prune_empty: bool) -> Self {
        Self {
            slots: DashMap::new(),
            index: DashMap::new(),
            next_seq: AtomicU64::new(0),
            prune_empty,
        }
    }

    /// Append a listener under `key`.
    pub(crate) fn insert(&self, key: &str, id: I, value: T) {
        let slot = Arc::new(Slot {
            active: AtomicBool::new(true),
            value,
        });
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.slots
            .entry(key.to_string())
            .or_default()
            .insert(seq, slot);
        self.index.insert(id, (key.to_string(), seq));
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub(crate) fn remove(&self, id: I) -> bool {
        let Some((_, (key, seq))) = self.index.remove(&id) else {
            return false;
        };

        let (removed, now_empty) = match self.slots.get_mut(&key) {
            Some(mut list) => {
                let removed = list.remove(&seq);
                (removed, list.is_empty())
            }
            None => (None, false),
        };

        if now_empty && self.prune_empty {
            self.slots.remove_if(&key, |_, list| list.is_empty());
        }

        match removed {
            Some(slot) => {
                slot.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Clone out the listeners under `key` that pass `filter`, in registration order.
    pub(crate) fn snapshot(&self, key: &str, filter: impl Fn(&T) -> bool) -> Vec<Arc<Slot<T>>> {
        self.slots
            .get(key)
            .map(|list| {
                list.values()
                    .filter(|slot| filter(&slot.value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of registered listeners.
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Number of listeners under `key`.
    pub(crate) fn key_len(&self, key: &str) -> usize {
        self.slots.get(key).map(|list| list.len()).unwrap_or(0)
    }

    /// Keys that currently have a listener list.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.slots.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_insert_remove() {
        let table: ListenerTable<u32, &str> = ListenerTable::new(true);
        table.insert("a", 1, "first");
        table.insert("a", 2, "second");
        table.insert("b", 3, "third");

        assert_eq!(table.len(), 3);
        assert_eq!(table.key_len("a"), 2);

        assert!(table.remove(1));
        assert!(!table.remove(1));
        assert_eq!(table.key_len("a"), 1);

        assert!(table.remove(3));
        assert!(!table.keys().contains(&"b".to_string()));
    }

    #[test]
    fn test_table_keeps_empty_lists_without_pruning() {
        let table: ListenerTable<u32, ()> = ListenerTable::new(false);
        table.insert("a", 1, ());
        table.remove(1);
        assert_eq!(table.keys(), vec!["a".to_string()]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_snapshot_order_and_liveness() {
        let table: ListenerTable<u32, u32> = ListenerTable::new(true);
        for i in 0..5 {
            table.insert("k", i, i * 10);
        }

        let snapshot = table.snapshot("k", |v| v % 20 == 0);
        let values: Vec<u32> = snapshot.iter().map(|s| *s.value()).collect();
        assert_eq!(values, vec![0, 20, 40]);

        table.remove(2);
        assert!(snapshot[0].is_active());
        assert!(!snapshot[1].is_active());
        assert!(table.snapshot("missing", |_| true).is_empty());
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let table: ListenerTable<u32, u32> = ListenerTable::new(true);
        for i in 0..100 {
            table.insert("k", i, i);
        }
        for i in (0..100).filter(|i| i % 3 == 0) {
            assert!(table.remove(i));
        }

        let values: Vec<u32> = table.snapshot("k", |_| true).iter().map(|s| *s.value()).collect();
        let expected: Vec<u32> = (0..100).filter(|i| i % 3 != 0).collect();
        assert_eq!(values, expected);
        assert_eq!(table.len(), expected.len());

        table.insert("k", 1000, 1000);
        assert_eq!(table.snapshot("k", |_| true).last().map(|s| *s.value()), Some(1000));
    }
}
