//! Per-owner collection of live registrations.
//!
//! A [`TokenRegistry`] is the explicit companion that binds subscriptions
//! to the lifetime of whoever holds it. Dropping the registry releases every
//! token and watcher it holds, synchronously.

use crate::source::TokenId;
use crate::token::SubscriptionToken;
use crate::watcher::PropertyWatcher;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// One entry of a [`TokenRegistry`].
#[derive(Debug)]
pub enum Registration {
    /// An event listener.
    Event(SubscriptionToken),
    /// A property observer.
    Watch(PropertyWatcher),
}

type Entries = DashMap<TokenId, Registration>;

/// A set of registrations keyed by identity.
///
/// Storage is allocated on first insert; reading an untouched registry
/// reports it empty.
#[derive(Default)]
pub struct TokenRegistry {
    entries: OnceLock<Arc<Entries>>,
}

/// A non-owning reference used by handlers that remove their own entry.
#[derive(Clone)]
pub(crate) struct WeakTokenRegistry {
    entries: Weak<Entries>,
}

impl WeakTokenRegistry {
    /// Remove `id` if the registry is still alive.
    pub(crate) fn remove(&self, id: TokenId) -> bool {
        match self.entries.upgrade() {
            Some(entries) => entries.remove(&id).is_some(),
            None => false,
        }
    }
}

impl TokenRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> &Arc<Entries> {
        self.entries.get_or_init(|| Arc::new(DashMap::new()))
    }

    pub(crate) fn downgrade(&self) -> WeakTokenRegistry {
        WeakTokenRegistry {
            entries: Arc::downgrade(self.entries()),
        }
    }

    /// Store `registration` under `id`.
    pub fn insert(&self, id: TokenId, registration: Registration) {
        // A replaced entry is released here, outside the shard lock.
        let _replaced = self.entries().insert(id, registration);
    }

    /// Store an event token under a fresh id.
    pub fn insert_token(&self, token: SubscriptionToken) -> TokenId {
        let id = TokenId::generate();
        self.insert(id, Registration::Event(token));
        id
    }

    /// Store a property watcher under a fresh id.
    pub fn insert_watcher(&self, watcher: PropertyWatcher) -> TokenId {
        let id = TokenId::generate();
        self.insert(id, Registration::Watch(watcher));
        id
    }

    /// Remove and release one entry. Returns `false` if it was not present.
    pub fn remove(&self, id: TokenId) -> bool {
        match self.entries.get() {
            Some(entries) => entries.remove(&id).is_some(),
            None => false,
        }
    }

    /// Check whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: TokenId) -> bool {
        self.entries
            .get()
            .map(|entries| entries.contains_key(&id))
            .unwrap_or(false)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.get().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Check whether the registry holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every entry, in unspecified order.
    ///
    /// Returns the number of released entries.
    pub fn drain_all(&self) -> usize {
        let Some(entries) = self.entries.get() else {
            return 0;
        };

        let ids: Vec<TokenId> = entries.iter().map(|e| *e.key()).collect();
        let mut released = 0;
        for id in ids {
            // Each entry is dropped after its shard lock is released.
            if entries.remove(&id).is_some() {
                released += 1;
            }
        }
        released
    }
}

impl Drop for TokenRegistry {
    fn drop(&mut self) {
        let released = self.drain_all();
        if released > 0 {
            debug!(released, "Registry torn down");
        }
    }
}

impl fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center::EventCenter;
    use crate::observe::Observations;
    use crate::source::SourceFilter;

    fn token(center: &EventCenter) -> SubscriptionToken {
        center.subscribe_scoped("e", SourceFilter::Any, |_| {})
    }

    #[test]
    fn test_untouched_registry_reads_empty() {
        let registry = TokenRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.remove(TokenId::generate()));
        assert_eq!(registry.drain_all(), 0);
        assert!(registry.entries.get().is_none());
    }

    #[test]
    fn test_registry_insert_remove() {
        let center = EventCenter::new();
        let registry = TokenRegistry::new();

        let a = registry.insert_token(token(&center));
        let b = registry.insert_token(token(&center));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a));

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(registry.contains(b));
        assert_eq!(center.handle_count(), 1);
    }

    #[test]
    fn test_registry_drop_releases_everything() {
        let center = EventCenter::new();
        let target = Observations::new();
        let registry = TokenRegistry::new();

        registry.insert_token(token(&center));
        registry.insert_token(token(&center));
        registry.insert_watcher(PropertyWatcher::new(&target, "score", || {}));
        assert_eq!(center.handle_count(), 2);
        assert_eq!(target.observer_count("score"), 1);

        drop(registry);
        assert_eq!(center.handle_count(), 0);
        assert_eq!(target.observer_count("score"), 0);
    }

    #[test]
    fn test_weak_registry_after_drop() {
        let center = EventCenter::new();
        let registry = TokenRegistry::new();
        let id = registry.insert_token(token(&center));
        let weak = registry.downgrade();

        assert!(weak.remove(id));
        drop(registry);
        assert!(!weak.remove(id));
    }
}
