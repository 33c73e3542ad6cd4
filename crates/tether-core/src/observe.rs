//! Property observation.
//!
//! A watchable object owns an [`Observations`] table and reports every write
//! to a named property through [`Observations::did_set`]. Observers fire on
//! each write, including writes of an equal value.

use crate::metrics;
use crate::source::ObservationId;
use crate::table::ListenerTable;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, trace};

type ObserverCallback = Box<dyn Fn() + Send + Sync>;

struct ObservationsInner {
    observers: ListenerTable<ObservationId, ObserverCallback>,
}

impl Drop for ObservationsInner {
    fn drop(&mut self) {
        let remaining = self.observers.len();
        if remaining > 0 {
            metrics::record_observers_dropped(remaining);
            debug!(observers = remaining, "Dropping observed target with live observers");
        }
    }
}

/// Observation table of one target object.
///
/// Cloning is cheap and every clone refers to the same table.
#[derive(Clone)]
pub struct Observations {
    inner: Arc<ObservationsInner>,
}

/// A non-owning reference to an [`Observations`] table.
#[derive(Clone)]
pub struct WeakObservations {
    inner: Weak<ObservationsInner>,
}

impl WeakObservations {
    /// Get the table back if its target is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Observations> {
        self.inner.upgrade().map(|inner| Observations { inner })
    }
}

impl fmt::Debug for WeakObservations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObservations")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Observations {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObservationsInner {
                observers: ListenerTable::new(true),
            }),
        }
    }

    /// Run `callback` on every write to `property`.
    pub fn observe<F>(&self, property: &str, callback: F) -> ObservationId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ObservationId::generate();
        self.inner
            .observers
            .insert(property, id, Box::new(callback));
        metrics::record_observe();
        debug!(property = %property, observation = %id, "Observing property");
        id
    }

    /// Remove an observer. Returns `false` if it was already removed.
    pub fn stop_observing(&self, id: ObservationId) -> bool {
        let removed = self.inner.observers.remove(id);
        if removed {
            metrics::record_stop_observing();
            debug!(observation = %id, "Stopped observing");
        }
        removed
    }

    /// Report a write to `property`.
    ///
    /// Returns the number of observers invoked.
    pub fn did_set(&self, property: &str) -> usize {
        let observers = self.inner.observers.snapshot(property, |_| true);
        let mut notified = 0;
        for slot in &observers {
            if slot.is_active() {
                (slot.value())();
                notified += 1;
            }
        }
        trace!(property = %property, observers = notified, "Property set");
        notified
    }

    /// Number of observers of `property`.
    #[must_use]
    pub fn observer_count(&self, property: &str) -> usize {
        self.inner.observers.key_len(property)
    }

    /// Total number of observers.
    #[must_use]
    pub fn total_observers(&self) -> usize {
        self.inner.observers.len()
    }

    /// Properties that currently have observers.
    #[must_use]
    pub fn properties(&self) -> Vec<String> {
        self.inner.observers.keys()
    }

    /// Get a non-owning reference to this table.
    #[must_use]
    pub fn downgrade(&self) -> WeakObservations {
        WeakObservations {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Observations {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Observations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observations")
            .field("observers", &self.total_observers())
            .finish()
    }
}

/// An object whose properties can be watched.
pub trait Observable {
    /// The object's observation table.
    fn observations(&self) -> &Observations;
}

impl Observable for Observations {
    fn observations(&self) -> &Observations {
        self
    }
}

/// A named value that reports every write to an observation table.
pub struct Property<T> {
    name: String,
    value: RwLock<T>,
    observations: Observations,
}

impl<T> Property<T> {
    /// Create a property named `name` reporting to `observations`.
    #[must_use]
    pub fn new(observations: &Observations, name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: RwLock::new(value),
            observations: observations.clone(),
        }
    }

    /// Get the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the value through a closure.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    /// Write a value and notify observers, even if it equals the old one.
    pub fn set(&self, value: T) {
        drop(self.replace(value));
    }

    /// Write a value, notify observers, and return the previous value.
    pub fn replace(&self, value: T) -> T {
        let old = {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, value)
        };
        self.observations.did_set(&self.name);
        old
    }

    /// Modify the value in place and notify observers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard);
        }
        self.observations.did_set(&self.name);
    }
}

impl<T: Clone> Property<T> {
    /// Get a clone of the value.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|value| {
            f.debug_struct("Property")
                .field("name", &self.name)
                .field("value", value)
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_observe_and_stop() {
        let observations = Observations::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);

        let id = observations.observe("score", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(observations.did_set("score"), 1);
        assert_eq!(observations.did_set("name"), 0);

        assert!(observations.stop_observing(id));
        assert!(!observations.stop_observing(id));
        assert_eq!(observations.did_set("score"), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(observations.properties().is_empty());
    }

    #[test]
    fn test_property_fires_on_equal_writes() {
        let observations = Observations::new();
        let score = Property::new(&observations, "score", 0);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        observations.observe("score", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        score.set(5);
        score.set(5);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(score.get(), 5);
    }

    #[test]
    fn test_property_value_visible_to_observer() {
        let observations = Observations::new();
        let score = Arc::new(Property::new(&observations, "score", 1));
        let seen = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&seen);
        let p = Arc::downgrade(&score);
        observations.observe("score", move || {
            if let Some(p) = p.upgrade() {
                s.store(p.get(), Ordering::SeqCst);
            }
        });

        assert_eq!(score.replace(7), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 7);

        score.update(|v| *v += 1);
        assert_eq!(seen.load(Ordering::SeqCst), 8);
        assert_eq!(score.name(), "score");
    }

    #[test]
    fn test_weak_observations() {
        let observations = Observations::new();
        let weak = observations.downgrade();
        assert!(weak.upgrade().is_some());
        drop(observations);
        assert!(weak.upgrade().is_none());
    }
}
