//! Lifetime-bound property observers.

use crate::observe::{Observations, WeakObservations};
use crate::source::ObservationId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Binds a callback to writes of one property on one target.
///
/// The watcher holds its target weakly and stops observing when dropped.
pub struct PropertyWatcher {
    target: WeakObservations,
    property: String,
    observation: ObservationId,
    released: AtomicBool,
}

impl PropertyWatcher {
    /// Start observing `property` on `target`.
    #[must_use]
    pub fn new<F>(target: &Observations, property: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let property = property.into();
        let observation = target.observe(&property, callback);
        Self {
            target: target.downgrade(),
            property,
            observation,
            released: AtomicBool::new(false),
        }
    }

    /// Get the watched property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Get the underlying observation handle.
    #[must_use]
    pub fn observation(&self) -> ObservationId {
        self.observation
    }

    /// Check whether the observation has been removed.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Stop observing. Only the first call does anything.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.target.upgrade() {
            Some(target) => target.stop_observing(self.observation),
            None => {
                debug!(property = %self.property, "Watched target already gone");
                false
            }
        }
    }
}

impl Drop for PropertyWatcher {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PropertyWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyWatcher")
            .field("property", &self.property)
            .field("observation", &self.observation)
            .field("released", &self.is_released())
            .finish()
    }
}
