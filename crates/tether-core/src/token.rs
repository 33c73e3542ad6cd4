//! RAII handle for one listener registration.

use crate::center::{EventCenter, WeakEventCenter};
use crate::source::HandleId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Owns one listener registration and releases it on drop.
///
/// The center is referenced weakly: a token outliving its center releases
/// nothing.
pub struct SubscriptionToken {
    center: WeakEventCenter,
    handle: HandleId,
    released: AtomicBool,
}

impl SubscriptionToken {
    /// Take ownership of `handle` registered with `center`.
    #[must_use]
    pub fn new(center: &EventCenter, handle: HandleId) -> Self {
        Self {
            center: center.downgrade(),
            handle,
            released: AtomicBool::new(false),
        }
    }

    /// Get the underlying listener handle.
    #[must_use]
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Check whether the registration has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the registration.
    ///
    /// Only the first call does anything; it returns `true` if the listener
    /// was still registered.
    pub fn dispose(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.center.upgrade() {
            Some(center) => center.unsubscribe(self.handle),
            None => {
                trace!(handle = %self.handle, "Center gone, nothing to release");
                false
            }
        }
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("handle", &self.handle)
            .field("released", &self.is_released())
            .finish()
    }
}
