//! Payload delivered with an event.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Context access errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The event was posted without a context.
    #[error("Event has no context")]
    Missing,

    /// The context holds a value of another type.
    #[error("Event context is not a {expected}")]
    TypeMismatch {
        /// Name of the requested type.
        expected: &'static str,
    },
}

/// Optional, shared, type-erased value passed to every handler of a post.
///
/// Cloning is cheap: all clones share one allocation.
#[derive(Clone, Default)]
pub struct EventContext(Option<Arc<dyn Any + Send + Sync>>);

impl EventContext {
    /// A context carrying nothing.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Wrap a value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// Wrap an already shared value.
    #[must_use]
    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(Some(value))
    }

    /// Check whether the context is empty.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the value as `T`, if present and of that type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Borrow the value as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Missing`] for an empty context and
    /// [`ContextError::TypeMismatch`] when the value is not a `T`.
    pub fn get<T: Any>(&self) -> Result<&T, ContextError> {
        let value = self.0.as_deref().ok_or(ContextError::Missing)?;
        value.downcast_ref::<T>().ok_or(ContextError::TypeMismatch {
            expected: type_name::<T>(),
        })
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("EventContext(Some(..))"),
            None => f.write_str("EventContext(None)"),
        }
    }
}
