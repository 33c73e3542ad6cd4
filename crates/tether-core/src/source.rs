//! Publisher and subscription identities.
//!
//! Every post carries a [`Source`]: either one object instance or a type
//! acting as its own publisher. Listeners match sources through a
//! [`SourceFilter`].

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter shared by every id kind, so ids never collide across kinds.
static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Allocate a fresh, process-unique id.
            #[must_use]
            pub fn generate() -> Self {
                Self(next_id())
            }

            /// Get the raw id value.
            #[must_use]
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identity of an object instance that owns an [`Events`](crate::Events) companion.
    ObjectId,
    "obj"
);
define_id!(
    /// Handle of one listener registered with an [`EventCenter`](crate::EventCenter).
    HandleId,
    "handle"
);
define_id!(
    /// Handle of one property observer registered with [`Observations`](crate::Observations).
    ObservationId,
    "observation"
);
define_id!(
    /// Key of one entry in a [`TokenRegistry`](crate::TokenRegistry).
    TokenId,
    "token"
);

/// Stable identifier for a Rust type.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for logs.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Get the key for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Get the type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The publisher of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A single object instance.
    Instance(ObjectId),
    /// A type posting as itself (class-level events).
    Type(TypeKey),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Instance(id) => write!(f, "{id}"),
            Source::Type(key) => write!(f, "type:{key}"),
        }
    }
}

/// Which publishers a listener accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    /// Only posts from this exact source.
    Exact(Source),
    /// Posts from any source.
    Any,
}

impl SourceFilter {
    /// Check whether a post from `source` passes this filter.
    #[must_use]
    pub fn matches(&self, source: &Source) -> bool {
        match self {
            SourceFilter::Exact(expected) => expected == source,
            SourceFilter::Any => true,
        }
    }
}

impl From<Source> for SourceFilter {
    fn from(source: Source) -> Self {
        SourceFilter::Exact(source)
    }
}
