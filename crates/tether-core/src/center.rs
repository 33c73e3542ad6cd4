//! In-process broadcast center.
//!
//! The center maps an event name to the listeners registered for it and
//! delivers every post synchronously on the posting thread. Each listener
//! carries a [`SourceFilter`], so source-scoped and source-agnostic
//! listeners share one event name.

use crate::config::{CenterConfig, ConfigError, DEFAULT_GLOBAL_SUFFIX};
use crate::context::EventContext;
use crate::metrics;
use crate::registry::TokenRegistry;
use crate::source::{HandleId, Source, SourceFilter, TypeKey};
use crate::table::ListenerTable;
use crate::token::SubscriptionToken;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info, trace, warn};

/// An event identifier. Two events share a channel iff their names are equal.
pub type EventName = String;

type EventCallback = Box<dyn Fn(&EventContext) + Send + Sync>;

/// A registered listener.
struct Listener {
    filter: SourceFilter,
    callback: EventCallback,
}

struct CenterInner {
    /// Listeners indexed by event name.
    listeners: ListenerTable<HandleId, Listener>,
    /// Class-level registries, one per type.
    type_registries: DashMap<TypeKey, Arc<TokenRegistry>>,
    /// Configuration.
    config: CenterConfig,
}

impl Drop for CenterInner {
    fn drop(&mut self) {
        let remaining = self.listeners.len();
        if remaining > 0 {
            metrics::record_listeners_dropped(remaining);
            debug!(listeners = remaining, "Dropping center with live listeners");
        }
    }
}

/// The broadcast center.
///
/// Cloning is cheap and every clone refers to the same center.
#[derive(Clone)]
pub struct EventCenter {
    inner: Arc<CenterInner>,
}

/// A non-owning reference to an [`EventCenter`].
#[derive(Clone)]
pub struct WeakEventCenter {
    inner: Weak<CenterInner>,
}

impl WeakEventCenter {
    /// Get the center back if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventCenter> {
        self.inner.upgrade().map(|inner| EventCenter { inner })
    }
}

impl fmt::Debug for WeakEventCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventCenter")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

static GLOBAL_CENTER: OnceLock<EventCenter> = OnceLock::new();

impl EventCenter {
    /// Create a new center with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CenterConfig::default())
    }

    /// Create a new center with custom configuration.
    ///
    /// An empty global suffix is replaced by the default one.
    #[must_use]
    pub fn with_config(mut config: CenterConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Using default global suffix {:?}", DEFAULT_GLOBAL_SUFFIX);
            config.global_suffix = DEFAULT_GLOBAL_SUFFIX.to_string();
        }
        Self::build(config)
    }

    /// Create a new center, rejecting an invalid configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`CenterConfig::validate`].
    pub fn try_with_config(config: CenterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CenterConfig) -> Self {
        info!("Creating event center with config: {:?}", config);
        Self {
            inner: Arc::new(CenterInner {
                listeners: ListenerTable::new(config.prune_empty_channels),
                type_registries: DashMap::new(),
                config,
            }),
        }
    }

    /// The process-wide default center, created on first use.
    pub fn global() -> &'static EventCenter {
        GLOBAL_CENTER.get_or_init(EventCenter::new)
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &CenterConfig {
        &self.inner.config
    }

    /// Name of the type-global channel for `event`.
    #[must_use]
    pub fn global_event_name(&self, event: &str) -> EventName {
        format!("{}{}", event, self.inner.config.global_suffix)
    }

    /// Get a non-owning reference to this center.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventCenter {
        WeakEventCenter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles refer to the same center.
    #[must_use]
    pub fn ptr_eq(&self, other: &EventCenter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a listener for `event` from sources matching `filter`.
    ///
    /// The listener stays registered until [`unsubscribe`](Self::unsubscribe)
    /// is called with the returned handle.
    pub fn subscribe<F>(&self, event: &str, filter: SourceFilter, callback: F) -> HandleId
    where
        F: Fn(&EventContext) + Send + Sync + 'static,
    {
        let handle = HandleId::generate();
        self.inner.listeners.insert(
            event,
            handle,
            Listener {
                filter,
                callback: Box::new(callback),
            },
        );
        metrics::record_subscribe();

        debug!(
            event = %event,
            handle = %handle,
            filter = ?filter,
            listeners = self.inner.listeners.key_len(event),
            "Subscribed"
        );

        handle
    }

    /// Register a listener and wrap it in a token that unsubscribes on drop.
    #[must_use]
    pub fn subscribe_scoped<F>(
        &self,
        event: &str,
        filter: SourceFilter,
        callback: F,
    ) -> SubscriptionToken
    where
        F: Fn(&EventContext) + Send + Sync + 'static,
    {
        let handle = self.subscribe(event, filter, callback);
        SubscriptionToken::new(self, handle)
    }

    /// Remove a listener.
    ///
    /// Returns `false` if the handle was already removed. A listener removed
    /// while a post is in flight is not invoked by that post if it has not
    /// been reached yet.
    pub fn unsubscribe(&self, handle: HandleId) -> bool {
        let removed = self.inner.listeners.remove(handle);
        if removed {
            metrics::record_unsubscribe();
            debug!(handle = %handle, "Unsubscribed");
        }
        removed
    }

    /// Post `event` from `source`.
    ///
    /// Every matching listener is invoked in registration order on the
    /// calling thread before this returns. Listeners added during the post
    /// do not receive it.
    ///
    /// Returns the number of listeners invoked.
    pub fn post(&self, event: &str, source: Source, context: &EventContext) -> usize {
        let matching = self
            .inner
            .listeners
            .snapshot(event, |listener| listener.filter.matches(&source));

        let mut delivered = 0;
        for slot in &matching {
            if slot.is_active() {
                (slot.value().callback)(context);
                delivered += 1;
            }
        }

        metrics::record_post(delivered);
        trace!(event = %event, source = %source, recipients = delivered, "Posted event");
        delivered
    }

    /// Total number of registered listeners.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Number of listeners registered for `event`, regardless of filter.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.listeners.key_len(event)
    }

    /// Event names that currently have a listener list.
    #[must_use]
    pub fn event_names(&self) -> Vec<EventName> {
        self.inner.listeners.keys()
    }

    /// The class-level registry for `key`, created on first use.
    #[must_use]
    pub fn type_registry(&self, key: TypeKey) -> Arc<TokenRegistry> {
        let entry = self.inner.type_registries.entry(key).or_insert_with(|| {
            debug!(type_key = %key, "Creating type registry");
            Arc::new(TokenRegistry::new())
        });
        Arc::clone(&entry)
    }

    /// Tear down the class-level registry for `key`, releasing its tokens.
    ///
    /// Returns the number of released entries.
    pub fn reset_type(&self, key: TypeKey) -> usize {
        match self.inner.type_registries.remove(&key) {
            Some((_, registry)) => {
                let released = registry.drain_all();
                debug!(type_key = %key, released, "Reset type registry");
                released
            }
            None => 0,
        }
    }

    /// Get center statistics.
    #[must_use]
    pub fn stats(&self) -> CenterStats {
        CenterStats {
            event_count: self.inner.listeners.keys().len(),
            listener_count: self.inner.listeners.len(),
            type_registry_count: self.inner.type_registries.len(),
        }
    }
}

impl Default for EventCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCenter")
            .field("config", &self.inner.config)
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

/// Center statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterStats {
    /// Number of event names with a listener list.
    pub event_count: usize,
    /// Total number of listeners.
    pub listener_count: usize,
    /// Number of class-level registries.
    pub type_registry_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ObjectId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn instance() -> Source {
        Source::Instance(ObjectId::generate())
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&EventContext) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &EventContext| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_center_subscribe_unsubscribe() {
        let center = EventCenter::new();
        let handle = center.subscribe("score", SourceFilter::Any, |_| {});

        assert_eq!(center.handle_count(), 1);
        assert_eq!(center.listener_count("score"), 1);

        assert!(center.unsubscribe(handle));
        assert!(!center.unsubscribe(handle));
        assert_eq!(center.handle_count(), 0);
        // Channel should be pruned
        assert!(center.event_names().is_empty());
    }

    #[test]
    fn test_center_post_filters_by_source() {
        let center = EventCenter::new();
        let a = instance();
        let b = instance();
        let (exact, on_exact) = counter();
        let (any, on_any) = counter();

        center.subscribe("score", SourceFilter::Exact(a), on_exact);
        center.subscribe("score", SourceFilter::Any, on_any);

        assert_eq!(center.post("score", a, &EventContext::none()), 2);
        assert_eq!(center.post("score", b, &EventContext::none()), 1);
        assert_eq!(center.post("other", a, &EventContext::none()), 0);

        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(any.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_center_delivers_in_registration_order() {
        let center = EventCenter::new();
        let source = instance();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let order = Arc::clone(&order);
            center.subscribe("tick", SourceFilter::Exact(source), move |_| {
                order.lock().unwrap().push(i);
            });
        }

        center.post("tick", source, &EventContext::none());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_center_passes_context() {
        let center = EventCenter::new();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        center.subscribe("score", SourceFilter::Any, move |ctx| {
            *s.lock().unwrap() = ctx.downcast_ref::<i32>().copied();
        });

        center.post("score", instance(), &EventContext::new(42_i32));
        assert_eq!(*seen.lock().unwrap(), Some(42));
    }

    #[test]
    fn test_unsubscribe_during_post_skips_pending_listener() {
        let center = EventCenter::new();
        let source = instance();
        let (later, on_later) = counter();

        let victim = Arc::new(Mutex::new(None));
        let v = Arc::clone(&victim);
        let c = center.clone();
        center.subscribe("go", SourceFilter::Any, move |_| {
            if let Some(handle) = v.lock().unwrap().take() {
                c.unsubscribe(handle);
            }
        });
        let handle = center.subscribe("go", SourceFilter::Any, on_later);
        *victim.lock().unwrap() = Some(handle);

        assert_eq!(center.post("go", source, &EventContext::none()), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_during_post_misses_in_flight_event() {
        let center = EventCenter::new();
        let (added, on_added) = counter();
        let on_added = Arc::new(on_added);

        let c = center.clone();
        center.subscribe("go", SourceFilter::Any, move |_| {
            let on_added = Arc::clone(&on_added);
            c.subscribe("go", SourceFilter::Any, move |ctx| on_added(ctx));
        });

        center.post("go", instance(), &EventContext::none());
        assert_eq!(added.load(Ordering::SeqCst), 0);

        center.post("go", instance(), &EventContext::none());
        assert_eq!(added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scoped_subscription_released_on_drop() {
        let center = EventCenter::new();
        let (count, on_post) = counter();

        let token = center.subscribe_scoped("score", SourceFilter::Any, on_post);
        center.post("score", instance(), &EventContext::none());
        drop(token);
        center.post("score", instance(), &EventContext::none());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(center.handle_count(), 0);
    }

    #[test]
    fn test_type_registry_singleton() {
        struct Player;
        let center = EventCenter::new();
        let key = TypeKey::of::<Player>();

        let a = center.type_registry(key);
        let b = center.type_registry(key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(center.stats().type_registry_count, 1);

        assert_eq!(center.reset_type(key), 0);
        assert_eq!(center.stats().type_registry_count, 0);
    }

    #[test]
    fn test_center_stats() {
        let center = EventCenter::new();
        center.subscribe("a", SourceFilter::Any, |_| {});
        center.subscribe("a", SourceFilter::Any, |_| {});
        center.subscribe("b", SourceFilter::Any, |_| {});

        let stats = center.stats();
        assert_eq!(stats.event_count, 2);
        assert_eq!(stats.listener_count, 3);
    }

    #[test]
    fn test_empty_global_suffix() {
        let config = CenterConfig {
            global_suffix: String::new(),
            ..CenterConfig::default()
        };
        assert!(matches!(
            EventCenter::try_with_config(config.clone()),
            Err(ConfigError::EmptyGlobalSuffix)
        ));

        let center = EventCenter::with_config(config);
        assert_eq!(center.config().global_suffix, DEFAULT_GLOBAL_SUFFIX);
        assert_ne!(center.global_event_name("score"), "score");
    }

    #[test]
    fn test_global_event_name() {
        let center = EventCenter::new();
        assert_eq!(center.global_event_name("score"), "score-GlobalEvent");
        assert!(EventCenter::global().ptr_eq(EventCenter::global()));
    }
}
