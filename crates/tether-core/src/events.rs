//! Object-scoped event handling.
//!
//! An owner holds an [`Events`] companion and implements [`EventHandling`]
//! to get the `on` / `when` / `when_any` / `on_change_of` / `trigger_event`
//! operations. Every subscription is stored in the *subscriber's* registry,
//! so dropping the subscriber releases all of them, whoever the publisher is.
//!
//! ## Scopes
//!
//! | Operation           | Listens to                                   |
//! |---------------------|----------------------------------------------|
//! | `on`                | the owner's own posts                        |
//! | `when(object, ..)`  | posts by `object`                            |
//! | `when_type::<T>`    | posts by the type `T` itself                 |
//! | `when_any::<T>`     | posts by any instance of `T`                 |
//!
//! An instance post is followed by a re-post from its type under the
//! type-global name, which is what `when_any` listens to.

use crate::center::EventCenter;
use crate::context::EventContext;
use crate::observe::{Observable, Observations};
use crate::registry::{Registration, TokenRegistry};
use crate::source::{ObjectId, Source, SourceFilter, TokenId, TypeKey};
use crate::token::SubscriptionToken;
use crate::watcher::PropertyWatcher;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Register `handler` with `center` and store its token in `registry`.
///
/// A once-handler runs at most one time and removes its own token right
/// after returning.
fn subscribe_into<F>(
    center: &EventCenter,
    registry: &TokenRegistry,
    event: &str,
    filter: SourceFilter,
    once: bool,
    handler: F,
) -> TokenId
where
    F: Fn(&EventContext) + Send + Sync + 'static,
{
    let token_id = TokenId::generate();

    if !once {
        let handle = center.subscribe(event, filter, handler);
        registry.insert(
            token_id,
            Registration::Event(SubscriptionToken::new(center, handle)),
        );
        return token_id;
    }

    let fired = Arc::new(AtomicBool::new(false));
    let handle = {
        let fired = Arc::clone(&fired);
        let owner = registry.downgrade();
        center.subscribe(event, filter, move |ctx| {
            if fired.swap(true, Ordering::AcqRel) {
                return;
            }
            handler(ctx);
            owner.remove(token_id);
        })
    };
    registry.insert(
        token_id,
        Registration::Event(SubscriptionToken::new(center, handle)),
    );

    // Fired on another thread before the token was stored.
    if fired.load(Ordering::Acquire) {
        registry.remove(token_id);
    }
    token_id
}

/// Event companion of one object.
///
/// Dropping it releases every subscription the object made.
pub struct Events {
    id: ObjectId,
    type_key: TypeKey,
    center: EventCenter,
    registry: TokenRegistry,
}

impl Events {
    /// Create a companion for an object of type `T` on the global center.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::with_center::<T>(EventCenter::global())
    }

    /// Create a companion for an object of type `T` on `center`.
    #[must_use]
    pub fn with_center<T: ?Sized + 'static>(center: &EventCenter) -> Self {
        Self {
            id: ObjectId::generate(),
            type_key: TypeKey::of::<T>(),
            center: center.clone(),
            registry: TokenRegistry::new(),
        }
    }

    /// Get the object identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Get the owner's type.
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// The source used for this object's posts.
    #[must_use]
    pub fn source(&self) -> Source {
        Source::Instance(self.id)
    }

    /// Get the center this object posts to.
    #[must_use]
    pub fn center(&self) -> &EventCenter {
        &self.center
    }

    /// Get the registry holding this object's subscriptions.
    #[must_use]
    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Listen for `event` from sources matching `filter`.
    pub fn subscribe<F>(&self, event: &str, filter: SourceFilter, once: bool, handler: F) -> TokenId
    where
        F: Fn(&EventContext) + Send + Sync + 'static,
    {
        subscribe_into(&self.center, &self.registry, event, filter, once, handler)
    }

    /// Watch writes to `property` on `target`.
    pub fn watch<F>(&self, target: &Observations, property: &str, handler: F) -> TokenId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.registry
            .insert_watcher(PropertyWatcher::new(target, property, handler))
    }

    /// Post `event` from this object, then from its type on the type-global
    /// channel.
    ///
    /// Returns the total number of handlers invoked by both posts.
    pub fn trigger(&self, event: &str, context: &EventContext) -> usize {
        let delivered = self.center.post(event, self.source(), context);
        let global = self.center.global_event_name(event);
        delivered + self.center.post(&global, Source::Type(self.type_key), context)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("id", &self.id)
            .field("type_key", &self.type_key)
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

/// Class-level events of one type.
///
/// Subscriptions live in the center's registry for the type until
/// [`reset`](Self::reset) or until the center is dropped.
#[derive(Debug, Clone)]
pub struct TypeEvents {
    key: TypeKey,
    center: EventCenter,
}

impl TypeEvents {
    /// Class-level events of `T` on `center`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>(center: &EventCenter) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            center: center.clone(),
        }
    }

    /// Class-level events of `T` on the global center.
    #[must_use]
    pub fn global<T: ?Sized + 'static>() -> Self {
        Self::of::<T>(EventCenter::global())
    }

    /// Get the type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// The source used for class-level posts.
    #[must_use]
    pub fn source(&self) -> Source {
        Source::Type(self.key)
    }

    /// Get the type's registry.
    #[must_use]
    pub fn registry(&self) -> Arc<TokenRegistry> {
        self.center.type_registry(self.key)
    }

    /// Listen for `event` posted by the type.
    pub fn on(&self, event: &str, handler: impl Fn(&EventContext) + Send + Sync + 'static) {
        self.on_with(event, handler, false);
    }

    /// Listen for the next `event` posted by the type.
    pub fn on_once(&self, event: &str, handler: impl Fn(&EventContext) + Send + Sync + 'static) {
        self.on_with(event, handler, true);
    }

    /// Listen for `event` posted by the type, once or repeatedly.
    pub fn on_with(
        &self,
        event: &str,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
        once: bool,
    ) {
        let registry = self.registry();
        subscribe_into(
            &self.center,
            &registry,
            event,
            SourceFilter::Exact(self.source()),
            once,
            handler,
        );
    }

    /// Listen for each of `events` posted by the type.
    pub fn on_any_of<I>(&self, events: I, handler: impl Fn(&EventContext) + Send + Sync + 'static)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handler = Arc::new(handler);
        for event in events {
            let handler = Arc::clone(&handler);
            self.on(event.as_ref(), move |ctx| handler(ctx));
        }
    }

    /// Post `event` from the type without context.
    pub fn trigger_event(&self, event: &str) -> usize {
        self.trigger(event, &EventContext::none())
    }

    /// Post `event` from the type with `context`.
    pub fn trigger_event_with<C: Any + Send + Sync>(&self, event: &str, context: C) -> usize {
        self.trigger(event, &EventContext::new(context))
    }

    /// Post `event` from the type.
    pub fn trigger(&self, event: &str, context: &EventContext) -> usize {
        self.center.post(event, self.source(), context)
    }

    /// Release every class-level subscription of the type.
    pub fn reset(&self) -> usize {
        self.center.reset_type(self.key)
    }
}

/// Event operations for any object that owns an [`Events`] companion.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use tether_core::{EventCenter, EventHandling, Events};
///
/// struct Player {
///     events: Events,
/// }
///
/// impl EventHandling for Player {
///     fn events(&self) -> &Events {
///         &self.events
///     }
/// }
///
/// let center = EventCenter::new();
/// let player = Player { events: Events::with_center::<Player>(&center) };
/// let last = Arc::new(AtomicI32::new(0));
///
/// let seen = Arc::clone(&last);
/// player.on("score", move |ctx| {
///     seen.store(*ctx.downcast_ref::<i32>().unwrap(), Ordering::SeqCst);
/// });
/// player.trigger_event_with("score", 42);
/// assert_eq!(last.load(Ordering::SeqCst), 42);
///
/// drop(player);
/// assert_eq!(center.handle_count(), 0);
/// ```
pub trait EventHandling {
    /// The object's event companion.
    fn events(&self) -> &Events;

    /// Run `handler` every time this object posts `event`.
    fn on(&self, event: &str, handler: impl Fn(&EventContext) + Send + Sync + 'static) {
        self.on_with(event, handler, false);
    }

    /// Run `handler` the next time this object posts `event`.
    fn on_once(&self, event: &str, handler: impl Fn(&EventContext) + Send + Sync + 'static) {
        self.on_with(event, handler, true);
    }

    /// Run `handler` when this object posts `event`, once or repeatedly.
    fn on_with(
        &self,
        event: &str,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
        once: bool,
    ) {
        let events = self.events();
        events.subscribe(event, SourceFilter::Exact(events.source()), once, handler);
    }

    /// Run `handler` whenever this object posts any of `events`.
    ///
    /// Each event is an independent subscription.
    fn on_any_of<I>(&self, events: I, handler: impl Fn(&EventContext) + Send + Sync + 'static)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handler = Arc::new(handler);
        for event in events {
            let handler = Arc::clone(&handler);
            self.on(event.as_ref(), move |ctx| handler(ctx));
        }
    }

    /// Run `handler` whenever `object` posts `event`.
    ///
    /// The subscription belongs to `self`, not to `object`.
    fn when<O>(
        &self,
        object: &O,
        event: &str,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
    ) where
        O: EventHandling + ?Sized,
    {
        let source = object.events().source();
        self.events()
            .subscribe(event, SourceFilter::Exact(source), false, handler);
    }

    /// Run `handler` whenever `object` posts any of `events`.
    fn when_any_of<O, I>(
        &self,
        object: &O,
        events: I,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
    ) where
        O: EventHandling + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handler = Arc::new(handler);
        for event in events {
            let handler = Arc::clone(&handler);
            self.when(object, event.as_ref(), move |ctx| handler(ctx));
        }
    }

    /// Run `handler` whenever the type `T` itself posts `event`.
    fn when_type<T: ?Sized + 'static>(
        &self,
        event: &str,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
    ) {
        let source = Source::Type(TypeKey::of::<T>());
        self.events()
            .subscribe(event, SourceFilter::Exact(source), false, handler);
    }

    /// Run `handler` whenever the type `T` itself posts any of `events`.
    fn when_type_any_of<T: ?Sized + 'static, I>(
        &self,
        events: I,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
    ) where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handler = Arc::new(handler);
        for event in events {
            let handler = Arc::clone(&handler);
            self.when_type::<T>(event.as_ref(), move |ctx| handler(ctx));
        }
    }

    /// Run `handler` whenever any instance of `T` posts `event`.
    fn when_any<T: ?Sized + 'static>(
        &self,
        event: &str,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
    ) {
        let global = self.events().center().global_event_name(event);
        self.when_type::<T>(&global, handler);
    }

    /// Run `handler` whenever any instance of `T` posts any of `events`.
    fn when_any_of_type<T: ?Sized + 'static, I>(
        &self,
        events: I,
        handler: impl Fn(&EventContext) + Send + Sync + 'static,
    ) where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handler = Arc::new(handler);
        for event in events {
            let handler = Arc::clone(&handler);
            self.when_any::<T>(event.as_ref(), move |ctx| handler(ctx));
        }
    }

    /// Run `handler` on every write to `property` of `target`.
    ///
    /// The watcher belongs to `self`; `target` may outlive it.
    fn on_change_of<O>(&self, target: &O, property: &str, handler: impl Fn() + Send + Sync + 'static)
    where
        O: Observable + ?Sized,
    {
        self.events()
            .watch(target.observations(), property, handler);
    }

    /// Run `handler` on every write to any of `properties` of `target`.
    fn on_change_of_any<O, I>(
        &self,
        target: &O,
        properties: I,
        handler: impl Fn() + Send + Sync + 'static,
    ) where
        O: Observable + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handler = Arc::new(handler);
        for property in properties {
            let handler = Arc::clone(&handler);
            self.on_change_of(target, property.as_ref(), move || handler());
        }
    }

    /// Post `event` from this object without context.
    fn trigger_event(&self, event: &str) {
        self.events().trigger(event, &EventContext::none());
    }

    /// Post `event` from this object with `context`.
    fn trigger_event_with<C: Any + Send + Sync>(&self, event: &str, context: C) {
        self.events().trigger(event, &EventContext::new(context));
    }

    /// Post `event` from this object with an existing context.
    fn trigger_event_context(&self, event: &str, context: &EventContext) {
        self.events().trigger(event, context);
    }
}

/// Class-level event operations on the global center.
///
/// Needs no companion, so a type that only publishes class-level events
/// opts in with an empty `impl`.
pub trait TypeEventHandling: Sized + 'static {
    /// Run `handler` every time `Self` posts `event` on the global center.
    fn type_on(event: &str, handler: impl Fn(&EventContext) + Send + Sync + 'static) {
        TypeEvents::global::<Self>().on(event, handler);
    }

    /// Run `handler` the next time `Self` posts `event` on the global center.
    fn type_on_once(event: &str, handler: impl Fn(&EventContext) + Send + Sync + 'static) {
        TypeEvents::global::<Self>().on_once(event, handler);
    }

    /// Post `event` from `Self` on the global center.
    fn type_trigger_event(event: &str) {
        TypeEvents::global::<Self>().trigger_event(event);
    }

    /// Post `event` from `Self` on the global center with `context`.
    fn type_trigger_event_with<C: Any + Send + Sync>(event: &str, context: C) {
        TypeEvents::global::<Self>().trigger_event_with(event, context);
    }
}

impl EventHandling for Events {
    fn events(&self) -> &Events {
        self
    }
}
