//! # tether-core
//!
//! Object-scoped events and property observation whose subscriptions are
//! released automatically when the subscribing object goes away.
//!
//! This crate provides:
//!
//! - **EventCenter** - Synchronous in-process broadcast keyed by event name and source
//! - **Observations** - Per-object property observation that fires on every write
//! - **SubscriptionToken / PropertyWatcher** - RAII handles for one registration
//! - **TokenRegistry** - Per-owner set of handles, released on drop
//! - **Events / EventHandling** - The `on` / `when` / `when_any` / `trigger_event` facade
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  on/when   ┌──────────────┐  owns   ┌────────────────────┐
//! │  Subscriber │──────────▶│ TokenRegistry │───────▶│ SubscriptionToken  │
//! └─────────────┘            └──────────────┘         └─────────┬──────────┘
//!                                                               │ handle
//! ┌─────────────┐  trigger   ┌──────────────┐                   ▼
//! │  Publisher  │──────────▶│ EventCenter  │◀────────── listener callbacks
//! └─────────────┘            └──────────────┘
//! ```

pub mod center;
pub mod config;
pub mod context;
pub mod events;
pub mod metrics;
pub mod observe;
pub mod registry;
pub mod source;
mod table;
pub mod token;
pub mod watcher;

pub use center::{CenterStats, EventCenter, EventName, WeakEventCenter};
pub use config::{CenterConfig, ConfigError};
pub use context::{ContextError, EventContext};
pub use events::{EventHandling, Events, TypeEventHandling, TypeEvents};
pub use observe::{Observable, Observations, Property, WeakObservations};
pub use registry::{Registration, TokenRegistry};
pub use source::{HandleId, ObjectId, ObservationId, Source, SourceFilter, TokenId, TypeKey};
pub use token::SubscriptionToken;
pub use watcher::PropertyWatcher;
