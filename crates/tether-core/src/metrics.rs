//! Dispatch instrumentation.
//!
//! Uses the `metrics` facade; nothing is recorded until the host
//! application installs a recorder.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const POSTS_TOTAL: &str = "tether_posts_total";
    pub const DELIVERIES_TOTAL: &str = "tether_deliveries_total";
    pub const SUBSCRIPTIONS_TOTAL: &str = "tether_subscriptions_total";
    pub const LISTENERS_ACTIVE: &str = "tether_listeners_active";
    pub const OBSERVERS_ACTIVE: &str = "tether_observers_active";
}

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    metrics::describe_counter!(names::POSTS_TOTAL, "Total number of event posts");
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Total number of handler invocations caused by posts"
    );
    metrics::describe_counter!(
        names::SUBSCRIPTIONS_TOTAL,
        "Total number of listeners ever registered"
    );
    metrics::describe_gauge!(
        names::LISTENERS_ACTIVE,
        "Current number of registered event listeners"
    );
    metrics::describe_gauge!(
        names::OBSERVERS_ACTIVE,
        "Current number of registered property observers"
    );
}

pub(crate) fn record_post(delivered: usize) {
    counter!(names::POSTS_TOTAL).increment(1);
    counter!(names::DELIVERIES_TOTAL).increment(delivered as u64);
}

pub(crate) fn record_subscribe() {
    counter!(names::SUBSCRIPTIONS_TOTAL).increment(1);
    gauge!(names::LISTENERS_ACTIVE).increment(1.0);
}

pub(crate) fn record_unsubscribe() {
    gauge!(names::LISTENERS_ACTIVE).decrement(1.0);
}

/// Listeners still registered when their center is dropped.
pub(crate) fn record_listeners_dropped(count: usize) {
    gauge!(names::LISTENERS_ACTIVE).decrement(count as f64);
}

pub(crate) fn record_observe() {
    gauge!(names::OBSERVERS_ACTIVE).increment(1.0);
}

pub(crate) fn record_stop_observing() {
    gauge!(names::OBSERVERS_ACTIVE).decrement(1.0);
}

/// Observers still registered when their target is dropped.
pub(crate) fn record_observers_dropped(count: usize) {
    gauge!(names::OBSERVERS_ACTIVE).decrement(count as f64);
}
