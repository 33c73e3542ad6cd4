//! Shared fixtures for the tether benchmarks.

use tether_core::{EventCenter, EventHandling, Events, Observable, Observations, Property};

/// A minimal publisher/subscriber used by the benchmarks.
pub struct Node {
    events: Events,
    observations: Observations,
    pub value: Property<u64>,
}

impl Node {
    /// Create a node bound to `center`.
    #[must_use]
    pub fn new(center: &EventCenter) -> Self {
        let observations = Observations::new();
        Self {
            events: Events::with_center::<Node>(center),
            value: Property::new(&observations, "value", 0),
            observations,
        }
    }
}

impl EventHandling for Node {
    fn events(&self) -> &Events {
        &self.events
    }
}

impl Observable for Node {
    fn observations(&self) -> &Observations {
        &self.observations
    }
}

/// Build `count` nodes that each listen to `publisher`'s `tick` event.
#[must_use]
pub fn subscribers(center: &EventCenter, publisher: &Node, count: usize) -> Vec<Node> {
    (0..count)
        .map(|_| {
            let node = Node::new(center);
            node.when(publisher, "tick", |_| {});
            node
        })
        .collect()
}
