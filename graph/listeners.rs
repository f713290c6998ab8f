/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Listener channels of the model graph.
//!
//! Delivery is synchronous and in registration order, inside the writer's
//! critical section: every callback runs before the write guard is dropped.

use std::sync::Arc;

use super::{LinkKey, ModelGraph, Spot, SpotKey};

/// Structural mutation events.
pub trait GraphListener: Send + Sync {
    fn vertex_added(&self, _graph: &ModelGraph, _spot: SpotKey) {}

    /// Fired after the spot left the pool. `removed` is its last state; the
    /// key may be handed out again by a later insertion.
    fn vertex_removed(&self, _graph: &ModelGraph, _spot: SpotKey, _removed: &Spot) {}

    fn edge_added(&self, _graph: &ModelGraph, _link: LinkKey) {}

    fn edge_removed(&self, _graph: &ModelGraph, _link: LinkKey, _source: SpotKey, _target: SpotKey) {
    }

    /// The whole graph was replaced (raw load). Keys seen before are void.
    fn graph_rebuilt(&self, _graph: &ModelGraph) {}
}

/// Coarse "something changed" notification, fired by
/// [`ModelGraph::notify_graph_changed`].
pub trait GraphChangeListener: Send + Sync {
    fn graph_changed(&self);
}

impl<F> GraphChangeListener for F
where
    F: Fn() + Send + Sync,
{
    fn graph_changed(&self) {
        self()
    }
}

/// Per-spot property change (position, label or radius channel).
pub trait VertexPropertyListener: Send + Sync {
    fn property_changed(&self, graph: &ModelGraph, spot: SpotKey);
}

pub(crate) struct ListenerList<T: ?Sized> {
    items: Vec<Arc<T>>,
}

impl<T: ?Sized> Default for ListenerList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: ?Sized> ListenerList<T> {
    pub(crate) fn add(&mut self, listener: Arc<T>) {
        self.items.push(listener);
    }

    /// Removes by pointer identity.
    pub(crate) fn remove(&mut self, listener: &Arc<T>) -> bool {
        let before = self.items.len();
        self.items
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
        self.items.len() != before
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.items.iter()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) graph: ListenerList<dyn GraphListener>,
    pub(crate) change: ListenerList<dyn GraphChangeListener>,
    pub(crate) position: ListenerList<dyn VertexPropertyListener>,
    pub(crate) label: ListenerList<dyn VertexPropertyListener>,
    pub(crate) radius: ListenerList<dyn VertexPropertyListener>,
}
