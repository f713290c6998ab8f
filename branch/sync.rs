/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! On-demand synchronization of the branch graph with the model graph.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::trace;
use parking_lot::RwLock;

use super::ModelBranchGraph;
use crate::graph::{GraphChangeListener, ModelGraph};

/// Flag flipped to stale by graph change notifications.
#[derive(Debug)]
struct SyncState {
    uptodate: AtomicBool,
}

impl GraphChangeListener for SyncState {
    fn graph_changed(&self) {
        self.uptodate.store(false, Ordering::Release);
    }
}

/// Keeps a [`ModelBranchGraph`] in step with its model graph, rebuilding
/// only when the graph changed since the last [`sync`](Self::sync).
///
/// `sync` takes the model graph's read lock. Calling it from a thread that
/// holds the write lock deadlocks.
pub struct BranchGraphSynchronizer {
    graph: Arc<RwLock<ModelGraph>>,
    branch_graph: Arc<RwLock<ModelBranchGraph>>,
    state: Arc<SyncState>,
}

impl BranchGraphSynchronizer {
    /// Registers a change listener on `graph`, so this takes the graph's
    /// write lock once.
    pub fn new(graph: Arc<RwLock<ModelGraph>>, branch_graph: Arc<RwLock<ModelBranchGraph>>) -> Self {
        let state = Arc::new(SyncState {
            uptodate: AtomicBool::new(true),
        });
        {
            let mut g = graph.write();
            if g.spot_count() > 0 {
                state.uptodate.store(false, Ordering::Release);
            }
            g.add_graph_change_listener(state.clone());
        }
        Self {
            graph,
            branch_graph,
            state,
        }
    }

    pub fn is_uptodate(&self) -> bool {
        self.state.uptodate.load(Ordering::Acquire)
    }

    /// Rebuild the branch graph if the model graph changed.
    pub fn sync(&self) {
        if self.is_uptodate() {
            return;
        }
        let graph = self.graph.read();
        let mut branch_graph = self.branch_graph.write();
        // Another thread may have synced while we waited.
        if self.is_uptodate() {
            return;
        }
        trace!("synchronizing branch graph");
        branch_graph.rebuild(&graph);
        self.state.uptodate.store(true, Ordering::Release);
    }
}
