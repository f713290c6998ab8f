/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Branch graph: the model graph with every maximal chain of singly linked
//! spots collapsed into one branch spot.
//!
//! The branch graph is derived data. It has no public mutator; the only
//! writer is [`BranchGraphSynchronizer::sync`], which rebuilds it from the
//! model graph.

use std::collections::{HashMap, HashSet};

use log::debug;
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};

use crate::graph::{LinkKey, ModelGraph, SpotKey};
use crate::spatial::{SpatialIndex, SpatioTemporalIndex};

mod sync;

pub use sync::BranchGraphSynchronizer;

pub type BranchSpotKey = NodeIndex;
pub type BranchLinkKey = EdgeIndex;

/// A maximal run of spots linked one-to-one. Timepoint, position and label
/// are those of the last spot of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSpot {
    pub first: SpotKey,
    pub last: SpotKey,
    pub spot_count: usize,
    pub first_timepoint: i32,
    pub timepoint: i32,
    pub position: [f64; 3],
    pub label: String,
}

/// Link from the last spot of one branch to the first spot of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchLink {
    pub link: LinkKey,
}

/// Where a model link ended up in the branch graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchElement {
    /// The link joins two spots inside this branch.
    Spot(BranchSpotKey),
    /// The link is represented by this branch link.
    Link(BranchLinkKey),
}

#[derive(Default)]
pub struct ModelBranchGraph {
    graph: Graph<BranchSpot, BranchLink>,
    spot_to_branch: HashMap<SpotKey, BranchSpotKey>,
    link_to_branch: HashMap<LinkKey, BranchElement>,
    index: SpatioTemporalIndex<BranchSpotKey>,
    rebuild_count: u64,
}

impl ModelBranchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch_of_spot(&self, spot: SpotKey) -> Option<BranchSpotKey> {
        self.spot_to_branch.get(&spot).copied()
    }

    pub fn branch_element_of_link(&self, link: LinkKey) -> Option<BranchElement> {
        self.link_to_branch.get(&link).copied()
    }

    pub fn branch_spot(&self, key: BranchSpotKey) -> Option<&BranchSpot> {
        self.graph.node_weight(key)
    }

    pub fn branch_link(&self, key: BranchLinkKey) -> Option<&BranchLink> {
        self.graph.edge_weight(key)
    }

    pub fn branch_link_endpoints(&self, key: BranchLinkKey) -> Option<(BranchSpotKey, BranchSpotKey)> {
        self.graph.edge_endpoints(key)
    }

    pub fn successors(&self, branch: BranchSpotKey) -> impl Iterator<Item = BranchSpotKey> + '_ {
        self.graph.neighbors_directed(branch, Direction::Outgoing)
    }

    pub fn predecessors(&self, branch: BranchSpotKey) -> impl Iterator<Item = BranchSpotKey> + '_ {
        self.graph.neighbors_directed(branch, Direction::Incoming)
    }

    pub fn branch_spots(&self) -> impl Iterator<Item = BranchSpotKey> + '_ {
        self.graph.node_indices()
    }

    pub fn branch_links(&self) -> impl Iterator<Item = BranchLinkKey> + '_ {
        self.graph.edge_indices()
    }

    pub fn branch_spot_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn branch_link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Spots of `branch` from first to last. `graph` must be the model the
    /// branch graph was last synchronized with.
    pub fn spots_of(&self, graph: &ModelGraph, branch: BranchSpotKey) -> Vec<SpotKey> {
        let Some(b) = self.graph.node_weight(branch) else {
            return Vec::new();
        };
        let mut spots = Vec::with_capacity(b.spot_count);
        let mut current = b.first;
        spots.push(current);
        while current != b.last && spots.len() < b.spot_count {
            let Some((_, next)) = graph
                .outgoing(current)
                .first()
                .and_then(|&l| graph.link_endpoints(l))
            else {
                break;
            };
            spots.push(next);
            current = next;
        }
        spots
    }

    pub fn spatio_temporal_index(&self) -> &SpatioTemporalIndex<BranchSpotKey> {
        &self.index
    }

    pub fn spatial_index(&self, timepoint: i32) -> Option<&SpatialIndex<BranchSpotKey>> {
        self.index.spatial_index(timepoint)
    }

    /// How many times the branch graph has been derived.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Re-derive from `graph`.
    pub(crate) fn rebuild(&mut self, graph: &ModelGraph) {
        self.graph.clear();
        self.spot_to_branch.clear();
        self.link_to_branch.clear();
        self.index.clear();

        let spots: Vec<SpotKey> = graph.spots().collect();
        let mut visited: HashSet<SpotKey> = HashSet::with_capacity(spots.len());

        for &spot in &spots {
            if !visited.contains(&spot) && starts_branch(graph, spot) {
                self.add_branch(graph, spot, &mut visited);
            }
        }
        // Whatever is left belongs to pure cycles.
        for &spot in &spots {
            if !visited.contains(&spot) {
                self.add_branch(graph, spot, &mut visited);
            }
        }

        let ends: Vec<(BranchSpotKey, SpotKey)> = self
            .graph
            .node_indices()
            .map(|b| (b, self.graph[b].last))
            .collect();
        for (branch, last) in ends {
            for &link in graph.outgoing(last) {
                if self.link_to_branch.contains_key(&link) {
                    continue;
                }
                let Some((_, target)) = graph.link_endpoints(link) else {
                    continue;
                };
                let Some(&target_branch) = self.spot_to_branch.get(&target) else {
                    continue;
                };
                let edge = self.graph.add_edge(branch, target_branch, BranchLink { link });
                self.link_to_branch.insert(link, BranchElement::Link(edge));
            }
        }

        self.rebuild_count += 1;
        debug!(
            "branch graph rebuilt: {} branches, {} branch links from {} spots",
            self.graph.node_count(),
            self.graph.edge_count(),
            spots.len()
        );
    }

    fn add_branch(&mut self, graph: &ModelGraph, start: SpotKey, visited: &mut HashSet<SpotKey>) {
        let mut chain = vec![start];
        let mut internal = Vec::new();
        visited.insert(start);

        let mut current = start;
        loop {
            let [link] = graph.outgoing(current) else {
                break;
            };
            let Some((_, next)) = graph.link_endpoints(*link) else {
                break;
            };
            if graph.incoming(next).len() != 1 || visited.contains(&next) {
                break;
            }
            internal.push(*link);
            chain.push(next);
            visited.insert(next);
            current = next;
        }

        let (Some(first), Some(last)) = (graph.spot(start), graph.spot(current)) else {
            return;
        };
        let branch = BranchSpot {
            first: start,
            last: current,
            spot_count: chain.len(),
            first_timepoint: first.timepoint(),
            timepoint: last.timepoint(),
            position: last.position(),
            label: graph.label(current).unwrap_or_default(),
        };
        let timepoint = branch.timepoint;
        let position = branch.position;
        let key = self.graph.add_node(branch);
        self.index.insert(timepoint, key, position);
        for spot in chain {
            self.spot_to_branch.insert(spot, key);
        }
        for link in internal {
            self.link_to_branch.insert(link, BranchElement::Spot(key));
        }
    }
}

/// A spot opens a branch unless it is the single successor of a spot with
/// a single successor.
fn starts_branch(graph: &ModelGraph, spot: SpotKey) -> bool {
    let [link] = graph.incoming(spot) else {
        return true;
    };
    let Some((source, _)) = graph.link_endpoints(*link) else {
        return true;
    };
    graph.outgoing(source).len() != 1
}
