/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Spatio-temporal index: one R*-tree of point positions per timepoint.
//!
//! Owners keep it current by calling the crate-internal mutators from the
//! same code path that changes positions, so a reader holding the model
//! read guard always sees an index that matches the graph.

use std::collections::BTreeMap;

use rstar::{AABB, PointDistance, RTree, RTreeObject};

/// An entry stored in the R*-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexedPoint<K> {
    position: [f64; 3],
    key: K,
}

impl<K> RTreeObject for IndexedPoint<K> {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl<K> PointDistance for IndexedPoint<K> {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

fn is_finite(position: &[f64; 3]) -> bool {
    position.iter().all(|c| c.is_finite())
}

/// Point index of the objects living at a single timepoint.
///
/// Objects at a non-finite position cannot be placed in the tree. They are
/// kept aside by key: counted and iterated, but never returned by a
/// geometric query.
pub struct SpatialIndex<K> {
    tree: RTree<IndexedPoint<K>>,
    unplaced: Vec<K>,
}

impl<K: Copy + PartialEq> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self {
            tree: RTree::new(),
            unplaced: Vec::new(),
        }
    }
}

impl<K: Copy + PartialEq> SpatialIndex<K> {
    pub fn len(&self) -> usize {
        self.tree.size() + self.unplaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All indexed keys, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.tree
            .iter()
            .map(|p| p.key)
            .chain(self.unplaced.iter().copied())
    }

    pub fn nearest_neighbor(&self, point: &[f64; 3]) -> Option<K> {
        self.tree.nearest_neighbor(point).map(|p| p.key)
    }

    /// Keys within `radius` of `point` (inclusive).
    pub fn within_distance(&self, point: &[f64; 3], radius: f64) -> Vec<K> {
        self.tree
            .locate_within_distance(*point, radius * radius)
            .map(|p| p.key)
            .collect()
    }

    /// Keys whose position lies inside the axis-aligned box `[min, max]`.
    pub fn in_box(&self, min: [f64; 3], max: [f64; 3]) -> Vec<K> {
        let aabb = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope(&aabb)
            .map(|p| p.key)
            .collect()
    }

    pub(crate) fn insert(&mut self, key: K, position: [f64; 3]) {
        if is_finite(&position) {
            self.tree.insert(IndexedPoint { position, key });
        } else {
            self.unplaced.push(key);
        }
    }

    pub(crate) fn remove(&mut self, key: K, position: [f64; 3]) -> bool {
        if is_finite(&position) {
            return self.tree.remove(&IndexedPoint { position, key }).is_some();
        }
        let Some(i) = self.unplaced.iter().position(|&k| k == key) else {
            return false;
        };
        self.unplaced.swap_remove(i);
        true
    }
}

/// Timepoint-partitioned collection of [`SpatialIndex`]es. Timepoints with
/// no objects have no entry.
pub struct SpatioTemporalIndex<K> {
    by_timepoint: BTreeMap<i32, SpatialIndex<K>>,
}

impl<K: Copy + PartialEq> Default for SpatioTemporalIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + PartialEq> SpatioTemporalIndex<K> {
    pub fn new() -> Self {
        Self {
            by_timepoint: BTreeMap::new(),
        }
    }

    pub fn spatial_index(&self, timepoint: i32) -> Option<&SpatialIndex<K>> {
        self.by_timepoint.get(&timepoint)
    }

    /// Occupied timepoints in ascending order.
    pub fn timepoints(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_timepoint.keys().copied()
    }

    /// Total number of indexed objects over all timepoints.
    pub fn len(&self) -> usize {
        self.by_timepoint.values().map(SpatialIndex::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_timepoint.is_empty()
    }

    pub(crate) fn insert(&mut self, timepoint: i32, key: K, position: [f64; 3]) {
        self.by_timepoint
            .entry(timepoint)
            .or_default()
            .insert(key, position);
    }

    pub(crate) fn remove(&mut self, timepoint: i32, key: K, position: [f64; 3]) -> bool {
        let Some(index) = self.by_timepoint.get_mut(&timepoint) else {
            return false;
        };
        let removed = index.remove(key, position);
        if index.is_empty() {
            self.by_timepoint.remove(&timepoint);
        }
        removed
    }

    pub(crate) fn relocate(&mut self, timepoint: i32, key: K, from: [f64; 3], to: [f64; 3]) {
        self.remove(timepoint, key, from);
        self.insert(timepoint, key, to);
    }

    pub(crate) fn clear(&mut self) {
        self.by_timepoint.clear();
    }
}
