/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-timepoint maximum of the spot bounding-sphere radius.
//!
//! The table is built by a full scan and then maintained incrementally from
//! the graph's structural and radius listener channels. A full rescan of a
//! single timepoint only happens when the spot holding its maximum is
//! removed or shrinks.

use std::collections::HashMap;

use log::trace;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::graph::{GraphListener, ModelGraph, Spot, SpotKey, VertexPropertyListener};

/// Value reported for a timepoint without spots.
pub const NO_SPOTS: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TimepointMax {
    radius_squ: f64,
    holder: SpotKey,
}

/// Snapshot access to the statistics, see
/// [`BoundingSphereRadiusStatistics::read`].
#[derive(Debug, Default)]
pub struct RadiusTable {
    by_timepoint: HashMap<i32, TimepointMax>,
}

pub type RadiusStatisticsReadGuard<'a> = RwLockReadGuard<'a, RadiusTable>;

impl RadiusTable {
    /// Largest bounding-sphere radius squared at `timepoint`, or
    /// [`NO_SPOTS`] if the timepoint holds no spot.
    pub fn max_bounding_sphere_radius_squared(&self, timepoint: i32) -> f64 {
        self.by_timepoint
            .get(&timepoint)
            .map_or(NO_SPOTS, |m| m.radius_squ)
    }

    /// Spot currently holding the maximum at `timepoint`.
    pub fn holder(&self, timepoint: i32) -> Option<SpotKey> {
        self.by_timepoint.get(&timepoint).map(|m| m.holder)
    }

    pub fn timepoint_count(&self) -> usize {
        self.by_timepoint.len()
    }

    fn offer(&mut self, timepoint: i32, holder: SpotKey, radius_squ: f64) {
        let entry = self
            .by_timepoint
            .entry(timepoint)
            .or_insert(TimepointMax { radius_squ, holder });
        if radius_squ > entry.radius_squ {
            *entry = TimepointMax { radius_squ, holder };
        }
    }

    fn rescan(&mut self, graph: &ModelGraph, timepoint: i32) {
        trace!("rescanning radius maximum of timepoint {timepoint}");
        let best = graph.spatial_index(timepoint).and_then(|index| {
            index
                .iter()
                .filter_map(|key| Some((key, graph.spot(key)?.bounding_sphere_radius_squared())))
                .max_by(|a, b| a.1.total_cmp(&b.1))
        });
        match best {
            Some((holder, radius_squ)) => {
                self.by_timepoint
                    .insert(timepoint, TimepointMax { radius_squ, holder });
            }
            None => {
                self.by_timepoint.remove(&timepoint);
            }
        }
    }

    fn rebuild(&mut self, graph: &ModelGraph) {
        self.by_timepoint.clear();
        for key in graph.spots() {
            if let Some(spot) = graph.spot(key) {
                self.offer(spot.timepoint(), key, spot.bounding_sphere_radius_squared());
            }
        }
    }
}

/// Incrementally maintained radius statistics. Register it on the graph as
/// both a graph listener and a radius listener.
#[derive(Debug)]
pub struct BoundingSphereRadiusStatistics {
    table: RwLock<RadiusTable>,
}

impl BoundingSphereRadiusStatistics {
    pub fn new(graph: &ModelGraph) -> Self {
        let mut table = RadiusTable::default();
        table.rebuild(graph);
        Self {
            table: RwLock::new(table),
        }
    }

    /// Lock the table for reading. Hold the graph read guard at the same
    /// time for a view consistent with the graph.
    pub fn read(&self) -> RadiusStatisticsReadGuard<'_> {
        self.table.read()
    }

    pub fn max_bounding_sphere_radius_squared(&self, timepoint: i32) -> f64 {
        self.table.read().max_bounding_sphere_radius_squared(timepoint)
    }
}

impl GraphListener for BoundingSphereRadiusStatistics {
    fn vertex_added(&self, graph: &ModelGraph, spot: SpotKey) {
        if let Some(s) = graph.spot(spot) {
            self.table
                .write()
                .offer(s.timepoint(), spot, s.bounding_sphere_radius_squared());
        }
    }

    fn vertex_removed(&self, graph: &ModelGraph, spot: SpotKey, removed: &Spot) {
        let timepoint = removed.timepoint();
        let mut table = self.table.write();
        if graph.spatial_index(timepoint).is_none() {
            table.by_timepoint.remove(&timepoint);
        } else if table.holder(timepoint) == Some(spot) {
            table.rescan(graph, timepoint);
        }
    }

    fn graph_rebuilt(&self, graph: &ModelGraph) {
        self.table.write().rebuild(graph);
    }
}

impl VertexPropertyListener for BoundingSphereRadiusStatistics {
    fn property_changed(&self, graph: &ModelGraph, spot: SpotKey) {
        let Some(s) = graph.spot(spot) else {
            return;
        };
        let timepoint = s.timepoint();
        let radius_squ = s.bounding_sphere_radius_squared();
        let mut table = self.table.write();
        let Some(current) = table.by_timepoint.get(&timepoint).copied() else {
            table.offer(timepoint, spot, radius_squ);
            return;
        };
        if radius_squ > current.radius_squ {
            table.offer(timepoint, spot, radius_squ);
        } else if current.holder == spot && radius_squ < current.radius_squ {
            table.rescan(graph, timepoint);
        }
    }
}
