/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shared helpers: random edit scripts and key-independent graph
//! fingerprints.

use std::collections::BTreeMap;

use lineage_core::{BoundingSphereRadiusStatistics, ModelGraph, SpotKey};
use proptest::prelude::*;

#[derive(Debug, Clone)]
pub enum Edit {
    AddSpot { timepoint: i32, radius: f64 },
    RemoveSpot(usize),
    AddLink(usize, usize),
    RemoveLink(usize),
    Move(usize, [f64; 3]),
    Stretch(usize, f64),
    Relabel(usize),
}

pub fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (0..4i32, 0.5..4.0f64).prop_map(|(timepoint, radius)| Edit::AddSpot { timepoint, radius }),
        1 => any::<usize>().prop_map(Edit::RemoveSpot),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::AddLink(a, b)),
        1 => any::<usize>().prop_map(Edit::RemoveLink),
        1 => (any::<usize>(), prop::array::uniform3(-50.0..50.0f64)).prop_map(|(i, p)| Edit::Move(i, p)),
        1 => (any::<usize>(), 0.1..20.0f64).prop_map(|(i, s)| Edit::Stretch(i, s)),
        1 => any::<usize>().prop_map(Edit::Relabel),
    ]
}

/// Applies `edit` to `graph`. Every spot gets a unique label so that
/// fingerprints can name spots without their pool keys.
pub fn apply(graph: &mut ModelGraph, edit: &Edit, counter: &mut usize) {
    let spots: Vec<SpotKey> = graph.spots().collect();
    let links: Vec<_> = graph.links().collect();
    let pick = |keys: &[SpotKey], i: usize| (!keys.is_empty()).then(|| keys[i % keys.len()]);
    *counter += 1;
    match *edit {
        Edit::AddSpot { timepoint, radius } => {
            let key = graph.add_vertex(timepoint, [*counter as f64, 0.0, 0.0], radius);
            graph.set_label(key, Some(format!("s{counter}")));
        }
        Edit::RemoveSpot(i) => {
            if let Some(key) = pick(&spots, i) {
                graph.remove_vertex(key);
            }
        }
        Edit::AddLink(a, b) => {
            if let (Some(source), Some(target)) = (pick(&spots, a), pick(&spots, b)) {
                graph.add_edge(source, target);
            }
        }
        Edit::RemoveLink(i) => {
            if !links.is_empty() {
                graph.remove_edge(links[i % links.len()]);
            }
        }
        Edit::Move(i, position) => {
            if let Some(key) = pick(&spots, i) {
                graph.set_position(key, position);
            }
        }
        Edit::Stretch(i, scale) => {
            if let Some(key) = pick(&spots, i) {
                let cov = [[scale, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.5]];
                graph.set_covariance(key, &cov);
            }
        }
        Edit::Relabel(i) => {
            if let Some(key) = pick(&spots, i) {
                graph.set_label(key, Some(format!("s{counter}")));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotPrint {
    pub timepoint: i32,
    pub position: [f64; 3],
    pub covariance: [f64; 6],
    pub radius_squ: f64,
    pub outgoing: Vec<String>,
    pub incoming: Vec<String>,
    pub tags: BTreeMap<u32, u32>,
}

/// Graph content keyed by label, with links named by endpoint labels in
/// list order.
pub fn fingerprint(graph: &ModelGraph) -> BTreeMap<String, SpotPrint> {
    let label = |key: SpotKey| graph.label(key).unwrap_or_default();
    graph
        .spots()
        .map(|key| {
            let spot = graph.spot(key).unwrap();
            let outgoing = graph
                .outgoing(key)
                .iter()
                .map(|&l| label(graph.link_endpoints(l).unwrap().1))
                .collect();
            let incoming = graph
                .incoming(key)
                .iter()
                .map(|&l| label(graph.link_endpoints(l).unwrap().0))
                .collect();
            (
                label(key),
                SpotPrint {
                    timepoint: spot.timepoint(),
                    position: spot.position(),
                    covariance: spot.packed_covariance(),
                    radius_squ: spot.bounding_sphere_radius_squared(),
                    outgoing,
                    incoming,
                    tags: graph.spot_tags(key),
                },
            )
        })
        .collect()
}

/// Checks the radius table against a full scan of `graph`.
pub fn assert_radius_table_matches(graph: &ModelGraph, stats: &BoundingSphereRadiusStatistics) {
    let mut expected: BTreeMap<i32, f64> = BTreeMap::new();
    for key in graph.spots() {
        let spot = graph.spot(key).unwrap();
        let max = expected.entry(spot.timepoint()).or_insert(f64::MIN);
        *max = max.max(spot.bounding_sphere_radius_squared());
    }
    let table = stats.read();
    for t in -1..5 {
        let want = expected.get(&t).copied().unwrap_or(-1.0);
        assert_eq!(
            table.max_bounding_sphere_radius_squared(t),
            want,
            "radius maximum of timepoint {t}"
        );
    }
    assert_eq!(table.timepoint_count(), expected.len());
}
