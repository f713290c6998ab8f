/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashMap;

use lineage_core::branch::BranchElement;
use lineage_core::{Model, ModelGraph, SpotKey};
use proptest::prelude::*;
use rstest::rstest;

use super::harness::{apply, edit_strategy};

/// Counts maximal chains without walking forward: every spot that opens a
/// chain, plus every pure cycle found by following single predecessors.
fn maximal_chain_count(graph: &ModelGraph) -> usize {
    let predecessor = |spot: SpotKey| -> Option<SpotKey> {
        let [link] = graph.incoming(spot) else {
            return None;
        };
        let (source, _) = graph.link_endpoints(*link)?;
        (graph.outgoing(source).len() == 1).then_some(source)
    };

    let mut openers = 0;
    let mut cycles = 0;
    // true: reaches an opener backwards; false: lies on or behind a cycle
    let mut resolved: HashMap<SpotKey, bool> = HashMap::new();
    for spot in graph.spots() {
        if predecessor(spot).is_none() {
            openers += 1;
            resolved.insert(spot, true);
        }
    }
    for spot in graph.spots() {
        let mut path = Vec::new();
        let mut current = spot;
        let outcome = loop {
            if let Some(&known) = resolved.get(&current) {
                break known;
            }
            if path.contains(&current) {
                cycles += 1;
                break false;
            }
            path.push(current);
            match predecessor(current) {
                Some(p) => current = p,
                None => break true,
            }
        };
        for s in path {
            resolved.insert(s, outcome);
        }
    }
    openers + cycles
}

#[test]
fn test_removing_middle_spot_splits_chain() {
    let model = Model::new();
    let middle;
    {
        let mut graph = model.graph().write();
        let s0 = graph.add_vertex(0, [0.0; 3], 1.0);
        middle = graph.add_vertex(1, [0.0; 3], 2.0);
        let s2 = graph.add_vertex(2, [0.0; 3], 3.0);
        graph.add_edge(s0, middle).unwrap();
        graph.add_edge(middle, s2).unwrap();
        graph.notify_graph_changed();
    }
    assert_eq!(model.radius_statistics().max_bounding_sphere_radius_squared(1), 4.0);

    model.branch_graph_sync().sync();
    assert_eq!(model.branch_graph().branch_spot_count(), 1);

    {
        let mut graph = model.graph().write();
        assert!(graph.remove_vertex(middle));
        assert_eq!(graph.link_count(), 0);
        graph.notify_graph_changed();
    }
    assert!(!model.branch_graph_sync().is_uptodate());
    model.branch_graph_sync().sync();
    assert!(model.branch_graph_sync().is_uptodate());
    assert_eq!(model.branch_graph().branch_spot_count(), 2);
    assert_eq!(model.branch_graph().branch_link_count(), 0);
    assert_eq!(model.radius_statistics().max_bounding_sphere_radius_squared(1), -1.0);
}

#[test]
fn test_second_sync_does_not_rebuild() {
    let model = Model::new();
    {
        let mut graph = model.graph().write();
        graph.add_vertex(0, [0.0; 3], 1.0);
        graph.notify_graph_changed();
    }
    model.branch_graph_sync().sync();
    model.branch_graph_sync().sync();
    assert_eq!(model.branch_graph().rebuild_count(), 1);
}

#[test]
fn test_unnotified_edits_do_not_mark_stale() {
    let model = Model::new();
    model.graph().write().add_vertex(0, [0.0; 3], 1.0);
    assert!(model.branch_graph_sync().is_uptodate());

    model.graph().write().notify_graph_changed();
    assert!(!model.branch_graph_sync().is_uptodate());
}

/// Builds `tracks` independent tracks of `length` spots, each dividing once
/// at its end into two single-spot daughters.
#[rstest]
#[case(1, 1)]
#[case(3, 4)]
#[case(5, 2)]
fn test_branch_count_matches_maximal_chains(#[case] tracks: usize, #[case] length: usize) {
    let model = Model::new();
    {
        let mut graph = model.graph().write();
        for track in 0..tracks {
            let x = track as f64 * 100.0;
            let mut previous = None;
            for t in 0..length {
                let spot = graph.add_vertex(t as i32, [x, 0.0, 0.0], 1.0);
                if let Some(p) = previous {
                    graph.add_edge(p, spot).unwrap();
                }
                previous = Some(spot);
            }
            let last = previous.unwrap();
            for dx in [-1.0, 1.0] {
                let daughter = graph.add_vertex(length as i32, [x + dx, 0.0, 0.0], 1.0);
                graph.add_edge(last, daughter).unwrap();
            }
        }
        graph.notify_graph_changed();
    }

    let sync = model.branch_graph_sync();
    sync.sync();
    assert!(sync.is_uptodate());
    let branch = model.branch_graph();
    assert_eq!(branch.branch_spot_count(), tracks * 3);
    assert_eq!(branch.branch_link_count(), tracks * 2);

    let graph = model.graph().read();
    for spot in graph.spots() {
        assert!(branch.branch_of_spot(spot).is_some());
    }
    for link in graph.links() {
        match branch.branch_element_of_link(link).unwrap() {
            BranchElement::Spot(b) => {
                let (source, target) = graph.link_endpoints(link).unwrap();
                assert_eq!(branch.branch_of_spot(source), Some(b));
                assert_eq!(branch.branch_of_spot(target), Some(b));
            }
            BranchElement::Link(e) => {
                assert_eq!(branch.branch_link(e).unwrap().link, link);
            }
        }
    }
}

#[test]
fn test_branch_spot_delegates_to_last_spot() {
    let model = Model::new();
    {
        let mut graph = model.graph().write();
        let a = graph.add_vertex(0, [0.0; 3], 1.0);
        let b = graph.add_vertex(1, [4.0, 5.0, 6.0], 1.0);
        graph.add_edge(a, b).unwrap();
        graph.set_label(b, Some("tip".to_string()));
        graph.notify_graph_changed();
    }
    model.branch_graph_sync().sync();
    let branch = model.branch_graph();
    let key = branch.branch_spots().next().unwrap();
    let b = branch.branch_spot(key).unwrap();
    assert_eq!(b.label, "tip");
    assert_eq!(b.timepoint, 1);
    assert_eq!(b.first_timepoint, 0);
    assert_eq!(b.position, [4.0, 5.0, 6.0]);
    assert_eq!(b.spot_count, 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_branch_count_matches_maximal_chains(
        edits in prop::collection::vec(edit_strategy(), 1..60)
    ) {
        let model = Model::new();
        let mut counter = 0;
        {
            let mut graph = model.graph().write();
            for edit in &edits {
                apply(&mut graph, edit, &mut counter);
            }
            graph.notify_graph_changed();
        }
        model.branch_graph_sync().sync();
        prop_assert!(model.branch_graph_sync().is_uptodate());

        let graph = model.graph().read();
        let branch = model.branch_graph();
        prop_assert_eq!(branch.branch_spot_count(), maximal_chain_count(&graph));
        let covered: usize = branch
            .branch_spots()
            .map(|b| branch.branch_spot(b).unwrap().spot_count)
            .sum();
        prop_assert_eq!(covered, graph.spot_count());
        for spot in graph.spots() {
            prop_assert!(branch.branch_of_spot(spot).is_some());
        }
    }
}
