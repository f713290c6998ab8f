/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use lineage_core::Model;
use proptest::prelude::*;
use rstest::rstest;

use super::harness::{apply, assert_radius_table_matches, edit_strategy};

#[rstest]
#[case(0, 1.0)]
#[case(1, 4.0)]
#[case(2, 9.0)]
#[case(3, -1.0)]
fn test_chain_maxima(#[case] timepoint: i32, #[case] expected: f64) {
    let model = Model::new();
    {
        let mut graph = model.graph().write();
        let spots: Vec<_> = (0..3)
            .map(|t| graph.add_vertex(t, [0.0; 3], f64::from(t + 1)))
            .collect();
        graph.add_edge(spots[0], spots[1]).unwrap();
        graph.add_edge(spots[1], spots[2]).unwrap();
    }
    assert_eq!(
        model.radius_statistics().max_bounding_sphere_radius_squared(timepoint),
        expected
    );
}

#[test]
fn test_removing_max_holder_falls_back_to_next() {
    let model = Model::new();
    let big;
    {
        let mut graph = model.graph().write();
        graph.add_vertex(0, [0.0; 3], 1.0);
        graph.add_vertex(0, [1.0, 0.0, 0.0], 2.0);
        big = graph.add_vertex(0, [2.0, 0.0, 0.0], 3.0);
    }
    assert_eq!(model.radius_statistics().max_bounding_sphere_radius_squared(0), 9.0);
    model.graph().write().remove_vertex(big);
    assert_eq!(model.radius_statistics().max_bounding_sphere_radius_squared(0), 4.0);
}

#[test]
fn test_raw_load_rebuilds_statistics() {
    let source = Model::new();
    source.graph().write().add_vertex(5, [0.0; 3], 2.0);
    let mut bytes = Vec::new();
    source.save_raw(&mut bytes).unwrap();

    let target = Model::new();
    target.graph().write().add_vertex(0, [0.0; 3], 1.0);
    target.load_raw(bytes.as_slice()).unwrap();
    let stats = target.radius_statistics();
    assert_eq!(stats.max_bounding_sphere_radius_squared(0), -1.0);
    assert_eq!(stats.max_bounding_sphere_radius_squared(5), 4.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_radius_table_matches_full_scan(
        edits in prop::collection::vec(edit_strategy(), 1..60)
    ) {
        let model = Model::new();
        let mut counter = 0;
        let mut graph = model.graph().write();
        for edit in &edits {
            apply(&mut graph, edit, &mut counter);
            assert_radius_table_matches(&graph, model.radius_statistics());
        }
        graph.set_undo_point();
        drop(graph);

        while model.undo() {
            assert_radius_table_matches(&model.graph().read(), model.radius_statistics());
        }
    }
}
