/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use lineage_core::Model;
use lineage_core::tags::TagSetStructure;
use proptest::prelude::*;
use rstest::rstest;

use super::harness::{Edit, apply, edit_strategy, fingerprint};

#[test]
fn test_undo_all_then_redo_all_restores_graph() {
    let model = Model::new();
    let before;
    {
        let mut graph = model.graph().write();
        let mut structure = TagSetStructure::new();
        let fate = structure.create_tag_set("fate").unwrap();
        let divides = structure.create_tag(fate, "divides", 0xff00ff00).unwrap();
        graph.set_tag_set_structure(structure);
        graph.set_undo_point();

        let a = graph.add_vertex(0, [0.0; 3], 1.0);
        let b = graph.add_vertex(1, [1.0, 0.0, 0.0], 1.0);
        let c = graph.add_vertex(1, [-1.0, 0.0, 0.0], 1.0);
        graph.set_label(a, Some("a".to_string()));
        graph.set_label(b, Some("b".to_string()));
        graph.set_label(c, Some("c".to_string()));
        graph.set_undo_point();

        let ab = graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.set_spot_tag(a, fate, Some(divides));
        graph.set_link_tag(ab, fate, Some(divides));
        graph.set_undo_point();

        graph.set_position(b, [2.0, 2.0, 0.0]);
        graph.remove_vertex(c);
        graph.set_undo_point();

        graph.notify_graph_changed();
        before = fingerprint(&graph);
    }

    let mut steps = 0;
    while model.undo() {
        steps += 1;
    }
    assert_eq!(steps, 4);
    assert_eq!(model.graph().read().spot_count(), 0);
    assert!(model.is_save_point());

    while model.redo() {}
    let graph = model.graph().read();
    assert_eq!(fingerprint(&graph), before);
    let a = graph
        .spots()
        .find(|&s| graph.label(s).as_deref() == Some("a"))
        .unwrap();
    let ab = graph.outgoing(a)[0];
    assert_eq!(graph.link_tags(ab).len(), 1);
}

#[test]
fn test_undo_on_fresh_model_is_noop() {
    let model = Model::new();
    assert!(!model.undo());
    assert!(!model.redo());
    assert!(model.branch_graph_sync().is_uptodate());
}

#[rstest]
#[case::one_edit(1)]
#[case::several_edits(4)]
fn test_double_undo_point_creates_no_empty_step(#[case] edits: usize) {
    let model = Model::new();
    {
        let mut graph = model.graph().write();
        for t in 0..edits {
            graph.add_vertex(t as i32, [0.0; 3], 1.0);
        }
    }
    model.set_undo_point();
    model.set_undo_point();

    assert!(model.undo());
    assert_eq!(model.graph().read().spot_count(), 0);
    assert!(!model.undo());
}

#[test]
fn test_save_point_survives_undo_redo() {
    let model = Model::new();
    model.graph().write().add_vertex(0, [0.0; 3], 1.0);
    model.set_undo_point();
    model.set_save_point();

    model.graph().write().add_vertex(1, [0.0; 3], 1.0);
    model.set_undo_point();
    assert!(!model.is_save_point());

    model.undo();
    assert!(model.is_save_point());
    model.redo();
    assert!(!model.is_save_point());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_undo_and_redo_walk_back_through_every_step(
        edits in prop::collection::vec(edit_strategy(), 1..40)
    ) {
        let model = Model::new();
        let mut prints = Vec::new();
        let mut counter = 0;
        {
            let mut graph = model.graph().write();
            prints.push(fingerprint(&graph));
            for edit in &edits {
                // Edits that hit nothing record nothing and make no step.
                let steps = graph.undo_recorder().undo_steps();
                apply(&mut graph, edit, &mut counter);
                graph.set_undo_point();
                if graph.undo_recorder().undo_steps() > steps {
                    prints.push(fingerprint(&graph));
                }
            }
        }

        for expected in prints.iter().rev().skip(1) {
            prop_assert!(model.undo());
            prop_assert_eq!(&fingerprint(&model.graph().read()), expected);
        }
        prop_assert!(!model.undo());

        for expected in prints.iter().skip(1) {
            prop_assert!(model.redo());
            prop_assert_eq!(&fingerprint(&model.graph().read()), expected);
        }
        prop_assert!(!model.redo());
    }
}

#[test]
fn test_relabel_edit_is_undoable() {
    let model = Model::new();
    let mut counter = 0;
    {
        let mut graph = model.graph().write();
        apply(&mut graph, &Edit::AddSpot { timepoint: 0, radius: 1.0 }, &mut counter);
        graph.set_undo_point();
        apply(&mut graph, &Edit::Relabel(0), &mut counter);
        graph.set_undo_point();
    }
    let label = |model: &Model| {
        let graph = model.graph().read();
        graph.spots().next().and_then(|s| graph.label(s))
    };
    assert_eq!(label(&model).as_deref(), Some("s2"));
    model.undo();
    assert_eq!(label(&model).as_deref(), Some("s1"));
}
