/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use lineage_core::Model;
use lineage_core::persistence::RawIoError;
use lineage_core::tags::TagSetStructure;
use tempfile::TempDir;

use super::harness::fingerprint;

fn populated_model() -> Model {
    let model = Model::new();
    {
        let mut graph = model.graph().write();
        let mut structure = TagSetStructure::new();
        let set = structure.create_tag_set("quality").unwrap();
        let good = structure.create_tag(set, "good", 0xff00ff00).unwrap();
        graph.set_tag_set_structure(structure);

        let mut previous = None;
        for t in 0..5 {
            let spot = graph.add_vertex(t, [t as f64, 1.0, 2.0], 1.0 + t as f64 * 0.5);
            graph.set_label(spot, Some(format!("track-{t}")));
            if t % 2 == 0 {
                graph.set_spot_tag(spot, set, Some(good));
            }
            if let Some(p) = previous {
                graph.add_edge(p, spot).unwrap();
            }
            previous = Some(spot);
        }
        graph.set_undo_point();
        graph.notify_graph_changed();
    }
    model
}

#[test]
fn test_save_load_round_trip_through_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lineage.raw");
    let source = populated_model();
    let saved = source.save_raw_file(&path).unwrap();

    let target = Model::new();
    let loaded = target.load_raw_file(&path).unwrap();

    let source_graph = source.graph().read();
    let target_graph = target.graph().read();
    assert_eq!(fingerprint(&target_graph), fingerprint(&source_graph));
    for spot in source_graph.spots() {
        let key = loaded.spot(saved.spot(spot).unwrap()).unwrap();
        assert_eq!(target_graph.label(key), source_graph.label(spot));
    }
    assert!(target_graph.is_save_point());
}

#[test]
fn test_load_clears_history_and_marks_branch_graph_stale() {
    let source = populated_model();
    let mut bytes = Vec::new();
    source.save_raw(&mut bytes).unwrap();

    let target = Model::new();
    target.graph().write().add_vertex(9, [0.0; 3], 1.0);
    target.set_undo_point();
    target.load_raw(bytes.as_slice()).unwrap();

    assert!(!target.undo());
    assert!(!target.branch_graph_sync().is_uptodate());
    target.branch_graph_sync().sync();
    assert_eq!(target.branch_graph().branch_spot_count(), 1);
}

#[test]
fn test_loading_garbage_leaves_model_unchanged() {
    let model = populated_model();
    let before = fingerprint(&model.graph().read());

    let result = model.load_raw(&b"definitely not a raw model"[..]);
    assert!(matches!(result, Err(RawIoError::BadMagic)));

    let mut bogus = b"LNRAW001".to_vec();
    bogus.extend_from_slice(&[0x28, 0xb5, 0x2f, 0xfd, 0x00, 0x01, 0x02]);
    assert!(model.load_raw(bogus.as_slice()).is_err());

    assert_eq!(fingerprint(&model.graph().read()), before);
    assert!(model.undo());
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let model = Model::new();
    let result = model.load_raw_file(&dir.path().join("absent.raw"));
    assert!(matches!(result, Err(RawIoError::Io(_))));
}
