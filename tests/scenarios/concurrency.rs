/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use lineage_core::Model;

#[test]
fn test_readers_see_complete_mutations() {
    let model = Model::new();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            for t in 0..200 {
                let mut graph = model.graph().write();
                let a = graph.add_vertex(t % 7, [t as f64, 0.0, 0.0], 1.0);
                let b = graph.add_vertex(t % 7 + 1, [t as f64, 1.0, 0.0], 2.0);
                graph.add_edge(a, b).unwrap();
                if t % 3 == 0 {
                    graph.remove_vertex(a);
                }
                graph.set_undo_point();
                graph.notify_graph_changed();
            }
            done.store(true, Ordering::Release);
        });

        for _ in 0..3 {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let graph = model.graph().read();
                    let indexed = graph.spatio_temporal_index().len();
                    assert_eq!(indexed, graph.spot_count());
                    for link in graph.links() {
                        let (source, target) = graph.link_endpoints(link).unwrap();
                        assert!(graph.contains_spot(source));
                        assert!(graph.contains_spot(target));
                    }
                    let stats = model.radius_statistics().read();
                    for t in graph.spatio_temporal_index().timepoints() {
                        assert!(stats.max_bounding_sphere_radius_squared(t) >= 1.0);
                    }
                }
            });
        }

        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                model.branch_graph_sync().sync();
            }
        });
    });

    model.branch_graph_sync().sync();
    let graph = model.graph().read();
    let branch = model.branch_graph();
    for spot in graph.spots() {
        assert!(branch.branch_of_spot(spot).is_some());
    }
}

#[test]
fn test_undo_from_another_thread() {
    let model = Model::new();
    model.graph().write().add_vertex(0, [0.0; 3], 1.0);
    model.set_undo_point();

    thread::scope(|scope| {
        scope.spawn(|| assert!(model.undo())).join().unwrap();
    });
    assert_eq!(model.graph().read().spot_count(), 0);
}
