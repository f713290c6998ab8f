/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod branch_sync;
mod concurrency;
mod harness;
mod persistence;
mod radius_stats;
mod undo_redo;

use lineage_core::Model;

#[test]
fn scenarios_binary_smoke_runs() {
    let model = Model::new();
    assert_eq!(model.graph().read().spot_count(), 0);
}
