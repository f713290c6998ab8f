/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Lineage graph core: spots and links in a pooled graph, a derived branch
//! graph kept in sync on demand, undo/redo over property and structural
//! edits, and incrementally maintained per-timepoint radius statistics.
//!
//! The entry point is [`model::Model`], which owns the reader/writer lock
//! guarding the [`graph::ModelGraph`] and wires the derived structures to
//! the graph's listener channels.

pub mod branch;
pub mod config;
pub mod features;
pub mod graph;
pub mod model;
pub mod persistence;
pub mod spatial;
pub mod stats;
pub mod tags;
pub mod undo;

pub use branch::{BranchGraphSynchronizer, ModelBranchGraph};
pub use config::ModelConfig;
pub use graph::{LinkKey, ModelGraph, Spot, SpotKey};
pub use model::Model;
pub use stats::BoundingSphereRadiusStatistics;
