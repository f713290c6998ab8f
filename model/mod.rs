/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The model: a lock-guarded [`ModelGraph`] with its derived structures.
//!
//! Lock order is graph lock first, then the inner lock of a derived
//! structure (branch graph, radius table, features). Mutation goes through
//! `model.graph().write()`; remember to call
//! [`ModelGraph::notify_graph_changed`] before dropping the write guard
//! when the branch graph should see the change.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};

use crate::branch::{BranchGraphSynchronizer, ModelBranchGraph};
use crate::config::ModelConfig;
use crate::features::FeatureModel;
use crate::graph::ModelGraph;
use crate::persistence::{self, FileIdToGraphMap, GraphToFileIdMap, RawIoError};
use crate::stats::BoundingSphereRadiusStatistics;

pub struct Model {
    config: ModelConfig,
    graph: Arc<RwLock<ModelGraph>>,
    branch_graph: Arc<RwLock<ModelBranchGraph>>,
    branch_sync: BranchGraphSynchronizer,
    radius_stats: Arc<BoundingSphereRadiusStatistics>,
    features: RwLock<FeatureModel>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        let mut graph = ModelGraph::with_capacity(config.initial_capacity);
        let radius_stats = Arc::new(BoundingSphereRadiusStatistics::new(&graph));
        graph.add_graph_listener(radius_stats.clone());
        graph.add_vertex_radius_listener(radius_stats.clone());

        let graph = Arc::new(RwLock::new(graph));
        let branch_graph = Arc::new(RwLock::new(ModelBranchGraph::new()));
        let branch_sync = BranchGraphSynchronizer::new(graph.clone(), branch_graph.clone());

        Self {
            config,
            graph,
            branch_graph,
            branch_sync,
            radius_stats,
            features: RwLock::new(FeatureModel::new()),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn space_units(&self) -> &str {
        &self.config.space_units
    }

    pub fn time_units(&self) -> &str {
        &self.config.time_units
    }

    /// The reader/writer lock guarding the graph.
    pub fn graph(&self) -> &Arc<RwLock<ModelGraph>> {
        &self.graph
    }

    /// Read access to the branch graph as of the last
    /// [`BranchGraphSynchronizer::sync`].
    pub fn branch_graph(&self) -> RwLockReadGuard<'_, ModelBranchGraph> {
        self.branch_graph.read()
    }

    pub fn branch_graph_sync(&self) -> &BranchGraphSynchronizer {
        &self.branch_sync
    }

    pub fn radius_statistics(&self) -> &Arc<BoundingSphereRadiusStatistics> {
        &self.radius_stats
    }

    pub fn features(&self) -> RwLockReadGuard<'_, FeatureModel> {
        self.features.read()
    }

    pub fn features_mut(&self) -> RwLockWriteGuard<'_, FeatureModel> {
        self.features.write()
    }

    /// Register the built-in features using this model's units.
    pub fn declare_default_features(&self) {
        self.features
            .write()
            .declare_defaults(&self.config.space_units, &self.config.time_units);
    }

    /// Revert the last undoable step. `false` when there is nothing to undo.
    pub fn undo(&self) -> bool {
        let mut graph = self.graph.write();
        let done = graph.undo();
        graph.notify_graph_changed();
        done
    }

    pub fn redo(&self) -> bool {
        let mut graph = self.graph.write();
        let done = graph.redo();
        graph.notify_graph_changed();
        done
    }

    pub fn set_undo_point(&self) {
        self.graph.write().set_undo_point();
    }

    pub fn set_save_point(&self) {
        self.graph.write().set_save_point();
    }

    pub fn is_save_point(&self) -> bool {
        self.graph.read().is_save_point()
    }

    /// Write the graph in raw format. On success the current state becomes
    /// the save point.
    pub fn save_raw<W: Write>(&self, writer: W) -> Result<GraphToFileIdMap, RawIoError> {
        let graph = self.graph.upgradable_read();
        let ids = persistence::write_raw(
            &graph,
            &self.config.space_units,
            &self.config.time_units,
            writer,
        )?;
        RwLockUpgradableReadGuard::upgrade(graph).set_save_point();
        Ok(ids)
    }

    /// Replace the graph with the content of a raw file. On any error the
    /// model is left untouched. Undo history is cleared.
    pub fn load_raw<R: Read>(&self, reader: R) -> Result<FileIdToGraphMap, RawIoError> {
        let persistence::LoadedModel {
            graph: loaded,
            space_units,
            time_units,
            ids,
        } = persistence::read_raw(reader)?;
        if space_units != self.config.space_units || time_units != self.config.time_units {
            warn!(
                "raw file units {space_units}/{time_units} differ from model units {}/{}",
                self.config.space_units, self.config.time_units
            );
        }

        let mut graph = self.graph.write();
        graph.replace_contents(loaded);
        graph.notify_graph_changed();
        info!(
            "loaded raw model: {} spots, {} links",
            graph.spot_count(),
            graph.link_count()
        );
        Ok(ids)
    }

    pub fn save_raw_file(&self, path: &Path) -> Result<GraphToFileIdMap, RawIoError> {
        self.save_raw(BufWriter::new(File::create(path)?))
    }

    pub fn load_raw_file(&self, path: &Path) -> Result<FileIdToGraphMap, RawIoError> {
        self.load_raw(BufReader::new(File::open(path)?))
    }
}
