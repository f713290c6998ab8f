/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The model graph: spots (vertices) and links (edges).
//!
//! Core structures:
//! - `ModelGraph`: pooled graph backed by petgraph::StableGraph
//! - `Spot`: 3D ellipsoid at a timepoint, addressed by `SpotKey`
//! - `Link`: directed connection between two spots, addressed by `LinkKey`
//!
//! Boundary: every mutator takes `&mut self`, so callers must hold the
//! model's write guard. Each mutation keeps the spatio-temporal index
//! current, fires the listener channels and is recorded for undo.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use petgraph::Directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};

use crate::spatial::{SpatialIndex, SpatioTemporalIndex};
use crate::tags::{TagAssignments, TagId, TagSetId, TagSetStructure};
use crate::undo::{LinkRecord, PropertyValue, SpotRecord, UndoRecorder};

pub mod listeners;
pub mod spot;

pub use listeners::{GraphChangeListener, GraphListener, VertexPropertyListener};
pub use spot::{PackedCovariance, Spot};

use listeners::Listeners;

/// Stable spot handle (pool index: survives other deletions, reused after
/// the spot itself is removed).
pub type SpotKey = NodeIndex;

/// Stable link handle (pool index).
pub type LinkKey = EdgeIndex;

/// Link payload. Links carry nothing beyond their endpoints; tags live in
/// the side model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link;

/// Default pool capacity for a fresh graph.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Pooled spot/link graph with change notification and undo recording.
pub struct ModelGraph {
    /// The pool. Removal frees an index for the next insertion.
    pub(crate) inner: StableGraph<Spot, Link, Directed>,

    index: SpatioTemporalIndex<SpotKey>,

    tag_structure: TagSetStructure,
    spot_tags: TagAssignments<SpotKey>,
    link_tags: TagAssignments<LinkKey>,

    pub(crate) undo: UndoRecorder,

    listeners: Listeners,

    /// Set by every mutation, cleared by `notify_graph_changed`.
    changed_since_notify: bool,
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: StableGraph::with_capacity(capacity, capacity),
            index: SpatioTemporalIndex::new(),
            tag_structure: TagSetStructure::new(),
            spot_tags: TagAssignments::default(),
            link_tags: TagAssignments::default(),
            undo: UndoRecorder::new(),
            listeners: Listeners::default(),
            changed_since_notify: false,
        }
    }

    // ----------------------------------------------------------------------
    // Structural mutation
    // ----------------------------------------------------------------------

    /// Add a spherical spot.
    pub fn add_vertex(&mut self, timepoint: i32, position: [f64; 3], radius: f64) -> SpotKey {
        self.add_spot(Spot::with_radius(timepoint, position, radius))
    }

    /// Add a spot shaped by `covariance` (upper triangle is read).
    pub fn add_vertex_with_covariance(
        &mut self,
        timepoint: i32,
        position: [f64; 3],
        covariance: &[[f64; 3]; 3],
    ) -> SpotKey {
        self.add_spot(Spot::with_covariance(timepoint, position, covariance))
    }

    fn add_spot(&mut self, spot: Spot) -> SpotKey {
        let key = self.insert_spot(spot);
        let record = self.spot_record(key);
        self.undo.record_add_spot(key, record);
        key
    }

    /// Remove a spot. Incident links are removed first, each as a link
    /// removal of its own.
    pub fn remove_vertex(&mut self, spot: SpotKey) -> bool {
        let Some(incident) = self.incident_links(spot) else {
            return false;
        };
        for link in incident {
            self.remove_edge(link);
        }
        let record = self.spot_record(spot);
        self.undo.record_remove_spot(spot, record);
        self.detach_spot(spot).is_some()
    }

    /// Append a link from `source` to `target`. Returns `None` when either
    /// endpoint does not exist.
    pub fn add_edge(&mut self, source: SpotKey, target: SpotKey) -> Option<LinkKey> {
        self.insert_edge(source, usize::MAX, target, usize::MAX)
    }

    /// Insert a link at position `out_index` of the source's outgoing list
    /// and `in_index` of the target's incoming list. Indices past the end
    /// append.
    pub fn insert_edge(
        &mut self,
        source: SpotKey,
        out_index: usize,
        target: SpotKey,
        in_index: usize,
    ) -> Option<LinkKey> {
        let key = self.insert_link(source, out_index, target, in_index)?;
        let (out_index, in_index) = self.link_positions(key)?;
        let record = self.link_record(key);
        self.undo
            .record_add_link(key, source, target, out_index, in_index, record);
        Some(key)
    }

    pub fn remove_edge(&mut self, link: LinkKey) -> bool {
        let Some((source, target)) = self.inner.edge_endpoints(link) else {
            return false;
        };
        let Some((out_index, in_index)) = self.link_positions(link) else {
            return false;
        };
        let record = self.link_record(link);
        self.undo
            .record_remove_link(link, source, target, out_index, in_index, record);
        self.detach_link(link).is_some()
    }

    /// First link from `source` to `target` in the source's outgoing order.
    pub fn get_edge(&self, source: SpotKey, target: SpotKey) -> Option<LinkKey> {
        self.inner.node_weight(source)?.outgoing.iter().copied().find(|&link| {
            self.inner
                .edge_endpoints(link)
                .is_some_and(|(_, t)| t == target)
        })
    }

    // ----------------------------------------------------------------------
    // Property mutation
    // ----------------------------------------------------------------------

    pub fn set_position(&mut self, spot: SpotKey, position: [f64; 3]) -> bool {
        let Some(old) = self.write_position(spot, position) else {
            return false;
        };
        self.undo
            .record_spot_property(spot, PropertyValue::Position(old));
        true
    }

    /// Set the covariance; the bounding-sphere radius is recomputed.
    pub fn set_covariance(&mut self, spot: SpotKey, covariance: &[[f64; 3]; 3]) -> bool {
        let packed = spot::pack_covariance(covariance);
        let radius_squ = spot::radius_squared_from_covariance(&packed);
        let Some((old_cov, old_radius_squ)) = self.write_covariance(spot, packed, radius_squ)
        else {
            return false;
        };
        self.undo.record_spot_property(
            spot,
            PropertyValue::Covariance {
                covariance: old_cov,
                radius_squ: old_radius_squ,
            },
        );
        true
    }

    /// Set or clear (back to the index default) the label.
    pub fn set_label(&mut self, spot: SpotKey, label: Option<String>) -> bool {
        let Some(old) = self.write_label(spot, label) else {
            return false;
        };
        self.undo.record_spot_property(spot, PropertyValue::Label(old));
        true
    }

    // ----------------------------------------------------------------------
    // Tags
    // ----------------------------------------------------------------------

    pub fn tag_set_structure(&self) -> &TagSetStructure {
        &self.tag_structure
    }

    /// Replace the tag-set structure. Assignments to tag sets or tags that
    /// no longer exist are dropped, each as an undoable edit.
    pub fn set_tag_set_structure(&mut self, structure: TagSetStructure) {
        let stale_spots: Vec<(SpotKey, TagSetId)> = self
            .spot_tags
            .iter()
            .filter(|(_, set, tag)| !structure.contains_tag(*set, *tag))
            .map(|(key, set, _)| (key, set))
            .collect();
        for (spot, set) in stale_spots {
            self.set_spot_tag(spot, set, None);
        }
        let stale_links: Vec<(LinkKey, TagSetId)> = self
            .link_tags
            .iter()
            .filter(|(_, set, tag)| !structure.contains_tag(*set, *tag))
            .map(|(key, set, _)| (key, set))
            .collect();
        for (link, set) in stale_links {
            self.set_link_tag(link, set, None);
        }

        let old = self.replace_tag_set_structure(structure);
        self.undo.record_tag_set_structure(old);
    }

    /// Assign `tag` of `tag_set` to a spot, or clear the set with `None`.
    /// Returns `false` for dead spots and unknown tags.
    pub fn set_spot_tag(&mut self, spot: SpotKey, tag_set: TagSetId, tag: Option<TagId>) -> bool {
        if !self.inner.contains_node(spot) {
            return false;
        }
        if let Some(tag) = tag
            && !self.tag_structure.contains_tag(tag_set, tag)
        {
            warn!("ignoring unknown tag {tag} of tag set {tag_set}");
            return false;
        }
        let Some(old) = self.write_spot_tag(spot, tag_set, tag) else {
            return false;
        };
        self.undo
            .record_spot_property(spot, PropertyValue::Tag { tag_set, tag: old });
        true
    }

    pub fn set_link_tag(&mut self, link: LinkKey, tag_set: TagSetId, tag: Option<TagId>) -> bool {
        if self.inner.edge_weight(link).is_none() {
            return false;
        }
        if let Some(tag) = tag
            && !self.tag_structure.contains_tag(tag_set, tag)
        {
            warn!("ignoring unknown tag {tag} of tag set {tag_set}");
            return false;
        }
        let Some(old) = self.write_link_tag(link, tag_set, tag) else {
            return false;
        };
        self.undo
            .record_link_property(link, PropertyValue::Tag { tag_set, tag: old });
        true
    }

    pub fn spot_tag(&self, spot: SpotKey, tag_set: TagSetId) -> Option<TagId> {
        self.spot_tags.get(spot, tag_set)
    }

    pub fn link_tag(&self, link: LinkKey, tag_set: TagSetId) -> Option<TagId> {
        self.link_tags.get(link, tag_set)
    }

    /// All tag assignments of a spot, by tag set.
    pub fn spot_tags(&self, spot: SpotKey) -> BTreeMap<TagSetId, TagId> {
        self.spot_tags.all(spot)
    }

    pub fn link_tags(&self, link: LinkKey) -> BTreeMap<TagSetId, TagId> {
        self.link_tags.all(link)
    }

    pub fn spots_with_tag(&self, tag_set: TagSetId, tag: TagId) -> Vec<SpotKey> {
        self.spot_tags.objects_with(tag_set, tag)
    }

    pub fn links_with_tag(&self, tag_set: TagSetId, tag: TagId) -> Vec<LinkKey> {
        self.link_tags.objects_with(tag_set, tag)
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    pub fn spot(&self, key: SpotKey) -> Option<&Spot> {
        self.inner.node_weight(key)
    }

    /// Label of a spot, defaulting to its pool index as text.
    pub fn label(&self, key: SpotKey) -> Option<String> {
        let spot = self.inner.node_weight(key)?;
        Some(
            spot.explicit_label()
                .map(str::to_string)
                .unwrap_or_else(|| key.index().to_string()),
        )
    }

    pub fn link_endpoints(&self, link: LinkKey) -> Option<(SpotKey, SpotKey)> {
        self.inner.edge_endpoints(link)
    }

    pub fn outgoing(&self, spot: SpotKey) -> &[LinkKey] {
        self.inner
            .node_weight(spot)
            .map(|s| s.outgoing.as_slice())
            .unwrap_or(&[])
    }

    pub fn incoming(&self, spot: SpotKey) -> &[LinkKey] {
        self.inner
            .node_weight(spot)
            .map(|s| s.incoming.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_spot(&self, key: SpotKey) -> bool {
        self.inner.contains_node(key)
    }

    pub fn contains_link(&self, key: LinkKey) -> bool {
        self.inner.edge_weight(key).is_some()
    }

    pub fn spots(&self) -> impl Iterator<Item = SpotKey> + '_ {
        self.inner.node_indices()
    }

    pub fn links(&self) -> impl Iterator<Item = LinkKey> + '_ {
        self.inner.edge_indices()
    }

    pub fn spot_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn spatio_temporal_index(&self) -> &SpatioTemporalIndex<SpotKey> {
        &self.index
    }

    /// Spatial index of one timepoint; `None` when it holds no spot.
    pub fn spatial_index(&self, timepoint: i32) -> Option<&SpatialIndex<SpotKey>> {
        self.index.spatial_index(timepoint)
    }

    // ----------------------------------------------------------------------
    // Undo / redo
    // ----------------------------------------------------------------------

    /// Close the current batch of edits into one undoable step.
    pub fn set_undo_point(&mut self) {
        self.undo.set_undo_point();
    }

    /// Revert the most recent step. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let mut recorder = std::mem::take(&mut self.undo);
        let done = recorder.undo(self);
        self.undo = recorder;
        done
    }

    /// Reapply the most recently undone step. Returns `false` if there is none.
    pub fn redo(&mut self) -> bool {
        let mut recorder = std::mem::take(&mut self.undo);
        let done = recorder.redo(self);
        self.undo = recorder;
        done
    }

    pub fn set_save_point(&mut self) {
        self.undo.set_save_point();
    }

    pub fn is_save_point(&self) -> bool {
        self.undo.is_save_point()
    }

    pub fn undo_recorder(&self) -> &UndoRecorder {
        &self.undo
    }

    // ----------------------------------------------------------------------
    // Listeners
    // ----------------------------------------------------------------------

    pub fn add_graph_listener(&mut self, listener: Arc<dyn GraphListener>) {
        self.listeners.graph.add(listener);
    }

    pub fn remove_graph_listener(&mut self, listener: &Arc<dyn GraphListener>) -> bool {
        self.listeners.graph.remove(listener)
    }

    pub fn add_graph_change_listener(&mut self, listener: Arc<dyn GraphChangeListener>) {
        self.listeners.change.add(listener);
    }

    pub fn remove_graph_change_listener(&mut self, listener: &Arc<dyn GraphChangeListener>) -> bool {
        self.listeners.change.remove(listener)
    }

    pub fn add_vertex_position_listener(&mut self, listener: Arc<dyn VertexPropertyListener>) {
        self.listeners.position.add(listener);
    }

    pub fn add_vertex_label_listener(&mut self, listener: Arc<dyn VertexPropertyListener>) {
        self.listeners.label.add(listener);
    }

    /// Fired when the covariance (and with it the bounding-sphere radius)
    /// of a spot changes.
    pub fn add_vertex_radius_listener(&mut self, listener: Arc<dyn VertexPropertyListener>) {
        self.listeners.radius.add(listener);
    }

    pub fn remove_vertex_property_listener(
        &mut self,
        listener: &Arc<dyn VertexPropertyListener>,
    ) -> bool {
        let a = self.listeners.position.remove(listener);
        let b = self.listeners.label.remove(listener);
        let c = self.listeners.radius.remove(listener);
        a || b || c
    }

    /// Fire `graph_changed` on change listeners if anything changed since
    /// the previous call.
    pub fn notify_graph_changed(&mut self) {
        if !self.changed_since_notify {
            return;
        }
        self.changed_since_notify = false;
        for l in self.listeners.change.iter() {
            l.graph_changed();
        }
    }

    // ----------------------------------------------------------------------
    // Primitives shared by live edits, undo replay and raw loading. They
    // keep the index current and fire listeners but never record.
    // ----------------------------------------------------------------------

    pub(crate) fn insert_spot(&mut self, mut spot: Spot) -> SpotKey {
        spot.incoming.clear();
        spot.outgoing.clear();
        let timepoint = spot.timepoint();
        let position = spot.position();
        let key = self.inner.add_node(spot);
        self.index.insert(timepoint, key, position);
        self.changed_since_notify = true;
        for l in self.listeners.graph.iter() {
            l.vertex_added(self, key);
        }
        key
    }

    /// Remove a spot that has no incident links left.
    pub(crate) fn detach_spot(&mut self, key: SpotKey) -> Option<Spot> {
        if let Some(spot) = self.inner.node_weight(key)
            && (!spot.incoming.is_empty() || !spot.outgoing.is_empty())
        {
            warn!("detaching spot {} with incident links", key.index());
            for link in self.incident_links(key).unwrap_or_default() {
                self.detach_link(link);
            }
        }
        let spot = self.inner.remove_node(key)?;
        self.index.remove(spot.timepoint(), key, spot.position());
        self.spot_tags.clear(key);
        self.changed_since_notify = true;
        for l in self.listeners.graph.iter() {
            l.vertex_removed(self, key, &spot);
        }
        Some(spot)
    }

    pub(crate) fn insert_link(
        &mut self,
        source: SpotKey,
        out_index: usize,
        target: SpotKey,
        in_index: usize,
    ) -> Option<LinkKey> {
        if !self.inner.contains_node(source) || !self.inner.contains_node(target) {
            return None;
        }
        let key = self.inner.add_edge(source, target, Link);
        let out_index = out_index.min(self.inner[source].outgoing.len());
        self.inner[source].outgoing.insert(out_index, key);
        let in_index = in_index.min(self.inner[target].incoming.len());
        self.inner[target].incoming.insert(in_index, key);
        self.changed_since_notify = true;
        for l in self.listeners.graph.iter() {
            l.edge_added(self, key);
        }
        Some(key)
    }

    pub(crate) fn detach_link(&mut self, key: LinkKey) -> Option<(SpotKey, SpotKey)> {
        let (source, target) = self.inner.edge_endpoints(key)?;
        self.inner[source].outgoing.retain(|&l| l != key);
        self.inner[target].incoming.retain(|&l| l != key);
        self.inner.remove_edge(key);
        self.link_tags.clear(key);
        self.changed_since_notify = true;
        for l in self.listeners.graph.iter() {
            l.edge_removed(self, key, source, target);
        }
        Some((source, target))
    }

    pub(crate) fn write_position(&mut self, key: SpotKey, position: [f64; 3]) -> Option<[f64; 3]> {
        let spot = self.inner.node_weight_mut(key)?;
        let timepoint = spot.timepoint();
        let old = spot.replace_position(position);
        self.index.relocate(timepoint, key, old, position);
        self.changed_since_notify = true;
        for l in self.listeners.position.iter() {
            l.property_changed(self, key);
        }
        Some(old)
    }

    pub(crate) fn write_covariance(
        &mut self,
        key: SpotKey,
        covariance: PackedCovariance,
        radius_squ: f64,
    ) -> Option<(PackedCovariance, f64)> {
        let spot = self.inner.node_weight_mut(key)?;
        let old = spot.replace_covariance(covariance, radius_squ);
        self.changed_since_notify = true;
        for l in self.listeners.radius.iter() {
            l.property_changed(self, key);
        }
        Some(old)
    }

    pub(crate) fn write_label(
        &mut self,
        key: SpotKey,
        label: Option<String>,
    ) -> Option<Option<String>> {
        let spot = self.inner.node_weight_mut(key)?;
        let old = spot.replace_label(label);
        self.changed_since_notify = true;
        for l in self.listeners.label.iter() {
            l.property_changed(self, key);
        }
        Some(old)
    }

    pub(crate) fn write_spot_tag(
        &mut self,
        key: SpotKey,
        tag_set: TagSetId,
        tag: Option<TagId>,
    ) -> Option<Option<TagId>> {
        if !self.inner.contains_node(key) {
            return None;
        }
        self.changed_since_notify = true;
        Some(self.spot_tags.set(key, tag_set, tag))
    }

    pub(crate) fn write_link_tag(
        &mut self,
        key: LinkKey,
        tag_set: TagSetId,
        tag: Option<TagId>,
    ) -> Option<Option<TagId>> {
        if self.inner.edge_weight(key).is_none() {
            return None;
        }
        self.changed_since_notify = true;
        Some(self.link_tags.set(key, tag_set, tag))
    }

    pub(crate) fn replace_tag_set_structure(&mut self, structure: TagSetStructure) -> TagSetStructure {
        self.changed_since_notify = true;
        std::mem::replace(&mut self.tag_structure, structure)
    }

    /// Swap a recorded spot property value in, returning the value it
    /// replaced.
    pub(crate) fn swap_spot_property(
        &mut self,
        key: SpotKey,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        Some(match value {
            PropertyValue::Position(position) => {
                PropertyValue::Position(self.write_position(key, position)?)
            }
            PropertyValue::Covariance {
                covariance,
                radius_squ,
            } => {
                let (covariance, radius_squ) =
                    self.write_covariance(key, covariance, radius_squ)?;
                PropertyValue::Covariance {
                    covariance,
                    radius_squ,
                }
            }
            PropertyValue::Label(label) => PropertyValue::Label(self.write_label(key, label)?),
            PropertyValue::Tag { tag_set, tag } => PropertyValue::Tag {
                tag_set,
                tag: self.write_spot_tag(key, tag_set, tag)?,
            },
        })
    }

    pub(crate) fn swap_link_property(
        &mut self,
        key: LinkKey,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        match value {
            PropertyValue::Tag { tag_set, tag } => Some(PropertyValue::Tag {
                tag_set,
                tag: self.write_link_tag(key, tag_set, tag)?,
            }),
            other => {
                warn!("links carry no {other:?} property");
                None
            }
        }
    }

    /// Full attribute state of a spot, as recorded for undo.
    pub(crate) fn spot_record(&self, key: SpotKey) -> SpotRecord {
        SpotRecord::new(
            self.inner.node_weight(key).map(Spot::to_persisted),
            &self.spot_tags.all(key),
        )
    }

    pub(crate) fn link_record(&self, key: LinkKey) -> LinkRecord {
        LinkRecord::new(&self.link_tags.all(key))
    }

    /// Positions of a link in its source's outgoing and target's incoming
    /// lists.
    pub(crate) fn link_positions(&self, key: LinkKey) -> Option<(usize, usize)> {
        let (source, target) = self.inner.edge_endpoints(key)?;
        let out_index = self.inner[source].outgoing.iter().position(|&l| l == key)?;
        let in_index = self.inner[target].incoming.iter().position(|&l| l == key)?;
        Some((out_index, in_index))
    }

    fn incident_links(&self, key: SpotKey) -> Option<Vec<LinkKey>> {
        let spot = self.inner.node_weight(key)?;
        let mut links: Vec<LinkKey> = spot
            .outgoing
            .iter()
            .chain(spot.incoming.iter())
            .copied()
            .collect();
        // A self-loop shows up in both lists.
        links.sort_unstable();
        links.dedup();
        Some(links)
    }

    /// Replace the graph content with `loaded`, keeping listeners. History
    /// is cleared and `graph_rebuilt` fires.
    pub(crate) fn replace_contents(&mut self, loaded: ModelGraph) {
        let ModelGraph {
            inner,
            index,
            tag_structure,
            spot_tags,
            link_tags,
            ..
        } = loaded;
        self.inner = inner;
        self.index = index;
        self.tag_structure = tag_structure;
        self.spot_tags = spot_tags;
        self.link_tags = link_tags;
        self.undo.clear();
        self.changed_since_notify = true;
        for l in self.listeners.graph.iter() {
            l.graph_rebuilt(self);
        }
    }
}
