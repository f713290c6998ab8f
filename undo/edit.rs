/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Recorded edits and their replay.

use std::collections::BTreeMap;

use log::warn;
use rkyv::rancor;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use super::id_map::{UndoId, UndoIdMaps};
use crate::graph::spot::PackedCovariance;
use crate::graph::{ModelGraph, Spot};
use crate::persistence::types::{PersistedSpot, PersistedTagPair};
use crate::tags::{TagId, TagSetId, TagSetStructure};

/// Value of an undoable property, as swapped in and out on replay.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Position([f64; 3]),
    /// Covariance and the radius derived from it travel together.
    Covariance {
        covariance: PackedCovariance,
        radius_squ: f64,
    },
    Label(Option<String>),
    Tag {
        tag_set: TagSetId,
        tag: Option<TagId>,
    },
}

/// Full attribute state of a spot at add/remove time.
#[derive(Archive, Serialize, Deserialize, Clone, Debug)]
pub(crate) struct SpotRecord {
    pub(crate) spot: Option<PersistedSpot>,
    pub(crate) tags: Vec<PersistedTagPair>,
}

impl SpotRecord {
    pub(crate) fn new(spot: Option<PersistedSpot>, tags: &BTreeMap<TagSetId, TagId>) -> Self {
        Self {
            spot,
            tags: tag_pairs(tags),
        }
    }
}

#[derive(Archive, Serialize, Deserialize, Clone, Debug)]
pub(crate) struct LinkRecord {
    pub(crate) tags: Vec<PersistedTagPair>,
}

impl LinkRecord {
    pub(crate) fn new(tags: &BTreeMap<TagSetId, TagId>) -> Self {
        Self {
            tags: tag_pairs(tags),
        }
    }
}

fn tag_pairs(tags: &BTreeMap<TagSetId, TagId>) -> Vec<PersistedTagPair> {
    tags.iter()
        .map(|(&tag_set, &tag)| PersistedTagPair { tag_set, tag })
        .collect()
}

/// Topology of a recorded link: endpoint ids and list positions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkPlacement {
    pub(crate) source: UndoId,
    pub(crate) target: UndoId,
    pub(crate) out_index: usize,
    pub(crate) in_index: usize,
}

#[derive(Debug)]
pub(crate) enum UndoableEdit {
    AddSpot {
        id: UndoId,
        attributes: AlignedVec,
    },
    RemoveSpot {
        id: UndoId,
        attributes: AlignedVec,
    },
    AddLink {
        id: UndoId,
        placement: LinkPlacement,
        attributes: AlignedVec,
    },
    RemoveLink {
        id: UndoId,
        placement: LinkPlacement,
        attributes: AlignedVec,
    },
    SpotProperty {
        id: UndoId,
        value: PropertyValue,
    },
    LinkProperty {
        id: UndoId,
        value: PropertyValue,
    },
    TagSetStructure {
        structure: TagSetStructure,
    },
}

impl UndoableEdit {
    /// Revert this edit.
    pub(crate) fn undo(&mut self, graph: &mut ModelGraph, ids: &mut UndoIdMaps) {
        match self {
            Self::AddSpot { id, .. } => erase_spot(graph, ids, *id),
            Self::RemoveSpot { id, attributes } => restore_spot(graph, ids, *id, attributes),
            Self::AddLink { id, .. } => erase_link(graph, ids, *id),
            Self::RemoveLink {
                id,
                placement,
                attributes,
            } => restore_link(graph, ids, *id, placement, attributes),
            _ => self.swap(graph, ids),
        }
    }

    /// Reapply this edit.
    pub(crate) fn redo(&mut self, graph: &mut ModelGraph, ids: &mut UndoIdMaps) {
        match self {
            Self::AddSpot { id, attributes } => restore_spot(graph, ids, *id, attributes),
            Self::RemoveSpot { id, .. } => erase_spot(graph, ids, *id),
            Self::AddLink {
                id,
                placement,
                attributes,
            } => restore_link(graph, ids, *id, placement, attributes),
            Self::RemoveLink { id, .. } => erase_link(graph, ids, *id),
            _ => self.swap(graph, ids),
        }
    }

    /// Property edits are their own inverse: the stored value and the live
    /// one trade places.
    fn swap(&mut self, graph: &mut ModelGraph, ids: &mut UndoIdMaps) {
        match self {
            Self::SpotProperty { id, value } => {
                let Some(key) = ids.spots.key(*id) else {
                    warn!("undo: spot {id} is gone, skipping property edit");
                    return;
                };
                if let Some(old) = graph.swap_spot_property(key, value.clone()) {
                    *value = old;
                }
            }
            Self::LinkProperty { id, value } => {
                let Some(key) = ids.links.key(*id) else {
                    warn!("undo: link {id} is gone, skipping property edit");
                    return;
                };
                if let Some(old) = graph.swap_link_property(key, value.clone()) {
                    *value = old;
                }
            }
            Self::TagSetStructure { structure } => {
                let incoming = std::mem::take(structure);
                *structure = graph.replace_tag_set_structure(incoming);
            }
            _ => {}
        }
    }
}

fn erase_spot(graph: &mut ModelGraph, ids: &mut UndoIdMaps, id: UndoId) {
    let Some(key) = ids.spots.key(id) else {
        warn!("undo: spot {id} is not bound");
        return;
    };
    ids.spots.unbind_key(key);
    graph.detach_spot(key);
}

fn restore_spot(graph: &mut ModelGraph, ids: &mut UndoIdMaps, id: UndoId, attributes: &AlignedVec) {
    let record = match rkyv::from_bytes::<SpotRecord, rancor::Error>(attributes) {
        Ok(record) => record,
        Err(e) => {
            warn!("undo: failed to read spot record: {e}");
            return;
        }
    };
    let Some(persisted) = record.spot else {
        warn!("undo: spot record {id} carries no attributes");
        return;
    };
    let key = graph.insert_spot(Spot::from_persisted(&persisted));
    for pair in record.tags {
        graph.write_spot_tag(key, pair.tag_set, Some(pair.tag));
    }
    ids.spots.bind(id, key);
}

fn erase_link(graph: &mut ModelGraph, ids: &mut UndoIdMaps, id: UndoId) {
    let Some(key) = ids.links.key(id) else {
        warn!("undo: link {id} is not bound");
        return;
    };
    ids.links.unbind_key(key);
    graph.detach_link(key);
}

fn restore_link(
    graph: &mut ModelGraph,
    ids: &mut UndoIdMaps,
    id: UndoId,
    placement: &LinkPlacement,
    attributes: &AlignedVec,
) {
    let (Some(source), Some(target)) = (
        ids.spots.key(placement.source),
        ids.spots.key(placement.target),
    ) else {
        warn!("undo: endpoints of link {id} are gone");
        return;
    };
    let record = match rkyv::from_bytes::<LinkRecord, rancor::Error>(attributes) {
        Ok(record) => record,
        Err(e) => {
            warn!("undo: failed to read link record: {e}");
            return;
        }
    };
    let Some(key) = graph.insert_link(source, placement.out_index, target, placement.in_index)
    else {
        return;
    };
    for pair in record.tags {
        graph.write_link_tag(key, pair.tag_set, Some(pair.tag));
    }
    ids.links.bind(id, key);
}
