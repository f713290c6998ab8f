/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Undo/redo history of a model graph.
//!
//! The recorder is a log of edits with a cursor. Edits between two undo
//! points form one step. Replay goes through the same graph primitives as
//! live editing, so the spatial index and listeners see replayed changes
//! exactly like live ones.

use log::{debug, warn};
use rkyv::rancor;
use rkyv::util::AlignedVec;

use crate::graph::{LinkKey, ModelGraph, SpotKey};
use crate::tags::TagSetStructure;

mod edit;
mod id_map;

pub use edit::PropertyValue;
pub use id_map::UndoId;

pub(crate) use edit::{LinkRecord, SpotRecord};

use edit::{LinkPlacement, UndoableEdit};
use id_map::UndoIdMaps;

#[derive(Debug)]
struct Entry {
    edit: UndoableEdit,
    /// Set on the last edit of a step.
    closes_step: bool,
}

#[derive(Debug)]
pub struct UndoRecorder {
    entries: Vec<Entry>,
    /// Number of applied entries.
    cursor: usize,
    /// Cursor position marked by `set_save_point`. `None` once that
    /// position has been truncated away.
    save_point: Option<usize>,
    ids: UndoIdMaps,
}

impl Default for UndoRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoRecorder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            save_point: Some(0),
            ids: UndoIdMaps::default(),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Number of steps that `undo` can revert.
    pub fn undo_steps(&self) -> usize {
        let applied = &self.entries[..self.cursor];
        let closed = applied.iter().filter(|e| e.closes_step).count();
        match applied.last() {
            Some(last) if !last.closes_step => closed + 1,
            _ => closed,
        }
    }

    pub fn is_save_point(&self) -> bool {
        self.save_point == Some(self.cursor)
    }

    pub(crate) fn set_save_point(&mut self) {
        self.save_point = Some(self.cursor);
    }

    pub(crate) fn set_undo_point(&mut self) {
        if let Some(last) = self.cursor.checked_sub(1).and_then(|i| self.entries.get_mut(i)) {
            last.closes_step = true;
        }
    }

    /// Forget all history; the current state becomes the save point.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.save_point = Some(0);
        self.ids.clear();
    }

    pub(crate) fn undo(&mut self, graph: &mut ModelGraph) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.set_undo_point();
        let mut reverted = 0;
        loop {
            self.cursor -= 1;
            self.entries[self.cursor].edit.undo(graph, &mut self.ids);
            reverted += 1;
            if self.cursor == 0 || self.entries[self.cursor - 1].closes_step {
                break;
            }
        }
        debug!("undo reverted {reverted} edits, cursor at {}", self.cursor);
        true
    }

    pub(crate) fn redo(&mut self, graph: &mut ModelGraph) -> bool {
        if self.cursor == self.entries.len() {
            return false;
        }
        let mut applied = 0;
        loop {
            self.entries[self.cursor].edit.redo(graph, &mut self.ids);
            self.cursor += 1;
            applied += 1;
            if self.cursor == self.entries.len() || self.entries[self.cursor - 1].closes_step {
                break;
            }
        }
        debug!("redo applied {applied} edits, cursor at {}", self.cursor);
        true
    }

    fn push(&mut self, edit: UndoableEdit) {
        if self.cursor < self.entries.len() {
            self.entries.truncate(self.cursor);
            if self.save_point.is_some_and(|s| s > self.cursor) {
                self.save_point = None;
            }
        }
        self.entries.push(Entry {
            edit,
            closes_step: false,
        });
        self.cursor += 1;
    }

    /// Keep a serialized record, or drop the whole history if it failed.
    fn keep(&mut self, bytes: Result<AlignedVec, rancor::Error>) -> Option<AlignedVec> {
        match bytes {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("failed to serialize undo record, dropping history: {e}");
                self.clear();
                None
            }
        }
    }

    pub(crate) fn record_add_spot(&mut self, key: SpotKey, record: SpotRecord) {
        let id = self.ids.spots.get_or_assign(key);
        if let Some(attributes) = self.keep(rkyv::to_bytes::<rancor::Error>(&record)) {
            self.push(UndoableEdit::AddSpot { id, attributes });
        }
    }

    /// Must be called before the spot leaves the pool.
    pub(crate) fn record_remove_spot(&mut self, key: SpotKey, record: SpotRecord) {
        let id = self.ids.spots.get_or_assign(key);
        self.ids.spots.unbind_key(key);
        if let Some(attributes) = self.keep(rkyv::to_bytes::<rancor::Error>(&record)) {
            self.push(UndoableEdit::RemoveSpot { id, attributes });
        }
    }

    pub(crate) fn record_add_link(
        &mut self,
        key: LinkKey,
        source: SpotKey,
        target: SpotKey,
        out_index: usize,
        in_index: usize,
        record: LinkRecord,
    ) {
        let id = self.ids.links.get_or_assign(key);
        let placement = self.placement(source, target, out_index, in_index);
        if let Some(attributes) = self.keep(rkyv::to_bytes::<rancor::Error>(&record)) {
            self.push(UndoableEdit::AddLink {
                id,
                placement,
                attributes,
            });
        }
    }

    /// Must be called before the link leaves the pool.
    pub(crate) fn record_remove_link(
        &mut self,
        key: LinkKey,
        source: SpotKey,
        target: SpotKey,
        out_index: usize,
        in_index: usize,
        record: LinkRecord,
    ) {
        let id = self.ids.links.get_or_assign(key);
        self.ids.links.unbind_key(key);
        let placement = self.placement(source, target, out_index, in_index);
        if let Some(attributes) = self.keep(rkyv::to_bytes::<rancor::Error>(&record)) {
            self.push(UndoableEdit::RemoveLink {
                id,
                placement,
                attributes,
            });
        }
    }

    /// `old` is the value the property had before the edit.
    pub(crate) fn record_spot_property(&mut self, key: SpotKey, old: PropertyValue) {
        let id = self.ids.spots.get_or_assign(key);
        self.push(UndoableEdit::SpotProperty { id, value: old });
    }

    pub(crate) fn record_link_property(&mut self, key: LinkKey, old: PropertyValue) {
        let id = self.ids.links.get_or_assign(key);
        self.push(UndoableEdit::LinkProperty { id, value: old });
    }

    pub(crate) fn record_tag_set_structure(&mut self, old: TagSetStructure) {
        self.push(UndoableEdit::TagSetStructure { structure: old });
    }

    fn placement(
        &mut self,
        source: SpotKey,
        target: SpotKey,
        out_index: usize,
        in_index: usize,
    ) -> LinkPlacement {
        LinkPlacement {
            source: self.ids.spots.get_or_assign(source),
            target: self.ids.spots.get_or_assign(target),
            out_index,
            in_index,
        }
    }
}
