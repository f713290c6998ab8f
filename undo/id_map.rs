/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Stable undo ids for pool keys.
//!
//! A spot removed and later restored by undo may land at a different pool
//! index, so recorded edits name objects by an [`UndoId`] that is rebound
//! to the new key on re-creation.

use std::collections::HashMap;
use std::hash::Hash;

use crate::graph::{LinkKey, SpotKey};

pub type UndoId = u32;

#[derive(Debug)]
pub(crate) struct UndoIdBimap<K> {
    next: UndoId,
    to_key: HashMap<UndoId, K>,
    to_id: HashMap<K, UndoId>,
}

impl<K> Default for UndoIdBimap<K> {
    fn default() -> Self {
        Self {
            next: 0,
            to_key: HashMap::new(),
            to_id: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> UndoIdBimap<K> {
    pub(crate) fn get_or_assign(&mut self, key: K) -> UndoId {
        if let Some(&id) = self.to_id.get(&key) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.to_key.insert(id, key);
        self.to_id.insert(key, id);
        id
    }

    pub(crate) fn key(&self, id: UndoId) -> Option<K> {
        self.to_key.get(&id).copied()
    }

    /// Bind `id` to a (re-created) key, replacing any binding either side
    /// had.
    pub(crate) fn bind(&mut self, id: UndoId, key: K) {
        if let Some(old_key) = self.to_key.insert(id, key) {
            self.to_id.remove(&old_key);
        }
        if let Some(old_id) = self.to_id.insert(key, id)
            && old_id != id
        {
            self.to_key.remove(&old_id);
        }
    }

    /// Forget the key of a removed object. Its id stays reserved.
    pub(crate) fn unbind_key(&mut self, key: K) {
        if let Some(id) = self.to_id.remove(&key) {
            self.to_key.remove(&id);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.to_key.clear();
        self.to_id.clear();
    }
}

#[derive(Debug, Default)]
pub(crate) struct UndoIdMaps {
    pub(crate) spots: UndoIdBimap<SpotKey>,
    pub(crate) links: UndoIdBimap<LinkKey>,
}

impl UndoIdMaps {
    pub(crate) fn clear(&mut self) {
        self.spots.clear();
        self.links.clear();
    }
}
