/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tag sets and per-object tag assignments.
//!
//! A [`TagSetStructure`] declares tag sets and their tags; each spot or link
//! carries at most one tag per tag set. Identifiers come from counters owned
//! by the structure, so two models never share id state.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

pub type TagSetId = u32;
pub type TagId = u32;

/// ARGB colour, `0xAARRGGBB`.
pub type Color = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub label: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    pub id: TagSetId,
    pub name: String,
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }

    pub fn tag_by_label(&self, label: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.label == label)
    }
}

/// Ordered list of tag sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSetStructure {
    tag_sets: Vec<TagSet>,
    next_tag_set_id: TagSetId,
    next_tag_id: TagId,
}

impl TagSetStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty tag set. `None` once the id space is used up.
    pub fn create_tag_set(&mut self, name: impl Into<String>) -> Option<TagSetId> {
        let id = self.next_tag_set_id;
        self.next_tag_set_id = id.checked_add(1)?;
        self.tag_sets.push(TagSet {
            id,
            name: name.into(),
            tags: Vec::new(),
        });
        Some(id)
    }

    /// Add a tag to `tag_set`. `None` if the tag set does not exist or the
    /// id space is used up.
    pub fn create_tag(
        &mut self,
        tag_set: TagSetId,
        label: impl Into<String>,
        color: Color,
    ) -> Option<TagId> {
        let set = self.tag_sets.iter_mut().find(|s| s.id == tag_set)?;
        let id = self.next_tag_id;
        self.next_tag_id = id.checked_add(1)?;
        set.tags.push(Tag {
            id,
            label: label.into(),
            color,
        });
        Some(id)
    }

    pub fn tag_set(&self, id: TagSetId) -> Option<&TagSet> {
        self.tag_sets.iter().find(|s| s.id == id)
    }

    pub fn tag_set_by_name(&self, name: &str) -> Option<&TagSet> {
        self.tag_sets.iter().find(|s| s.name == name)
    }

    pub fn tag_sets(&self) -> &[TagSet] {
        &self.tag_sets
    }

    pub fn remove_tag_set(&mut self, id: TagSetId) -> bool {
        let before = self.tag_sets.len();
        self.tag_sets.retain(|s| s.id != id);
        self.tag_sets.len() != before
    }

    pub fn remove_tag(&mut self, tag_set: TagSetId, tag: TagId) -> bool {
        let Some(set) = self.tag_sets.iter_mut().find(|s| s.id == tag_set) else {
            return false;
        };
        let before = set.tags.len();
        set.tags.retain(|t| t.id != tag);
        set.tags.len() != before
    }

    pub fn contains_tag(&self, tag_set: TagSetId, tag: TagId) -> bool {
        self.tag_set(tag_set).is_some_and(|s| s.tag(tag).is_some())
    }

    pub(crate) fn counters(&self) -> (TagSetId, TagId) {
        (self.next_tag_set_id, self.next_tag_id)
    }

    /// Reassemble a structure from stored parts. Counters are raised past
    /// every id in use. `None` if an id or counter sits at the top of the
    /// id space, leaving no room for the next id.
    pub(crate) fn from_parts(
        sets: Vec<(TagSetId, String, Vec<Tag>)>,
        counters: (TagSetId, TagId),
    ) -> Option<Self> {
        let (mut next_tag_set_id, mut next_tag_id) = counters;
        if next_tag_set_id == TagSetId::MAX || next_tag_id == TagId::MAX {
            return None;
        }
        let tag_sets: Vec<TagSet> = sets
            .into_iter()
            .map(|(id, name, tags)| TagSet { id, name, tags })
            .collect();
        for set in &tag_sets {
            next_tag_set_id = next_tag_set_id.max(set.id.checked_add(1)?);
            for tag in &set.tags {
                next_tag_id = next_tag_id.max(tag.id.checked_add(1)?);
            }
        }
        Some(Self {
            tag_sets,
            next_tag_set_id,
            next_tag_id,
        })
    }
}

/// Per-object assignment of one tag per tag set.
#[derive(Debug, Clone)]
pub(crate) struct TagAssignments<K> {
    by_object: HashMap<K, BTreeMap<TagSetId, TagId>>,
}

impl<K> Default for TagAssignments<K> {
    fn default() -> Self {
        Self {
            by_object: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> TagAssignments<K> {
    pub(crate) fn get(&self, key: K, tag_set: TagSetId) -> Option<TagId> {
        self.by_object.get(&key)?.get(&tag_set).copied()
    }

    pub(crate) fn all(&self, key: K) -> BTreeMap<TagSetId, TagId> {
        self.by_object.get(&key).cloned().unwrap_or_default()
    }

    /// Set or clear, returning the previous assignment.
    pub(crate) fn set(&mut self, key: K, tag_set: TagSetId, tag: Option<TagId>) -> Option<TagId> {
        match tag {
            Some(tag) => self.by_object.entry(key).or_default().insert(tag_set, tag),
            None => {
                let map = self.by_object.get_mut(&key)?;
                let old = map.remove(&tag_set);
                if map.is_empty() {
                    self.by_object.remove(&key);
                }
                old
            }
        }
    }

    pub(crate) fn clear(&mut self, key: K) {
        self.by_object.remove(&key);
    }

    /// Objects carrying `tag`, sorted by key.
    pub(crate) fn objects_with(&self, tag_set: TagSetId, tag: TagId) -> Vec<K> {
        let mut objects: Vec<K> = self
            .by_object
            .iter()
            .filter(|(_, map)| map.get(&tag_set) == Some(&tag))
            .map(|(&key, _)| key)
            .collect();
        objects.sort_unstable();
        objects
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, TagSetId, TagId)> + '_ {
        self.by_object
            .iter()
            .flat_map(|(&key, map)| map.iter().map(move |(&set, &tag)| (key, set, tag)))
    }
}
