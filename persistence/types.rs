/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serializable types shared by raw files and undo records.

use rkyv::{Archive, Deserialize, Serialize};

/// Attribute state of a spot, without topology.
#[derive(Archive, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PersistedSpot {
    pub timepoint: i32,
    pub position: [f64; 3],
    /// Packed upper triangle `xx, xy, xz, yy, yz, zz`.
    pub covariance: [f64; 6],
    pub bounding_sphere_radius_squ: f64,
    pub label: Option<String>,
}

/// A link as a pair of file ids, stored in source-outgoing order so that
/// reloading in sequence restores the outgoing lists.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistedLink {
    pub source: u32,
    pub target: u32,
    /// Position in the target's incoming list.
    pub in_index: u32,
}

#[derive(Archive, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PersistedTag {
    pub id: u32,
    pub label: String,
    pub color: u32,
}

#[derive(Archive, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PersistedTagSet {
    pub id: u32,
    pub name: String,
    pub tags: Vec<PersistedTag>,
}

/// One tag assignment of the object with file id `object`.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistedTagAssignment {
    pub object: u32,
    pub tag_set: u32,
    pub tag: u32,
}

/// `(tag set, tag)` pair of a single object.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistedTagPair {
    pub tag_set: u32,
    pub tag: u32,
}

/// Whole-model snapshot written by `Model::save_raw`.
#[derive(Archive, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RawModel {
    pub version: u32,
    pub space_units: String,
    pub time_units: String,
    /// Spots in file-id order.
    pub spots: Vec<PersistedSpot>,
    pub links: Vec<PersistedLink>,
    pub tag_sets: Vec<PersistedTagSet>,
    /// Next tag-set id and next tag id.
    pub tag_counters: (u32, u32),
    pub spot_tags: Vec<PersistedTagAssignment>,
    /// `object` is the link's position in `links`.
    pub link_tags: Vec<PersistedTagAssignment>,
}
