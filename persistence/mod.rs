/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Raw model files: zstd-compressed rkyv snapshots of the whole graph.
//!
//! Layout: the 8-byte magic `LNRAW001`, then a zstd stream holding one
//! archived [`types::RawModel`]. Objects are renumbered with dense file ids
//! on save; the returned id maps relate file ids and pool keys.

use std::collections::HashMap;
use std::io::{Read, Write};

use log::debug;
use rkyv::rancor;
use rkyv::util::AlignedVec;

use crate::graph::{LinkKey, ModelGraph, Spot, SpotKey};
use crate::tags::{Tag, TagSetStructure};

pub mod types;

use types::{
    PersistedLink, PersistedTag, PersistedTagAssignment, PersistedTagSet, RawModel,
};

pub const RAW_MAGIC: &[u8; 8] = b"LNRAW001";
pub const RAW_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// Errors from raw model IO.
#[derive(Debug, thiserror::Error)]
pub enum RawIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a raw model file")]
    BadMagic,
    #[error("compression error: {0}")]
    Compression(#[source] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] rancor::Error),
    #[error("unsupported raw model version {0}")]
    UnsupportedVersion(u32),
    #[error("corrupt raw model: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, RawIoError>;

/// Pool key to file id, as produced by a save.
#[derive(Debug, Default, Clone)]
pub struct GraphToFileIdMap {
    spots: HashMap<SpotKey, u32>,
    links: HashMap<LinkKey, u32>,
}

impl GraphToFileIdMap {
    pub fn spot(&self, key: SpotKey) -> Option<u32> {
        self.spots.get(&key).copied()
    }

    pub fn link(&self, key: LinkKey) -> Option<u32> {
        self.links.get(&key).copied()
    }
}

/// File id to pool key, as produced by a load.
#[derive(Debug, Default, Clone)]
pub struct FileIdToGraphMap {
    spots: Vec<SpotKey>,
    links: Vec<LinkKey>,
}

impl FileIdToGraphMap {
    pub fn spot(&self, file_id: u32) -> Option<SpotKey> {
        self.spots.get(file_id as usize).copied()
    }

    pub fn link(&self, file_id: u32) -> Option<LinkKey> {
        self.links.get(file_id as usize).copied()
    }
}

/// Result of reading a raw file, not yet attached to any model.
pub(crate) struct LoadedModel {
    pub(crate) graph: ModelGraph,
    pub(crate) space_units: String,
    pub(crate) time_units: String,
    pub(crate) ids: FileIdToGraphMap,
}

/// Write `graph` to `writer`.
pub fn write_raw<W: Write>(
    graph: &ModelGraph,
    space_units: &str,
    time_units: &str,
    mut writer: W,
) -> Result<GraphToFileIdMap> {
    let mut ids = GraphToFileIdMap::default();
    let mut spots = Vec::with_capacity(graph.spot_count());
    for key in graph.spots() {
        let Some(spot) = graph.spot(key) else {
            continue;
        };
        ids.spots.insert(key, spots.len() as u32);
        spots.push(spot.to_persisted());
    }

    let mut links = Vec::with_capacity(graph.link_count());
    for key in graph.spots() {
        let Some(&source) = ids.spots.get(&key) else {
            continue;
        };
        for &link in graph.outgoing(key) {
            let Some((_, target_key)) = graph.link_endpoints(link) else {
                continue;
            };
            let (Some(&target), Some(in_index)) = (
                ids.spots.get(&target_key),
                graph.incoming(target_key).iter().position(|&l| l == link),
            ) else {
                continue;
            };
            ids.links.insert(link, links.len() as u32);
            links.push(PersistedLink {
                source,
                target,
                in_index: in_index as u32,
            });
        }
    }

    let structure = graph.tag_set_structure();
    let tag_sets = structure
        .tag_sets()
        .iter()
        .map(|set| PersistedTagSet {
            id: set.id,
            name: set.name.clone(),
            tags: set
                .tags()
                .iter()
                .map(|t| PersistedTag {
                    id: t.id,
                    label: t.label.clone(),
                    color: t.color,
                })
                .collect(),
        })
        .collect();

    let mut spot_tags = Vec::new();
    for (&key, &object) in &ids.spots {
        for (tag_set, tag) in graph.spot_tags(key) {
            spot_tags.push(PersistedTagAssignment {
                object,
                tag_set,
                tag,
            });
        }
    }
    spot_tags.sort_by_key(|a| (a.object, a.tag_set));

    let mut link_tags = Vec::new();
    for (&key, &object) in &ids.links {
        for (tag_set, tag) in graph.link_tags(key) {
            link_tags.push(PersistedTagAssignment {
                object,
                tag_set,
                tag,
            });
        }
    }
    link_tags.sort_by_key(|a| (a.object, a.tag_set));

    let raw = RawModel {
        version: RAW_VERSION,
        space_units: space_units.to_string(),
        time_units: time_units.to_string(),
        spots,
        links,
        tag_sets,
        tag_counters: structure.counters(),
        spot_tags,
        link_tags,
    };

    let bytes = rkyv::to_bytes::<rancor::Error>(&raw)?;
    let compressed = zstd::stream::encode_all(std::io::Cursor::new(bytes.as_slice()), ZSTD_LEVEL)
        .map_err(RawIoError::Compression)?;
    writer.write_all(RAW_MAGIC)?;
    writer.write_all(&compressed)?;
    writer.flush()?;
    debug!(
        "wrote raw model: {} spots, {} links, {} compressed bytes",
        raw.spots.len(),
        raw.links.len(),
        compressed.len()
    );
    Ok(ids)
}

/// Read a raw model into a fresh graph. Nothing is built unless the whole
/// file decodes and every reference in it resolves.
pub(crate) fn read_raw<R: Read>(mut reader: R) -> Result<LoadedModel> {
    let mut stored = Vec::new();
    reader.read_to_end(&mut stored)?;
    let Some(compressed) = stored.strip_prefix(RAW_MAGIC.as_slice()) else {
        return Err(RawIoError::BadMagic);
    };
    let plaintext = zstd::stream::decode_all(std::io::Cursor::new(compressed))
        .map_err(RawIoError::Compression)?;
    let mut aligned = AlignedVec::<16>::new();
    aligned.extend_from_slice(&plaintext);
    let raw = rkyv::from_bytes::<RawModel, rancor::Error>(&aligned)?;

    if raw.version != RAW_VERSION {
        return Err(RawIoError::UnsupportedVersion(raw.version));
    }
    let structure = TagSetStructure::from_parts(
        raw.tag_sets
            .iter()
            .map(|set| {
                let tags = set
                    .tags
                    .iter()
                    .map(|t| Tag {
                        id: t.id,
                        label: t.label.clone(),
                        color: t.color,
                    })
                    .collect();
                (set.id, set.name.clone(), tags)
            })
            .collect(),
        raw.tag_counters,
    )
    .ok_or_else(|| RawIoError::Corrupt("tag id out of range".to_string()))?;
    validate(&raw, &structure)?;

    let mut graph = ModelGraph::with_capacity(raw.spots.len());
    let mut ids = FileIdToGraphMap::default();
    for spot in &raw.spots {
        ids.spots.push(graph.insert_spot(Spot::from_persisted(spot)));
    }
    for link in &raw.links {
        let source = ids.spots[link.source as usize];
        let target = ids.spots[link.target as usize];
        let key = graph
            .insert_link(source, usize::MAX, target, usize::MAX)
            .ok_or_else(|| RawIoError::Corrupt("link endpoint vanished".to_string()))?;
        ids.links.push(key);
    }
    restore_incoming_order(&mut graph, &raw.links, &ids.links);

    graph.replace_tag_set_structure(structure);
    for a in &raw.spot_tags {
        graph.write_spot_tag(ids.spots[a.object as usize], a.tag_set, Some(a.tag));
    }
    for a in &raw.link_tags {
        graph.write_link_tag(ids.links[a.object as usize], a.tag_set, Some(a.tag));
    }

    debug!(
        "read raw model: {} spots, {} links",
        raw.spots.len(),
        raw.links.len()
    );
    Ok(LoadedModel {
        graph,
        space_units: raw.space_units,
        time_units: raw.time_units,
        ids,
    })
}

fn validate(raw: &RawModel, structure: &TagSetStructure) -> Result<()> {
    let spot_count = raw.spots.len() as u32;
    if let Some(link) = raw
        .links
        .iter()
        .find(|l| l.source >= spot_count || l.target >= spot_count)
    {
        return Err(RawIoError::Corrupt(format!(
            "link {} -> {} refers past {spot_count} spots",
            link.source, link.target
        )));
    }
    let check = |assignments: &[PersistedTagAssignment], objects: u32, what: &str| {
        for a in assignments {
            if a.object >= objects {
                return Err(RawIoError::Corrupt(format!(
                    "tag assignment to missing {what} {}",
                    a.object
                )));
            }
            if !structure.contains_tag(a.tag_set, a.tag) {
                return Err(RawIoError::Corrupt(format!(
                    "unknown tag {} of tag set {}",
                    a.tag, a.tag_set
                )));
            }
        }
        Ok(())
    };
    check(&raw.spot_tags, spot_count, "spot")?;
    check(&raw.link_tags, raw.links.len() as u32, "link")?;
    Ok(())
}

/// Links were appended in source order; sort every incoming list by the
/// stored positions.
fn restore_incoming_order(graph: &mut ModelGraph, links: &[PersistedLink], keys: &[LinkKey]) {
    let position: HashMap<LinkKey, u32> = keys
        .iter()
        .zip(links)
        .map(|(&key, link)| (key, link.in_index))
        .collect();
    for spot in graph.inner.node_weights_mut() {
        if spot.incoming.len() > 1 {
            spot.incoming
                .sort_by_key(|l| position.get(l).copied().unwrap_or(u32::MAX));
        }
    }
}
