/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Feature registry: named numeric projections computed on spots, links
//! and branch spots.
//!
//! Features are evaluated on demand against the current graph; nothing is
//! cached here.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::branch::{BranchSpotKey, ModelBranchGraph};
use crate::graph::{LinkKey, ModelGraph, SpotKey};

/// Physical dimension of a projection; decides its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    None,
    Position,
    Length,
    Time,
    Count,
}

impl Dimension {
    pub fn units(self, space_units: &str, time_units: &str) -> String {
        match self {
            Dimension::Position | Dimension::Length => space_units.to_string(),
            Dimension::Time => time_units.to_string(),
            Dimension::None | Dimension::Count => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureProjection {
    pub key: String,
    pub dimension: Dimension,
    pub units: String,
}

impl FeatureProjection {
    pub fn new(key: impl Into<String>, dimension: Dimension, units: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            dimension,
            units: units.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTarget {
    Spot,
    Link,
    BranchSpot,
}

type SpotFn = dyn Fn(&ModelGraph, SpotKey) -> Option<Vec<f64>> + Send + Sync;
type LinkFn = dyn Fn(&ModelGraph, LinkKey) -> Option<Vec<f64>> + Send + Sync;
type BranchSpotFn = dyn Fn(&ModelBranchGraph, BranchSpotKey) -> Option<Vec<f64>> + Send + Sync;

#[derive(Clone)]
enum Evaluator {
    Spot(Arc<SpotFn>),
    Link(Arc<LinkFn>),
    BranchSpot(Arc<BranchSpotFn>),
}

/// Declaration of a feature. The evaluator returns one value per
/// projection, in projection order.
#[derive(Clone)]
pub struct FeatureSpec {
    pub key: String,
    pub info: String,
    pub projections: Vec<FeatureProjection>,
    evaluator: Evaluator,
}

impl fmt::Debug for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSpec")
            .field("key", &self.key)
            .field("target", &self.target())
            .field("projections", &self.projections)
            .finish()
    }
}

impl FeatureSpec {
    pub fn spot<F>(
        key: impl Into<String>,
        info: impl Into<String>,
        projections: Vec<FeatureProjection>,
        f: F,
    ) -> Self
    where
        F: Fn(&ModelGraph, SpotKey) -> Option<Vec<f64>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            info: info.into(),
            projections,
            evaluator: Evaluator::Spot(Arc::new(f)),
        }
    }

    pub fn link<F>(
        key: impl Into<String>,
        info: impl Into<String>,
        projections: Vec<FeatureProjection>,
        f: F,
    ) -> Self
    where
        F: Fn(&ModelGraph, LinkKey) -> Option<Vec<f64>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            info: info.into(),
            projections,
            evaluator: Evaluator::Link(Arc::new(f)),
        }
    }

    pub fn branch_spot<F>(
        key: impl Into<String>,
        info: impl Into<String>,
        projections: Vec<FeatureProjection>,
        f: F,
    ) -> Self
    where
        F: Fn(&ModelBranchGraph, BranchSpotKey) -> Option<Vec<f64>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            info: info.into(),
            projections,
            evaluator: Evaluator::BranchSpot(Arc::new(f)),
        }
    }

    pub fn target(&self) -> FeatureTarget {
        match self.evaluator {
            Evaluator::Spot(_) => FeatureTarget::Spot,
            Evaluator::Link(_) => FeatureTarget::Link,
            Evaluator::BranchSpot(_) => FeatureTarget::BranchSpot,
        }
    }
}

/// Declared features, keyed by feature key.
#[derive(Debug, Clone, Default)]
pub struct FeatureModel {
    specs: BTreeMap<String, FeatureSpec>,
}

impl FeatureModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a feature, replacing any feature with the same key.
    pub fn declare(&mut self, spec: FeatureSpec) {
        debug!("declaring {:?} feature {:?}", spec.target(), spec.key);
        self.specs.insert(spec.key.clone(), spec);
    }

    pub fn spec(&self, key: &str) -> Option<&FeatureSpec> {
        self.specs.get(key)
    }

    pub fn specs(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.specs.values()
    }

    pub fn specs_for(&self, target: FeatureTarget) -> impl Iterator<Item = &FeatureSpec> {
        self.specs.values().filter(move |s| s.target() == target)
    }

    pub fn clear(&mut self) {
        self.specs.clear();
    }

    /// Values of spot feature `key` for `spot`. `None` for unknown keys,
    /// non-spot features and dead spots.
    pub fn evaluate_spot(&self, graph: &ModelGraph, key: &str, spot: SpotKey) -> Option<Vec<f64>> {
        match &self.specs.get(key)?.evaluator {
            Evaluator::Spot(f) => f(graph, spot),
            _ => None,
        }
    }

    pub fn evaluate_link(&self, graph: &ModelGraph, key: &str, link: LinkKey) -> Option<Vec<f64>> {
        match &self.specs.get(key)?.evaluator {
            Evaluator::Link(f) => f(graph, link),
            _ => None,
        }
    }

    pub fn evaluate_branch_spot(
        &self,
        branch_graph: &ModelBranchGraph,
        key: &str,
        branch: BranchSpotKey,
    ) -> Option<Vec<f64>> {
        match &self.specs.get(key)?.evaluator {
            Evaluator::BranchSpot(f) => f(branch_graph, branch),
            _ => None,
        }
    }

    /// Declare the built-in features with units taken from the model.
    pub fn declare_defaults(&mut self, space_units: &str, time_units: &str) {
        let units = |d: Dimension| d.units(space_units, time_units);

        self.declare(FeatureSpec::spot(
            SPOT_POSITION,
            "Spot center position.",
            ["X", "Y", "Z"]
                .into_iter()
                .map(|axis| FeatureProjection::new(axis, Dimension::Position, units(Dimension::Position)))
                .collect(),
            |graph, spot| Some(graph.spot(spot)?.position().to_vec()),
        ));
        self.declare(FeatureSpec::spot(
            SPOT_RADIUS,
            "Radius of the spot bounding sphere.",
            vec![FeatureProjection::new("R", Dimension::Length, units(Dimension::Length))],
            |graph, spot| Some(vec![graph.spot(spot)?.bounding_sphere_radius_squared().sqrt()]),
        ));
        self.declare(FeatureSpec::spot(
            SPOT_FRAME,
            "Timepoint of the spot.",
            vec![FeatureProjection::new("Frame", Dimension::None, "")],
            |graph, spot| Some(vec![f64::from(graph.spot(spot)?.timepoint())]),
        ));
        self.declare(FeatureSpec::spot(
            SPOT_N_LINKS,
            "Number of incoming and outgoing links of the spot.",
            vec![FeatureProjection::new("N links", Dimension::Count, "")],
            |graph, spot| {
                let s = graph.spot(spot)?;
                Some(vec![(s.in_degree() + s.out_degree()) as f64])
            },
        ));
        self.declare(FeatureSpec::link(
            LINK_TARGET_ID,
            "Pool index of the link source and target spots.",
            vec![
                FeatureProjection::new("Source ID", Dimension::None, ""),
                FeatureProjection::new("Target ID", Dimension::None, ""),
            ],
            |graph, link| {
                let (source, target) = graph.link_endpoints(link)?;
                Some(vec![source.index() as f64, target.index() as f64])
            },
        ));
        self.declare(FeatureSpec::branch_spot(
            BRANCH_N_SPOTS,
            "Number of spots in the branch.",
            vec![FeatureProjection::new("N spots", Dimension::Count, "")],
            |branch_graph, branch| Some(vec![branch_graph.branch_spot(branch)?.spot_count as f64]),
        ));
    }
}

pub const SPOT_POSITION: &str = "Spot position";
pub const SPOT_RADIUS: &str = "Spot radius";
pub const SPOT_FRAME: &str = "Spot frame";
pub const SPOT_N_LINKS: &str = "Spot N links";
pub const LINK_TARGET_ID: &str = "Link target IDs";
pub const BRANCH_N_SPOTS: &str = "Branch N spots";
