/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Spot (vertex) payload: a 3D ellipsoid at a fixed timepoint.

use nalgebra::Matrix3;

use super::LinkKey;
use crate::persistence::types::PersistedSpot;

/// Upper triangle of a symmetric 3x3 matrix, row-major:
/// `xx, xy, xz, yy, yz, zz`.
pub type PackedCovariance = [f64; 6];

/// A spot in the lineage graph.
///
/// Fields are private: every write goes through [`super::ModelGraph`] so the
/// spatial index, listeners and undo history observe it.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    timepoint: i32,
    position: [f64; 3],
    covariance: PackedCovariance,
    /// Largest eigenvalue of `covariance`. Derived, never set on its own.
    bounding_sphere_radius_squ: f64,
    label: Option<String>,
    pub(crate) incoming: Vec<LinkKey>,
    pub(crate) outgoing: Vec<LinkKey>,
}

impl Spot {
    /// Spherical spot: covariance is `radius² · I`.
    pub(crate) fn with_radius(timepoint: i32, position: [f64; 3], radius: f64) -> Self {
        let rsqu = radius * radius;
        Self {
            timepoint,
            position,
            covariance: [rsqu, 0.0, 0.0, rsqu, 0.0, rsqu],
            bounding_sphere_radius_squ: rsqu,
            label: None,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Spot shaped by `covariance`. Only the upper triangle is read.
    pub(crate) fn with_covariance(
        timepoint: i32,
        position: [f64; 3],
        covariance: &[[f64; 3]; 3],
    ) -> Self {
        let packed = pack_covariance(covariance);
        Self {
            timepoint,
            position,
            covariance: packed,
            bounding_sphere_radius_squ: radius_squared_from_covariance(&packed),
            label: None,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn timepoint(&self) -> i32 {
        self.timepoint
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// Full symmetric covariance matrix.
    pub fn covariance(&self) -> [[f64; 3]; 3] {
        unpack_covariance(&self.covariance)
    }

    pub fn packed_covariance(&self) -> PackedCovariance {
        self.covariance
    }

    pub fn bounding_sphere_radius_squared(&self) -> f64 {
        self.bounding_sphere_radius_squ
    }

    /// Explicit label, if one was set. See [`super::ModelGraph::label`] for
    /// the defaulted form.
    pub fn explicit_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Incoming links in list order.
    pub fn incoming(&self) -> &[LinkKey] {
        &self.incoming
    }

    /// Outgoing links in list order.
    pub fn outgoing(&self) -> &[LinkKey] {
        &self.outgoing
    }

    pub fn in_degree(&self) -> usize {
        self.incoming.len()
    }

    pub fn out_degree(&self) -> usize {
        self.outgoing.len()
    }

    pub(crate) fn replace_position(&mut self, position: [f64; 3]) -> [f64; 3] {
        std::mem::replace(&mut self.position, position)
    }

    /// Writes covariance and radius verbatim. Callers either computed the
    /// radius from the covariance or are restoring a recorded pair.
    pub(crate) fn replace_covariance(
        &mut self,
        covariance: PackedCovariance,
        radius_squ: f64,
    ) -> (PackedCovariance, f64) {
        let old = (self.covariance, self.bounding_sphere_radius_squ);
        self.covariance = covariance;
        self.bounding_sphere_radius_squ = radius_squ;
        old
    }

    pub(crate) fn replace_label(&mut self, label: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.label, label)
    }

    /// Attribute state without topology.
    pub(crate) fn to_persisted(&self) -> PersistedSpot {
        PersistedSpot {
            timepoint: self.timepoint,
            position: self.position,
            covariance: self.covariance,
            bounding_sphere_radius_squ: self.bounding_sphere_radius_squ,
            label: self.label.clone(),
        }
    }

    pub(crate) fn from_persisted(persisted: &PersistedSpot) -> Self {
        Self {
            timepoint: persisted.timepoint,
            position: persisted.position,
            covariance: persisted.covariance,
            bounding_sphere_radius_squ: persisted.bounding_sphere_radius_squ,
            label: persisted.label.clone(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }
}

pub fn pack_covariance(cov: &[[f64; 3]; 3]) -> PackedCovariance {
    [
        cov[0][0], cov[0][1], cov[0][2], cov[1][1], cov[1][2], cov[2][2],
    ]
}

pub fn unpack_covariance(packed: &PackedCovariance) -> [[f64; 3]; 3] {
    let [xx, xy, xz, yy, yz, zz] = *packed;
    [[xx, xy, xz], [xy, yy, yz], [xz, yz, zz]]
}

/// Bounding-sphere radius squared: the largest eigenvalue, floored at zero.
pub fn radius_squared_from_covariance(packed: &PackedCovariance) -> f64 {
    let [xx, xy, xz, yy, yz, zz] = *packed;
    let m = Matrix3::new(xx, xy, xz, xy, yy, yz, xz, yz, zz);
    m.symmetric_eigenvalues().max().max(0.0)
}
