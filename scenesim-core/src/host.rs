//! The host boundary: everything the simulation consumes from, or writes
//! back to, the externally authored scene.
//!
//! No ambient scene lookups happen inside the core. An instance receives a
//! list of [`BodySnapshot`]s and an optional [`PointCloud`] at build time,
//! and a [`HostScene`] view at step time for per-tick reads and writebacks.
//! The manager additionally consults a [`SceneView`] once per tick to
//! reconcile its registry with the external list.

use scenesim_types::{HostTransform, InstanceId, SimError};

use crate::shape::HostShape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Who owns a rigid body's motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyRole {
    /// Solver-owned: the constraint solver integrates it and the result is
    /// written back to the host.
    Dynamic,
    /// Host-driven: position is authoritative from the host; a velocity is
    /// synthesized only so contacts feel the motion, then discarded.
    Kinematic,
}

impl BodyRole {
    /// Whether the solver owns this body.
    #[must_use]
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::Dynamic)
    }
}

/// Build-time snapshot of one host rigid-body object.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodySnapshot {
    /// Transform at build time, in host convention.
    pub transform: HostTransform,
    /// Declared collision shape.
    pub shape: HostShape,
    /// Motion ownership at build time. Re-read live each step through
    /// [`HostScene::body_role`].
    pub role: BodyRole,
}

impl BodySnapshot {
    /// Create a snapshot.
    #[must_use]
    pub const fn new(transform: HostTransform, shape: HostShape, role: BodyRole) -> Self {
        Self {
            transform,
            shape,
            role,
        }
    }
}

/// Point-cloud attributes read from an external geometry object.
///
/// Optional attributes default at build time: velocities to zero, masses to
/// `1.0`, radii to the builder's default particle radius.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    /// Point positions.
    pub positions: Vec<[f32; 3]>,
    /// Optional per-point velocities.
    pub velocities: Option<Vec<[f32; 3]>>,
    /// Optional per-point masses.
    pub masses: Option<Vec<f32>>,
    /// Optional per-point radii.
    pub radii: Option<Vec<f32>>,
}

impl PointCloud {
    /// Create a cloud from positions only.
    #[must_use]
    pub fn from_positions(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..Default::default()
        }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the cloud has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check the cloud is usable: non-empty, with every present attribute
    /// matching the position count.
    pub fn validate(&self) -> scenesim_types::Result<()> {
        if self.positions.is_empty() {
            return Err(SimError::empty_source("point cloud has no positions"));
        }

        let n = self.positions.len();
        if let Some(v) = &self.velocities {
            if v.len() != n {
                return Err(SimError::empty_source(format!(
                    "velocity count {} does not match position count {n}",
                    v.len()
                )));
            }
        }
        if let Some(m) = &self.masses {
            if m.len() != n {
                return Err(SimError::empty_source(format!(
                    "mass count {} does not match position count {n}",
                    m.len()
                )));
            }
        }
        if let Some(r) = &self.radii {
            if r.len() != n {
                return Err(SimError::empty_source(format!(
                    "radius count {} does not match position count {n}",
                    r.len()
                )));
            }
        }

        Ok(())
    }
}

/// Step-time view of one instance's slice of the host scene.
///
/// Slots index the body list in build order; the binding between slots and
/// model body indices is fixed for the lifetime of the instance. The scene
/// objects are single-writer: only the currently stepping instance may touch
/// the bodies it owns.
pub trait HostScene {
    /// Number of bodies visible through this view. Must match the count the
    /// instance was built with.
    fn body_count(&self) -> usize;

    /// Current host transform of the body in `slot`.
    fn body_transform(&self, slot: usize) -> HostTransform;

    /// Current motion ownership of the body in `slot`. Consulted every step,
    /// so host-side role toggles take effect without a rebuild.
    fn body_role(&self, slot: usize) -> BodyRole;

    /// Write a solver-owned body's transform and velocity back to the host.
    /// Called only for dynamic bodies.
    fn write_back(&mut self, slot: usize, transform: HostTransform, linear: [f32; 3], angular: [f32; 3]);

    /// Hand updated particle positions and velocities to the host's
    /// visualization layer.
    fn update_particles(&mut self, positions: &[[f32; 3]], velocities: &[[f32; 3]]);
}

/// Per-tick view the manager uses to reconcile with the external list and to
/// obtain each instance's [`HostScene`].
pub trait SceneView {
    /// Whether the external list still contains this instance. Ids that
    /// return `false` are pruned from the manager - an expected consequence
    /// of host-side removal ordering, not an error.
    fn is_live(&self, id: InstanceId) -> bool;

    /// The host scene backing this instance, if available.
    fn scene_mut(&mut self, id: InstanceId) -> Option<&mut dyn HostScene>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_point_cloud_validation() {
        let empty = PointCloud::default();
        assert!(empty.validate().is_err());

        let ok = PointCloud::from_positions(vec![[0.0; 3], [1.0; 3]]);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.len(), 2);

        let mismatched = PointCloud {
            positions: vec![[0.0; 3], [1.0; 3]],
            masses: Some(vec![1.0]),
            ..Default::default()
        };
        let err = mismatched.validate().unwrap_err();
        assert!(matches!(err, SimError::EmptySource { .. }));
    }

    #[test]
    fn test_role_predicate() {
        assert!(BodyRole::Dynamic.is_dynamic());
        assert!(!BodyRole::Kinematic.is_dynamic());
    }
}
