//! Collision shapes and their translation from host shape declarations.
//!
//! Hosts declare shapes in their own vocabulary ([`HostShape`]); the model
//! builder translates the kinds it understands into solver-side
//! [`CollisionShape`]s. Kinds without a translation are skipped with a
//! warning - the body still exists with mass, it just has no contact
//! footprint.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shape kind as declared by a host scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    /// Axis-aligned box in local coordinates.
    Box,
    /// Sphere.
    Sphere,
    /// Capsule (no solver-side translation yet).
    Capsule,
    /// Cylinder (no solver-side translation yet).
    Cylinder,
    /// Arbitrary mesh (no solver-side translation yet).
    Mesh,
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Box => write!(f, "box"),
            Self::Sphere => write!(f, "sphere"),
            Self::Capsule => write!(f, "capsule"),
            Self::Cylinder => write!(f, "cylinder"),
            Self::Mesh => write!(f, "mesh"),
        }
    }
}

/// A shape as the host declares it: a kind plus full extents per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HostShape {
    /// Declared shape kind.
    pub kind: ShapeKind,
    /// Full extents (not half-extents) along each local axis.
    pub dimensions: [f32; 3],
}

impl HostShape {
    /// Create a host shape declaration.
    #[must_use]
    pub const fn new(kind: ShapeKind, dimensions: [f32; 3]) -> Self {
        Self { kind, dimensions }
    }

    /// A unit cube declaration.
    #[must_use]
    pub const fn unit_box() -> Self {
        Self::new(ShapeKind::Box, [1.0, 1.0, 1.0])
    }

    /// Translate into a solver-side collision shape, applying the instance
    /// scale. Returns `None` for kinds the builder cannot express.
    #[must_use]
    pub fn to_collision_shape(&self, scale: f32) -> Option<CollisionShape> {
        match self.kind {
            ShapeKind::Box => Some(CollisionShape::box_shape(Vector3::new(
                self.dimensions[0] * scale / 2.0,
                self.dimensions[1] * scale / 2.0,
                self.dimensions[2] * scale / 2.0,
            ))),
            ShapeKind::Sphere => Some(CollisionShape::sphere(self.dimensions[0] * scale / 2.0)),
            ShapeKind::Capsule | ShapeKind::Cylinder | ShapeKind::Mesh => None,
        }
    }
}

/// Collision shape attached to a model body (or static, for the ground).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionShape {
    /// Box with half-extents, in the body's local frame.
    Box {
        /// Half-extents of the box in each axis.
        half_extents: Vector3<f32>,
    },
    /// Sphere centered on the body origin.
    Sphere {
        /// Sphere radius in meters.
        radius: f32,
    },
    /// Infinite static plane: `normal · x = distance`.
    Plane {
        /// Unit normal vector of the plane.
        normal: Vector3<f32>,
        /// Distance from origin along the normal.
        distance: f32,
    },
}

impl CollisionShape {
    /// Create a box collision shape.
    #[must_use]
    pub fn box_shape(half_extents: Vector3<f32>) -> Self {
        Self::Box { half_extents }
    }

    /// Create a sphere collision shape.
    #[must_use]
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Create a ground plane with the given up direction, at height zero.
    #[must_use]
    pub fn ground_plane(up: Vector3<f32>) -> Self {
        Self::Plane {
            normal: up,
            distance: 0.0,
        }
    }

    /// Get the bounding sphere radius for culling.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Box { half_extents } => half_extents.norm(),
            Self::Sphere { radius } => *radius,
            Self::Plane { .. } => f32::INFINITY,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_translation_halves_and_scales() {
        let host = HostShape::new(ShapeKind::Box, [2.0, 4.0, 6.0]);
        let shape = host.to_collision_shape(0.5).unwrap();

        match shape {
            CollisionShape::Box { half_extents } => {
                assert_relative_eq!(half_extents.x, 0.5);
                assert_relative_eq!(half_extents.y, 1.0);
                assert_relative_eq!(half_extents.z, 1.5);
            }
            other => panic!("expected box, got {other:?}"),
        }
    }

    #[test]
    fn test_sphere_translation() {
        let host = HostShape::new(ShapeKind::Sphere, [3.0, 3.0, 3.0]);
        match host.to_collision_shape(1.0).unwrap() {
            CollisionShape::Sphere { radius } => assert_relative_eq!(radius, 1.5),
            other => panic!("expected sphere, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_kinds_have_no_translation() {
        for kind in [ShapeKind::Capsule, ShapeKind::Cylinder, ShapeKind::Mesh] {
            let host = HostShape::new(kind, [1.0, 1.0, 1.0]);
            assert!(host.to_collision_shape(1.0).is_none());
        }
    }

    #[test]
    fn test_bounding_radius() {
        let b = CollisionShape::box_shape(Vector3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(b.bounding_radius(), 3.0f32.sqrt());

        let s = CollisionShape::sphere(2.0);
        assert_relative_eq!(s.bounding_radius(), 2.0);

        let p = CollisionShape::ground_plane(Vector3::z());
        assert!(p.bounding_radius().is_infinite());
    }
}
