//! Rigid-body transform and velocity types.
//!
//! Two representations coexist deliberately: [`Pose`]/[`Twist`] are what the
//! simulation state stores (scalar-first quaternions via `nalgebra`), while
//! [`HostTransform`] is the raw `x,y,z,w` layout host scene graphs hand us.
//! Conversion between them is a pure relabeling performed by the
//! synchronization layer.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position and orientation of a rigid body on the simulation side.
///
/// # Example
///
/// ```
/// use scenesim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let local = Point3::new(1.0, 0.0, 0.0);
/// assert_eq!(pose.transform_point(&local), Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f32>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f32>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f32>) -> Point3<f32> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to world coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * local
    }

    /// Transform a point from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f32>) -> Point3<f32> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity in world coordinates (m/s).
    pub linear: Vector3<f32>,
    /// Angular velocity in world coordinates (rad/s).
    pub angular: Vector3<f32>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist with specified linear and angular velocity.
    #[must_use]
    pub const fn new(linear: Vector3<f32>, angular: Vector3<f32>) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Create a twist with linear velocity only.
    #[must_use]
    pub fn linear(v: Vector3<f32>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Compute the velocity at a point offset from the body origin.
    ///
    /// `v_point = v_linear + omega × r`
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f32>) -> Vector3<f32> {
        self.linear + self.angular.cross(offset)
    }

    /// Get the linear speed (magnitude of linear velocity).
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.linear.norm()
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }
}

/// A transform exactly as the host scene graph represents it.
///
/// The rotation is stored `[x, y, z, w]` - the host convention - and is
/// converted to the simulation's scalar-first representation by relabeling
/// alone. Keeping the raw layout here makes the conversion boundary explicit
/// and exactly invertible.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HostTransform {
    /// Position in host world coordinates.
    pub position: [f32; 3],
    /// Rotation quaternion in `x,y,z,w` order.
    pub rotation: [f32; 4],
}

impl Default for HostTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl HostTransform {
    /// Identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Create a transform from a position with identity rotation.
    #[must_use]
    pub const fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Create a transform from position and `x,y,z,w` rotation.
    #[must_use]
    pub const fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    /// Check if the transform contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|x| x.is_finite()) && self.rotation.iter().all(|x| x.is_finite())
    }
}
