//! Contact generation between particles, collision shapes, and each other.
//!
//! `collide` runs once per step, after the broad-phase grid has been rebuilt
//! from current particle positions, and before the solver. The produced
//! [`Contacts`] are handed to the solver as-is; the solver may re-evaluate
//! penetration against moving shapes during substeps, but the contact *set*
//! is fixed for the step.

use nalgebra::{Point3, Vector3};
use scenesim_types::Pose;

use crate::grid::SpatialGrid;
use crate::model::Model;
use crate::shape::CollisionShape;
use crate::state::State;

/// A particle touching a collision shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeContact {
    /// Particle index.
    pub particle: usize,
    /// Shape index into the model's attachment list.
    pub shape: usize,
    /// Body the shape follows, `None` for static geometry.
    pub body: Option<usize>,
    /// Contact normal, pointing from the surface toward the particle.
    pub normal: Vector3<f32>,
    /// Penetration depth (positive).
    pub depth: f32,
}

/// Two particles overlapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairContact {
    /// First particle index (always `< b`).
    pub a: usize,
    /// Second particle index.
    pub b: usize,
    /// Contact normal, pointing from `b` toward `a`.
    pub normal: Vector3<f32>,
    /// Penetration depth (positive).
    pub depth: f32,
}

/// All contacts found for one step.
#[derive(Debug, Clone, Default)]
pub struct Contacts {
    /// Particle-vs-shape contacts.
    pub shape: Vec<ShapeContact>,
    /// Particle-vs-particle contacts.
    pub pairs: Vec<PairContact>,
}

impl Contacts {
    /// Total number of contact points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.len() + self.pairs.len()
    }

    /// Whether no contacts were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty() && self.pairs.is_empty()
    }
}

/// Evaluate a particle of radius `r` against one shape at `pose`.
///
/// Returns the push-out normal and penetration depth when overlapping.
pub(crate) fn particle_shape_contact(
    shape: &CollisionShape,
    pose: &Pose,
    p: &Point3<f32>,
    r: f32,
) -> Option<(Vector3<f32>, f32)> {
    match shape {
        CollisionShape::Plane { normal, distance } => {
            let depth = r - (normal.dot(&p.coords) - distance);
            (depth > 0.0).then_some((*normal, depth))
        }
        CollisionShape::Sphere { radius } => {
            let diff = p - pose.position;
            let dist = diff.norm();
            let depth = (radius + r) - dist;
            if depth <= 0.0 {
                return None;
            }
            let normal = if dist > 1e-6 {
                diff / dist
            } else {
                Vector3::z()
            };
            Some((normal, depth))
        }
        CollisionShape::Box { half_extents } => {
            let local = pose.inverse_transform_point(p);
            let clamped = Point3::new(
                local.x.clamp(-half_extents.x, half_extents.x),
                local.y.clamp(-half_extents.y, half_extents.y),
                local.z.clamp(-half_extents.z, half_extents.z),
            );

            if local == clamped {
                // Center is inside: push out along the axis of least
                // penetration.
                let pen = Vector3::new(
                    half_extents.x - local.x.abs(),
                    half_extents.y - local.y.abs(),
                    half_extents.z - local.z.abs(),
                );
                let axis = if pen.x <= pen.y && pen.x <= pen.z {
                    0
                } else if pen.y <= pen.z {
                    1
                } else {
                    2
                };
                let mut local_normal = Vector3::zeros();
                local_normal[axis] = local[axis].signum();
                let depth = pen[axis] + r;
                Some((pose.transform_vector(&local_normal), depth))
            } else {
                let diff = local - clamped;
                let dist = diff.norm();
                let depth = r - dist;
                (depth > 0.0).then(|| (pose.transform_vector(&(diff / dist)), depth))
            }
        }
    }
}

/// World pose of a shape attachment given the current state.
pub(crate) fn shape_pose(model: &Model, state: &State, shape_index: usize) -> Pose {
    model.shapes()[shape_index]
        .body
        .map_or_else(Pose::identity, |b| state.body_q[b])
}

/// Generate all contacts for the current state.
///
/// The grid must have been rebuilt from `state`'s particle positions with
/// cell size `2 × model.search_radius()`.
#[must_use]
pub fn collide(model: &Model, state: &State, grid: &SpatialGrid) -> Contacts {
    let mut contacts = Contacts::default();
    let radii = model.particle_radii();

    // Particle vs shape.
    for (i, p) in state.particle_q.iter().enumerate() {
        for (s, attachment) in model.shapes().iter().enumerate() {
            let pose = shape_pose(model, state, s);
            if let Some((normal, depth)) =
                particle_shape_contact(&attachment.shape, &pose, p, radii[i])
            {
                contacts.shape.push(ShapeContact {
                    particle: i,
                    shape: s,
                    body: attachment.body,
                    normal,
                    depth,
                });
            }
        }
    }

    // Particle vs particle, through the grid.
    for (i, p) in state.particle_q.iter().enumerate() {
        grid.for_each_neighbor(p, |j| {
            if j <= i {
                return;
            }
            let diff = p - state.particle_q[j];
            let dist = diff.norm();
            let depth = (radii[i] + radii[j]) - dist;
            if depth > 0.0 && dist > 1e-6 {
                contacts.pairs.push(PairContact {
                    a: i,
                    b: j,
                    normal: diff / dist,
                    depth,
                });
            }
        });
    }

    contacts
}
