//! Model construction: `ModelBuilder` → immutable [`Model`] → [`State`].
//!
//! The pipeline mirrors the solver's expectations: a builder accumulates
//! bodies, shapes, and particles; `finalize` freezes everything into an
//! immutable model; states are then allocated from the model so both buffers
//! of an instance share one schema. A model is never mutated after
//! finalization - recompilation builds a fresh one.

use nalgebra::{Point3, Vector3};
use scenesim_types::{Device, MaterialParams, ParticleGridConfig, Pose, SimError, Twist};

use crate::host::PointCloud;
use crate::shape::CollisionShape;
use crate::state::State;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// World up axis for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    /// X is up.
    X,
    /// Y is up.
    Y,
    /// Z is up.
    #[default]
    Z,
}

impl Axis {
    /// Unit vector along this axis.
    #[must_use]
    pub fn unit(self) -> Vector3<f32> {
        match self {
            Self::X => Vector3::x(),
            Self::Y => Vector3::y(),
            Self::Z => Vector3::z(),
        }
    }
}

/// A collision shape attached to a model body, or to the static world.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeAttachment {
    /// Body the shape follows; `None` for static world geometry.
    pub body: Option<usize>,
    /// The collision geometry.
    pub shape: CollisionShape,
    /// Contact material for this shape.
    pub material: MaterialParams,
}

/// Solver-tunable inputs, recreated alongside the model on every compile.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    /// Gravity acceleration vector.
    pub gravity: Vector3<f32>,
    /// Material constants for particle-particle contacts.
    pub material: MaterialParams,
}

impl Control {
    /// Create a control block.
    #[must_use]
    pub const fn new(gravity: Vector3<f32>, material: MaterialParams) -> Self {
        Self { gravity, material }
    }
}

/// Immutable description of everything the solver needs to know about a
/// simulation: bodies, shapes, particles, and their constant properties.
#[derive(Debug, Clone)]
pub struct Model {
    device: Device,
    up_axis: Axis,
    gravity: f32,
    body_init_q: Vec<Pose>,
    body_mass: Vec<f32>,
    shapes: Vec<ShapeAttachment>,
    particle_init_q: Vec<Point3<f32>>,
    particle_init_qd: Vec<Vector3<f32>>,
    particle_mass: Vec<f32>,
    particle_radius: Vec<f32>,
    search_radius: f32,
}

impl Model {
    /// Device the model was finalized for.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// World up axis.
    #[must_use]
    pub fn up_axis(&self) -> Axis {
        self.up_axis
    }

    /// Gravity acceleration vector (`-gravity × up`).
    #[must_use]
    pub fn gravity_vector(&self) -> Vector3<f32> {
        self.up_axis.unit() * -self.gravity
    }

    /// Number of rigid bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.body_init_q.len()
    }

    /// Number of collision shapes (including static world geometry).
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of particles.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particle_init_q.len()
    }

    /// Mass of a body.
    #[must_use]
    pub fn body_mass(&self, body: usize) -> f32 {
        self.body_mass[body]
    }

    /// All shape attachments.
    #[must_use]
    pub fn shapes(&self) -> &[ShapeAttachment] {
        &self.shapes
    }

    /// Per-particle masses.
    #[must_use]
    pub fn particle_masses(&self) -> &[f32] {
        &self.particle_mass
    }

    /// Per-particle radii.
    #[must_use]
    pub fn particle_radii(&self) -> &[f32] {
        &self.particle_radius
    }

    /// Neighbor search radius: the largest particle radius seen at build
    /// time, or the builder default when the model has no particles. The
    /// broad-phase grid is rebuilt each step with twice this value as its
    /// cell size.
    #[must_use]
    pub fn search_radius(&self) -> f32 {
        self.search_radius
    }

    /// Allocate a fresh state initialized from the model's build-time
    /// transforms and velocities.
    #[must_use]
    pub fn state(&self) -> State {
        State::new(
            self.body_init_q.clone(),
            vec![Twist::zero(); self.body_init_q.len()],
            self.particle_init_q.clone(),
            self.particle_init_qd.clone(),
        )
    }
}

/// Accumulates model content before finalization.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    /// World up axis; gravity points the other way.
    pub up_axis: Axis,
    /// Gravity magnitude (m/s²).
    pub gravity: f32,
    /// Radius assigned to particles added without an explicit one, and the
    /// search-radius fallback for particle-free models.
    pub default_particle_radius: f32,
    body_init_q: Vec<Pose>,
    body_mass: Vec<f32>,
    shapes: Vec<ShapeAttachment>,
    particle_init_q: Vec<Point3<f32>>,
    particle_init_qd: Vec<Vector3<f32>>,
    particle_mass: Vec<f32>,
    particle_radius: Vec<f32>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    /// Create an empty builder with Z up and earth gravity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            up_axis: Axis::Z,
            gravity: 9.81,
            default_particle_radius: 0.1,
            body_init_q: Vec::new(),
            body_mass: Vec::new(),
            shapes: Vec::new(),
            particle_init_q: Vec::new(),
            particle_init_qd: Vec::new(),
            particle_mass: Vec::new(),
            particle_radius: Vec::new(),
        }
    }

    /// Set the up axis.
    #[must_use]
    pub fn up_axis(mut self, axis: Axis) -> Self {
        self.up_axis = axis;
        self
    }

    /// Add a rigid body with an initial pose and return its index.
    pub fn add_body(&mut self, pose: Pose, mass: f32) -> usize {
        self.body_init_q.push(pose);
        self.body_mass.push(mass);
        self.body_init_q.len() - 1
    }

    /// Attach a collision shape to a body and return the shape index.
    pub fn add_shape(
        &mut self,
        body: usize,
        shape: CollisionShape,
        material: MaterialParams,
    ) -> usize {
        self.shapes.push(ShapeAttachment {
            body: Some(body),
            shape,
            material,
        });
        self.shapes.len() - 1
    }

    /// Add a static ground plane perpendicular to the up axis.
    pub fn add_ground_plane(&mut self, material: MaterialParams) -> usize {
        self.shapes.push(ShapeAttachment {
            body: None,
            shape: CollisionShape::ground_plane(self.up_axis.unit()),
            material,
        });
        self.shapes.len() - 1
    }

    /// Add a single particle.
    pub fn add_particle(
        &mut self,
        position: Point3<f32>,
        velocity: Vector3<f32>,
        mass: f32,
        radius: f32,
    ) {
        self.particle_init_q.push(position);
        self.particle_init_qd.push(velocity);
        self.particle_mass.push(mass);
        self.particle_radius.push(radius);
    }

    /// Add every point of an external cloud, filling in missing attributes
    /// with zeros (velocity), `1.0` (mass), and the builder default (radius).
    pub fn add_point_cloud(&mut self, cloud: &PointCloud) -> scenesim_types::Result<()> {
        cloud.validate()?;

        let default_radius = self.default_particle_radius;
        for i in 0..cloud.len() {
            let p = cloud.positions[i];
            let v = cloud
                .velocities
                .as_ref()
                .map_or([0.0; 3], |vs| vs[i]);
            let mass = cloud.masses.as_ref().map_or(1.0, |ms| ms[i]);
            let radius = cloud.radii.as_ref().map_or(default_radius, |rs| rs[i]);

            self.add_particle(
                Point3::new(p[0], p[1], p[2]),
                Vector3::new(v[0], v[1], v[2]),
                mass,
                radius,
            );
        }

        Ok(())
    }

    /// Add a deterministic particle lattice with spacing `2 × radius` and a
    /// small hash-based jitter. Used when an instance has no geometry source.
    pub fn add_particle_grid(&mut self, grid: &ParticleGridConfig) {
        let radius = self.default_particle_radius;
        let spacing = radius * 2.0;
        let jitter = radius * grid.jitter;
        let velocity = Vector3::new(grid.velocity[0], grid.velocity[1], grid.velocity[2]);

        let mut index = 0u32;
        for x in 0..grid.dims[0] {
            for y in 0..grid.dims[1] {
                for z in 0..grid.dims[2] {
                    let base = Point3::new(
                        grid.origin[0] + x as f32 * spacing,
                        grid.origin[1] + y as f32 * spacing,
                        grid.origin[2] + z as f32 * spacing,
                    );
                    let offset = Vector3::new(
                        hash_unit(index, 0) * jitter,
                        hash_unit(index, 1) * jitter,
                        hash_unit(index, 2) * jitter,
                    );
                    self.add_particle(base + offset, velocity, 1.0, radius);
                    index += 1;
                }
            }
        }
    }

    /// Number of bodies added so far.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.body_init_q.len()
    }

    /// Number of particles added so far.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particle_init_q.len()
    }

    /// Freeze the builder into an immutable model.
    ///
    /// An empty builder (no bodies, no particles) is legal and produces an
    /// empty but valid model.
    pub fn finalize(self, device: Device) -> scenesim_types::Result<Model> {
        for (i, &mass) in self.body_mass.iter().enumerate() {
            if !mass.is_finite() || mass <= 0.0 {
                return Err(SimError::invalid_config(format!(
                    "body {i} has non-positive mass {mass}"
                )));
            }
        }

        let search_radius = self
            .particle_radius
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        // Degenerate radii would collapse the broad-phase cells; fall back
        // to the builder default.
        let search_radius = if search_radius.is_finite() && search_radius > 0.0 {
            search_radius
        } else {
            self.default_particle_radius
        };

        Ok(Model {
            device,
            up_axis: self.up_axis,
            gravity: self.gravity,
            body_init_q: self.body_init_q,
            body_mass: self.body_mass,
            shapes: self.shapes,
            particle_init_q: self.particle_init_q,
            particle_init_qd: self.particle_init_qd,
            particle_mass: self.particle_mass,
            particle_radius: self.particle_radius,
            search_radius,
        })
    }
}

/// Deterministic hash of (index, axis) to `[-1, 1)`. Replaces RNG jitter so
/// rebuilt models are reproducible.
fn hash_unit(index: u32, axis: u32) -> f32 {
    let mut h = index
        .wrapping_mul(0x9E37_79B9)
        .wrapping_add(axis.wrapping_mul(0x85EB_CA6B));
    h ^= h >> 16;
    h = h.wrapping_mul(0x7FEB_352D);
    h ^= h >> 15;
    (h as f32 / u32::MAX as f32) * 2.0 - 1.0
}
