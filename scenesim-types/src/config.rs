//! Per-instance configuration.
//!
//! An [`InstanceConfig`] is authored by the host layer and consumed read-only
//! by the simulation core: material constants feed the solver control, timing
//! fields derive the solver and smoothing deltas, and the particle fields
//! select where the builder sources its point cloud from.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Compute device requested for a simulation instance.
///
/// The device is a hint to the solver implementation behind the [`Solver`]
/// trait; the reference solver executes on the CPU regardless and records the
/// request for diagnostics.
///
/// [`Solver`]: https://docs.rs/scenesim-core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Device {
    /// Solve on the CPU.
    #[default]
    Cpu,
    /// Solve on the GPU, if the solver supports it.
    Gpu,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// Contact material constants, declared explicitly per instance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialParams {
    /// Contact elastic stiffness.
    pub ke: f32,
    /// Contact damping.
    pub kd: f32,
    /// Contact friction.
    pub kf: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            ke: 1.0e5,
            kd: 1000.0,
            kf: 1000.0,
        }
    }
}

impl MaterialParams {
    /// Create material constants from explicit values.
    #[must_use]
    pub const fn new(ke: f32, kd: f32, kf: f32) -> Self {
        Self { ke, kd, kf }
    }
}

/// Parameters for a synthetic particle lattice, used when an instance has no
/// external geometry source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleGridConfig {
    /// Lattice dimensions (particles per axis).
    pub dims: [u32; 3],
    /// World-space position of the lattice corner.
    pub origin: [f32; 3],
    /// Initial velocity applied to every particle.
    pub velocity: [f32; 3],
    /// Maximum per-particle positional jitter, as a fraction of the particle
    /// radius.
    pub jitter: f32,
}

impl Default for ParticleGridConfig {
    fn default() -> Self {
        Self {
            dims: [8, 8, 8],
            origin: [-1.0, 0.0, 0.0],
            velocity: [0.0, 0.0, 10.0],
            jitter: 0.1,
        }
    }
}

impl ParticleGridConfig {
    /// Total number of particles the lattice produces.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.dims.iter().map(|&d| d as usize).product()
    }
}

/// Per-instance tunables, consumed read-only each step.
///
/// # Timing
///
/// Two distinct deltas are derived from this config and must not be unified:
/// [`frame_dt`](Self::frame_dt) (`1 / fps`) drives the solver step and the
/// synthesized kinematic velocity, while [`smooth_dt`](Self::smooth_dt)
/// (`1 / (fps * fps_base)`) drives only the exponential position smoothing.
/// The asymmetry compensates for host-side sub-frame stepping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstanceConfig {
    /// Number of solver substeps per frame.
    pub substeps: u32,
    /// Compute device requested for the solver.
    pub device: Device,
    /// Contact material constants.
    pub material: MaterialParams,
    /// Uniform scale applied to host shape dimensions.
    pub scale: f32,
    /// Default particle radius (also the grid search radius fallback).
    pub particle_radius: f32,
    /// Name of the external geometry object to source particles from, if any.
    /// Resolution is the host layer's job; the builder receives the resolved
    /// point cloud.
    pub particle_source: Option<String>,
    /// Synthetic lattice to build when no geometry source is configured.
    pub synthetic: Option<ParticleGridConfig>,
    /// Whether to add a static ground plane to the model.
    pub use_ground_plane: bool,
    /// Time constant (in frames) for kinematic position smoothing.
    pub decay_frames: u32,
    /// Host frames per second.
    pub fps: f32,
    /// Host sub-frame base (frame-rate divisor).
    pub fps_base: f32,
    /// Whether the instance starts active in its manager.
    pub is_active: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            substeps: 5,
            device: Device::Cpu,
            material: MaterialParams::default(),
            scale: 1.0,
            particle_radius: 0.1,
            particle_source: None,
            synthetic: None,
            use_ground_plane: true,
            decay_frames: 5,
            fps: 24.0,
            fps_base: 1.0,
            is_active: true,
        }
    }
}

impl InstanceConfig {
    /// Set the solver substep count.
    #[must_use]
    pub fn substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps;
        self
    }

    /// Set the compute device.
    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set the contact material constants.
    #[must_use]
    pub fn material(mut self, material: MaterialParams) -> Self {
        self.material = material;
        self
    }

    /// Set the default particle radius.
    #[must_use]
    pub fn particle_radius(mut self, radius: f32) -> Self {
        self.particle_radius = radius;
        self
    }

    /// Request a synthetic particle lattice.
    #[must_use]
    pub fn synthetic(mut self, grid: ParticleGridConfig) -> Self {
        self.synthetic = Some(grid);
        self
    }

    /// Enable or disable the static ground plane.
    #[must_use]
    pub fn ground_plane(mut self, enabled: bool) -> Self {
        self.use_ground_plane = enabled;
        self
    }

    /// Set the kinematic smoothing time constant.
    #[must_use]
    pub fn decay_frames(mut self, frames: u32) -> Self {
        self.decay_frames = frames;
        self
    }

    /// Set the host frame rate.
    #[must_use]
    pub fn fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    /// The solver frame delta: `1 / fps`.
    #[must_use]
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.fps
    }

    /// The smoothing delta: `1 / (fps * fps_base)`.
    ///
    /// Distinct from [`frame_dt`](Self::frame_dt) on purpose; see the type
    /// docs.
    #[must_use]
    pub fn smooth_dt(&self) -> f32 {
        1.0 / (self.fps * self.fps_base)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.substeps == 0 {
            return Err(crate::SimError::invalid_config(
                "substeps must be at least 1",
            ));
        }

        if self.decay_frames == 0 {
            return Err(crate::SimError::invalid_config(
                "decay_frames must be at least 1",
            ));
        }

        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(crate::SimError::InvalidTiming(self.fps));
        }

        if !self.fps_base.is_finite() || self.fps_base <= 0.0 {
            return Err(crate::SimError::InvalidTiming(self.fps_base));
        }

        if !self.particle_radius.is_finite() || self.particle_radius <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "particle_radius must be positive",
            ));
        }

        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(crate::SimError::invalid_config("scale must be positive"));
        }

        Ok(())
    }
}
