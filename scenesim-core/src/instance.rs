//! One simulation instance: model lifecycle and the per-tick step protocol.
//!
//! An instance follows the solver pipeline `ModelBuilder → Model → State →
//! Solver → updated State`, wrapped in the host synchronization protocol:
//!
//! 1. Host → sim sync (kinematic smoothing, velocity injection)
//! 2. Grid rebuild → collide → solve into the back buffer
//! 3. Kinematic restore (pin poses, zero velocities)
//! 4. Buffer swap, sim → host writeback, clock increment
//!
//! The two state buffers are owned by value and swap by `mem::swap`; the
//! solver never sees a half-updated body array because phase 1 writes its
//! batch back in one shot.

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use scenesim_types::{InstanceConfig, InstanceId, Pose, SimError, Twist};

use crate::collide::collide;
use crate::grid::SpatialGrid;
use crate::host::{BodyRole, BodySnapshot, HostScene, PointCloud};
use crate::model::{Control, Model, ModelBuilder};
use crate::solver::{Solver, XpbdSolver};
use crate::state::State;
use crate::sync::{kinematic_pose, pose_to_host, pose_to_sim};

/// Mass assigned to host-driven rigid bodies. Heavy enough that particle
/// reactions barely move a dynamic body between host writebacks.
const RIGID_BODY_MASS: f32 = 1.0e5;

/// One entry of the instance's body list: a host slot bound to a model body.
///
/// The binding order is fixed at build time; `role` is refreshed from the
/// host every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyBinding {
    /// Index into the host scene's body list.
    pub slot: usize,
    /// Index into the model's body array.
    pub body: usize,
    /// Motion ownership as of the last step (or build, before the first).
    pub role: BodyRole,
}

/// Per-step timing diagnostics, overwritten every step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepTiming {
    /// Seconds spent in grid rebuild, collision, and the solver.
    pub compute_s: f32,
    /// Seconds spent writing results back to the host.
    pub sync_s: f32,
}

/// Everything that exists only while the instance is compiled. Dropped as a
/// unit on recompile, so a failed finalize can never leave stale buffers
/// behind.
struct Compiled {
    model: Arc<Model>,
    state_0: State,
    state_1: State,
    solver: Box<dyn Solver>,
    control: Control,
    grid: SpatialGrid,
}

/// A single steppable simulation synchronized with a host scene.
pub struct SimulationInstance {
    id: InstanceId,
    config: InstanceConfig,
    builder: Option<ModelBuilder>,
    compiled: Option<Compiled>,
    body_list: Vec<BodyBinding>,
    clock: u64,
    timing: StepTiming,
}

impl std::fmt::Debug for SimulationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationInstance")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("builder", &self.builder)
            .field("compiled", &self.compiled.as_ref().map(|_| "<compiled>"))
            .field("body_list", &self.body_list)
            .field("clock", &self.clock)
            .field("timing", &self.timing)
            .finish()
    }
}

impl SimulationInstance {
    /// Create an empty instance with a fresh id. No model exists until
    /// [`build`](Self::build) and [`finalize`](Self::finalize) succeed.
    #[must_use]
    pub fn new(config: InstanceConfig) -> Self {
        Self {
            id: InstanceId::fresh(),
            config,
            builder: None,
            compiled: None,
            body_list: Vec::new(),
            clock: 0,
            timing: StepTiming::default(),
        }
    }

    /// The instance's immutable id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Replace the configuration. Smoothing and timing fields take effect on
    /// the next step; structural fields (substeps, device, shapes, particles)
    /// take effect on the next build/finalize.
    pub fn set_config(&mut self, config: InstanceConfig) {
        self.config = config;
    }

    /// Step counter; `0` means the next step is the first.
    #[must_use]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Timing of the most recent step.
    #[must_use]
    pub fn timing(&self) -> StepTiming {
        self.timing
    }

    /// Whether `finalize()` has succeeded since the last build/teardown.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// The body list bindings, in build order.
    #[must_use]
    pub fn body_list(&self) -> &[BodyBinding] {
        &self.body_list
    }

    /// The compiled model.
    pub fn model(&self) -> scenesim_types::Result<&Model> {
        self.compiled
            .as_ref()
            .map(|c| c.model.as_ref())
            .ok_or(SimError::NotCompiled)
    }

    /// The current ("front") state buffer.
    pub fn state(&self) -> scenesim_types::Result<&State> {
        self.compiled
            .as_ref()
            .map(|c| &c.state_0)
            .ok_or(SimError::NotCompiled)
    }

    /// Both state buffers, `(current, back)`. Diagnostic accessor; the swap
    /// invariant tests identity across steps with it.
    pub fn states(&self) -> scenesim_types::Result<(&State, &State)> {
        self.compiled
            .as_ref()
            .map(|c| (&c.state_0, &c.state_1))
            .ok_or(SimError::NotCompiled)
    }

    // =========================================================================
    // Build / finalize
    // =========================================================================

    /// Populate the model builder from current external inputs.
    ///
    /// Every snapshot becomes a body; shapes the builder cannot translate
    /// are skipped with a warning and the body keeps mass but no contact
    /// footprint. A ground plane and a particle source (external cloud, or
    /// the configured synthetic lattice) are added per the config. No bodies
    /// and no particles is legal.
    pub fn build(
        &mut self,
        bodies: &[BodySnapshot],
        particles: Option<&PointCloud>,
    ) -> scenesim_types::Result<()> {
        self.builder = None;
        self.body_list.clear();

        let mut builder = ModelBuilder::new();
        builder.default_particle_radius = self.config.particle_radius;

        for (slot, snapshot) in bodies.iter().enumerate() {
            let pose = pose_to_sim(&snapshot.transform);
            let body = builder.add_body(pose, RIGID_BODY_MASS);

            match snapshot.shape.to_collision_shape(self.config.scale) {
                Some(shape) => {
                    builder.add_shape(body, shape, self.config.material);
                }
                None => {
                    tracing::warn!(
                        instance = %self.id,
                        kind = %snapshot.shape.kind,
                        "unsupported shape kind; body added without a collision shape"
                    );
                }
            }

            self.body_list.push(BodyBinding {
                slot,
                body,
                role: snapshot.role,
            });
        }

        if self.config.use_ground_plane {
            builder.add_ground_plane(self.config.material);
        }

        if let Some(cloud) = particles {
            builder.add_point_cloud(cloud)?;
        } else if let Some(grid) = self.config.synthetic {
            builder.add_particle_grid(&grid);
        }

        self.builder = Some(builder);
        Ok(())
    }

    /// Freeze the builder into an immutable model and allocate states,
    /// solver, and control.
    ///
    /// Recompilation is all-or-nothing: the previous model and both state
    /// buffers are dropped *before* the new model is built, and on failure
    /// the instance is left in the explicit not-compiled state rather than
    /// holding buffers from the old model.
    pub fn finalize(&mut self) -> scenesim_types::Result<()> {
        self.config.validate()?;

        let builder = self.builder.take().ok_or_else(|| {
            SimError::invalid_config("finalize() called before build()")
        })?;

        // Tear down any previous compile first. From here until success the
        // instance is not compiled.
        self.compiled = None;
        self.clock = 0;
        self.timing = StepTiming::default();

        let model = Arc::new(builder.finalize(self.config.device)?);
        let state_0 = model.state();
        let state_1 = model.state();
        let solver: Box<dyn Solver> =
            Box::new(XpbdSolver::new(Arc::clone(&model), self.config.substeps));
        let control = Control::new(model.gravity_vector(), self.config.material);

        tracing::debug!(
            instance = %self.id,
            bodies = model.body_count(),
            shapes = model.shape_count(),
            particles = model.particle_count(),
            device = %model.device(),
            "model compiled"
        );

        self.compiled = Some(Compiled {
            model,
            state_0,
            state_1,
            solver,
            control,
            grid: SpatialGrid::new(),
        });

        Ok(())
    }

    // =========================================================================
    // Step
    // =========================================================================

    /// Execute one complete step against the host scene.
    ///
    /// Fails with [`SimError::NotCompiled`] before a successful finalize.
    /// See the module docs for the four-phase protocol.
    pub fn step(&mut self, scene: &mut dyn HostScene) -> scenesim_types::Result<()> {
        let frame_dt = self.config.frame_dt();
        let smooth_dt = self.config.smooth_dt();
        let decay_frames = self.config.decay_frames;
        let clock = self.clock;

        let Some(compiled) = self.compiled.as_mut() else {
            return Err(SimError::NotCompiled);
        };

        debug_assert_eq!(
            scene.body_count(),
            self.body_list.len(),
            "host body list diverged from the build-time binding"
        );

        // --- Phase 1: host → sim -------------------------------------------
        // Compute the full batch first, then write it back in one shot so the
        // body array is never half-updated.
        let mut batch = compiled.state_0.body_q.clone();
        let mut twists = compiled.state_0.body_qd.clone();
        let mut pins: Vec<(usize, Pose)> = Vec::new();

        for binding in &mut self.body_list {
            let role = scene.body_role(binding.slot);
            binding.role = role;

            match role {
                // Solver-owned: the current state is already authoritative.
                BodyRole::Dynamic => {}
                BodyRole::Kinematic => {
                    let host = scene.body_transform(binding.slot);
                    let prev = compiled.state_0.body_q[binding.body];
                    let (pose, velocity) = kinematic_pose(
                        &host,
                        &prev,
                        decay_frames,
                        smooth_dt,
                        frame_dt,
                        clock,
                    );
                    batch[binding.body] = pose;
                    twists[binding.body] = Twist::linear(velocity);
                    pins.push((binding.body, pose));
                }
            }
        }

        compiled.state_0.body_q.copy_from_slice(&batch);
        compiled.state_0.body_qd.copy_from_slice(&twists);

        // --- Phase 2: collide + solve --------------------------------------
        let compute_start = Instant::now();

        compiled.state_0.clear_forces();
        compiled
            .grid
            .rebuild(&compiled.state_0.particle_q, compiled.model.search_radius() * 2.0);
        let contacts = collide(&compiled.model, &compiled.state_0, &compiled.grid);
        compiled.solver.step(
            &compiled.state_0,
            &mut compiled.state_1,
            &compiled.control,
            &contacts,
            frame_dt,
        );

        let compute_s = compute_start.elapsed().as_secs_f32();

        // --- Phase 3: kinematic restore ------------------------------------
        // Whatever the solver computed for a kinematic body is discarded: its
        // pose is pinned to the phase-1 value and its velocity - injected
        // only so contacts could feel the motion - is zeroed.
        for &(body, pose) in &pins {
            compiled.state_1.body_q[body] = pose;
            compiled.state_1.body_qd[body] = Twist::zero();
        }

        // --- Phase 4: swap + writeback -------------------------------------
        mem::swap(&mut compiled.state_0, &mut compiled.state_1);

        let sync_start = Instant::now();

        for binding in &self.body_list {
            if binding.role.is_dynamic() {
                let pose = compiled.state_0.body_q[binding.body];
                let twist = compiled.state_0.body_qd[binding.body];
                scene.write_back(
                    binding.slot,
                    pose_to_host(&pose),
                    [twist.linear.x, twist.linear.y, twist.linear.z],
                    [twist.angular.x, twist.angular.y, twist.angular.z],
                );
            }
            // Kinematic bodies are never written back: the host already owns
            // their transform.
        }

        let positions: Vec<[f32; 3]> = compiled
            .state_0
            .particle_q
            .iter()
            .map(|p| [p.x, p.y, p.z])
            .collect();
        let velocities: Vec<[f32; 3]> = compiled
            .state_0
            .particle_qd
            .iter()
            .map(|v| [v.x, v.y, v.z])
            .collect();
        scene.update_particles(&positions, &velocities);

        let sync_s = sync_start.elapsed().as_secs_f32();

        self.timing = StepTiming { compute_s, sync_s };
        self.clock += 1;

        Ok(())
    }
}
