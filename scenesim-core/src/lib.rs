//! Scene-synchronized particle/rigid-body simulation core.
//!
//! This crate steps a real-time particle/rigid-body simulation once per
//! external clock tick, keeping a subset of rigid bodies synchronized with an
//! externally authored scene graph while a constraint solver owns the rest.
//!
//! # Architecture
//!
//! The model pipeline follows `ModelBuilder → Model → State → Solver →
//! updated State`:
//!
//! - [`ModelBuilder`] accumulates bodies, shapes, and particles from host
//!   snapshots; [`Model`] is the frozen, immutable result.
//! - [`State`] is double-buffered inside each [`SimulationInstance`]; the
//!   buffers swap roles every step without copying.
//! - [`Solver`] is an opaque boundary invoked as
//!   `step(state_in, state_out, control, contacts, dt)`; [`XpbdSolver`] is
//!   the reference implementation.
//! - [`SimulationManager`] owns a keyed collection of instances and drives
//!   the per-tick fan-out.
//!
//! # Kinematic vs dynamic bodies
//!
//! Bodies tagged [`BodyRole::Kinematic`] are host-driven: their position
//! decays toward the host transform ([`sync`]), a velocity is synthesized so
//! colliding particles feel the motion, and after the solve their pose is
//! restored and their velocity zeroed - the solver can never perturb them.
//! [`BodyRole::Dynamic`] bodies belong to the solver and are written back to
//! the host every step.
//!
//! # Example
//!
//! ```no_run
//! use scenesim_core::{SimulationInstance, SimulationManager};
//! use scenesim_types::InstanceConfig;
//!
//! let mut manager = SimulationManager::new();
//!
//! let mut instance = SimulationInstance::new(InstanceConfig::default());
//! instance.build(&[], None)?;
//! instance.finalize()?;
//! let id = manager.add(instance);
//!
//! // Each external tick: manager.step_all(&mut host_view)?;
//! # let _ = id;
//! # Ok::<(), scenesim_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/scenesim-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,  // Many methods can't be const due to nalgebra
    clippy::cast_precision_loss,   // usize to f32 is fine for counts
    clippy::missing_errors_doc,    // Error docs added where non-obvious
)]

pub mod collide;
pub mod grid;
pub mod host;
pub mod instance;
pub mod manager;
pub mod model;
pub mod shape;
pub mod solver;
pub mod state;
pub mod sync;

pub use collide::{collide, Contacts, PairContact, ShapeContact};
pub use grid::SpatialGrid;
pub use host::{BodyRole, BodySnapshot, HostScene, PointCloud, SceneView};
pub use instance::{BodyBinding, SimulationInstance, StepTiming};
pub use manager::SimulationManager;
pub use model::{Axis, Control, Model, ModelBuilder, ShapeAttachment};
pub use shape::{CollisionShape, HostShape, ShapeKind};
pub use solver::{Solver, XpbdSolver};
pub use state::State;

// Re-export the types crate so downstream users need only one dependency.
pub use scenesim_types as types;
