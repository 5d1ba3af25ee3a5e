//! Core types for scene-synchronized physics simulation.
//!
//! This crate provides the foundational types shared between the simulation
//! core and its host integration:
//!
//! - [`Pose`] / [`Twist`] - rigid-body transforms and velocities (sim side)
//! - [`HostTransform`] - transforms as the host scene graph represents them
//! - [`InstanceConfig`] - per-instance tunables consumed at build/step time
//! - [`InstanceId`] - opaque identity for simulation instances
//! - [`SimError`] - the error taxonomy for all fallible operations
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They have no stepping logic, no solver, no
//! host lookups. They're the common language between:
//!
//! - The simulation core (instance lifecycle, manager fan-out)
//! - Host scene-graph adapters (transform reads and writebacks)
//! - Diagnostics and replay tooling
//!
//! # Conventions
//!
//! The simulation side stores rotations scalar-first (`nalgebra`'s
//! `UnitQuaternion`); the host side stores them `x,y,z,w`. The conversion
//! between the two is a pure relabeling and lives with the synchronization
//! code, not here.
//!
//! # Example
//!
//! ```
//! use scenesim_types::{Pose, Twist};
//! use nalgebra::Point3;
//!
//! let pose = Pose::from_position(Point3::new(0.0, 0.0, 5.0));
//! let twist = Twist::zero();
//!
//! assert_eq!(pose.position.z, 5.0);
//! assert!(twist.speed() < 1e-10);
//! ```

#![doc(html_root_url = "https://docs.rs/scenesim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,  // Many methods can't be const due to nalgebra
    clippy::cast_precision_loss,   // usize to f32 is fine for counts
    clippy::missing_errors_doc,    // Error docs added where non-obvious
)]

mod config;
mod error;
mod id;
mod transform;

pub use config::{Device, InstanceConfig, MaterialParams, ParticleGridConfig};
pub use error::SimError;
pub use id::InstanceId;
pub use transform::{HostTransform, Pose, Twist};

// Re-export math types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
