//! The constraint solver boundary.
//!
//! The core treats the solver as an opaque box invoked as
//! `step(state_in, state_out, control, contacts, dt)`: it must fill
//! `state_out` with the advanced state and leave `state_in` untouched.
//! [`XpbdSolver`] is the reference implementation - a substepped
//! position-based scheme - but nothing in the stepping protocol depends on
//! its numerics; swap in anything that honors the trait contract.

use std::sync::Arc;

use nalgebra::{UnitQuaternion, Vector3};
use scenesim_types::Device;

use crate::collide::{particle_shape_contact, Contacts};
use crate::model::{Control, Model};
use crate::state::State;

/// A constraint solver advancing `state_in` into `state_out` over `dt`.
pub trait Solver {
    /// Advance one frame.
    ///
    /// `state_out` is overwritten wholesale; `state_in` is read-only. The
    /// contact set is fixed for the frame, though implementations may
    /// re-evaluate penetrations as shapes move within substeps.
    fn step(
        &mut self,
        state_in: &State,
        state_out: &mut State,
        control: &Control,
        contacts: &Contacts,
        dt: f32,
    );
}

/// Reference position-based solver with fixed substepping.
pub struct XpbdSolver {
    model: Arc<Model>,
    substeps: u32,
}

impl XpbdSolver {
    /// Create a solver for a model with the given substep count.
    #[must_use]
    pub fn new(model: Arc<Model>, substeps: u32) -> Self {
        if model.device() == Device::Gpu {
            tracing::debug!("gpu device requested; reference solver executes on the cpu");
        }
        Self {
            model,
            substeps: substeps.max(1),
        }
    }

    /// Substep count per frame.
    #[must_use]
    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    fn integrate_bodies(&self, state: &mut State, gravity: &Vector3<f32>, h: f32) {
        for b in 0..state.body_count() {
            let qd = &mut state.body_qd[b];
            qd.linear += gravity * h;
            let linear = qd.linear;
            let angular = qd.angular;

            let q = &mut state.body_q[b];
            q.position += linear * h;
            if angular.norm_squared() > 0.0 {
                q.rotation = UnitQuaternion::from_scaled_axis(angular * h) * q.rotation;
            }
        }
    }

    fn integrate_particles(&self, state: &mut State, gravity: &Vector3<f32>, h: f32) {
        let masses = self.model.particle_masses();
        for i in 0..state.particle_count() {
            let m = masses[i];
            if m <= 0.0 {
                continue;
            }
            let accel = gravity + state.particle_f[i] / m;
            state.particle_qd[i] += accel * h;
            let v = state.particle_qd[i];
            state.particle_q[i] += v * h;
        }
    }

    fn solve_shape_contacts(&self, state: &mut State, contacts: &Contacts, h: f32) {
        let radii = self.model.particle_radii();
        let masses = self.model.particle_masses();

        for c in &contacts.shape {
            let attachment = &self.model.shapes()[c.shape];
            let pose = attachment
                .body
                .map_or_else(scenesim_types::Pose::identity, |b| state.body_q[b]);

            let p = state.particle_q[c.particle];
            let Some((n, depth)) =
                particle_shape_contact(&attachment.shape, &pose, &p, radii[c.particle])
            else {
                continue;
            };

            // Project the particle out of the shape.
            state.particle_q[c.particle] += n * depth;

            // Velocity of the shape surface at the contact point. For a
            // kinematic body this is the synthesized host velocity, which is
            // exactly how host motion reaches the particles.
            let v_surface = attachment.body.map_or_else(Vector3::zeros, |b| {
                state.body_qd[b].velocity_at_point(&(p.coords - state.body_q[b].position.coords))
            });

            let vrel = state.particle_qd[c.particle] - v_surface;
            let vn = vrel.dot(&n);
            if vn < 0.0 {
                // Inelastic normal response.
                state.particle_qd[c.particle] -= n * vn;
                if let Some(b) = attachment.body {
                    // Equal and opposite momentum onto the body.
                    let ratio = masses[c.particle] / self.model.body_mass(b);
                    state.body_qd[b].linear += n * vn * ratio;
                }
            }

            // Tangential friction damping.
            let vt = vrel - n * vn;
            let friction = (attachment.material.kf * h).min(1.0);
            state.particle_qd[c.particle] -= vt * friction;
        }
    }

    fn solve_pair_contacts(&self, state: &mut State, contacts: &Contacts) {
        let radii = self.model.particle_radii();
        let masses = self.model.particle_masses();

        for c in &contacts.pairs {
            let diff = state.particle_q[c.a] - state.particle_q[c.b];
            let dist = diff.norm();
            if dist <= 1e-6 {
                continue;
            }
            let depth = (radii[c.a] + radii[c.b]) - dist;
            if depth <= 0.0 {
                continue;
            }
            let n = diff / dist;

            let wa = 1.0 / masses[c.a].max(1e-6);
            let wb = 1.0 / masses[c.b].max(1e-6);
            let w = wa + wb;

            state.particle_q[c.a] += n * (depth * wa / w);
            state.particle_q[c.b] -= n * (depth * wb / w);

            let vn = (state.particle_qd[c.a] - state.particle_qd[c.b]).dot(&n);
            if vn < 0.0 {
                let delta = n * (vn / w);
                state.particle_qd[c.a] -= delta * wa;
                state.particle_qd[c.b] += delta * wb;
            }
        }
    }
}

impl Solver for XpbdSolver {
    fn step(
        &mut self,
        state_in: &State,
        state_out: &mut State,
        control: &Control,
        contacts: &Contacts,
        dt: f32,
    ) {
        state_out.clone_from(state_in);

        let h = dt / self.substeps as f32;
        for _ in 0..self.substeps {
            self.integrate_bodies(state_out, &control.gravity, h);
            self.integrate_particles(state_out, &control.gravity, h);
            self.solve_shape_contacts(state_out, contacts, h);
            self.solve_pair_contacts(state_out, contacts);
        }
    }
}
