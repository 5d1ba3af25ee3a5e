//! Double-bufferable simulation state.
//!
//! A [`State`] holds everything that changes per step: body poses and twists,
//! particle positions, velocities, and accumulated forces. Each instance owns
//! exactly two states of identical schema and swaps their roles every step;
//! the swap is a move of the owned buffers, never a copy.

use nalgebra::{Point3, Vector3};
use scenesim_types::{Pose, Twist};

/// One snapshot of mutable simulation state.
///
/// Allocated from a [`Model`](crate::Model) so both buffers of an instance
/// share the model's schema. Storage is structure-of-arrays: solvers touch
/// whole arrays at a time.
#[derive(Debug)]
pub struct State {
    /// Body poses, indexed by model body index.
    pub body_q: Vec<Pose>,
    /// Body twists, indexed by model body index.
    pub body_qd: Vec<Twist>,
    /// Particle positions.
    pub particle_q: Vec<Point3<f32>>,
    /// Particle velocities.
    pub particle_qd: Vec<Vector3<f32>>,
    /// Accumulated particle forces (cleared at the start of every step).
    pub particle_f: Vec<Vector3<f32>>,
}

impl Clone for State {
    fn clone(&self) -> Self {
        Self {
            body_q: self.body_q.clone(),
            body_qd: self.body_qd.clone(),
            particle_q: self.particle_q.clone(),
            particle_qd: self.particle_qd.clone(),
            particle_f: self.particle_f.clone(),
        }
    }

    // Buffer-reusing overwrite. Solvers call this once per step on the back
    // buffer; both buffers come from the same model, so no reallocation
    // happens and buffer identity survives the step/swap cycle.
    fn clone_from(&mut self, source: &Self) {
        self.body_q.clone_from(&source.body_q);
        self.body_qd.clone_from(&source.body_qd);
        self.particle_q.clone_from(&source.particle_q);
        self.particle_qd.clone_from(&source.particle_qd);
        self.particle_f.clone_from(&source.particle_f);
    }
}

impl State {
    pub(crate) fn new(
        body_q: Vec<Pose>,
        body_qd: Vec<Twist>,
        particle_q: Vec<Point3<f32>>,
        particle_qd: Vec<Vector3<f32>>,
    ) -> Self {
        let n = particle_q.len();
        Self {
            body_q,
            body_qd,
            particle_q,
            particle_qd,
            particle_f: vec![Vector3::zeros(); n],
        }
    }

    /// Number of rigid bodies in this state.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.body_q.len()
    }

    /// Number of particles in this state.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particle_q.len()
    }

    /// Clear accumulated forces.
    pub fn clear_forces(&mut self) {
        for f in &mut self.particle_f {
            *f = Vector3::zeros();
        }
    }

    /// Check that every stored value is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.body_q.iter().all(Pose::is_finite)
            && self.body_qd.iter().all(Twist::is_finite)
            && self
                .particle_q
                .iter()
                .all(|p| p.coords.iter().all(|x| x.is_finite()))
            && self
                .particle_qd
                .iter()
                .all(|v| v.iter().all(|x| x.is_finite()))
    }
}
