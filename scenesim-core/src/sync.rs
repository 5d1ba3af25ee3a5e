//! Host ↔ simulation transform synchronization.
//!
//! Two concerns live here: the exact relabeling between the host's `x,y,z,w`
//! quaternion order and the simulation's scalar-first order, and the smoothed
//! kinematic transform with its synthesized velocity.
//!
//! # Smoothing
//!
//! A kinematic body is positionally authoritative from the host, but snapping
//! it straight to the host position would teleport it relative to resolved
//! contacts. Instead the simulated position decays toward the host position:
//!
//! ```text
//! smoothed = host + (sim - host) * exp(-decay_frames * smooth_dt)
//! ```
//!
//! `smooth_dt` is the true sub-frame delta `1 / (fps * fps_base)` - not the
//! solver step `frame_dt` - while the synthesized velocity divides by
//! `frame_dt`. The two deltas are intentionally distinct.
//!
//! # Example
//!
//! ```
//! use scenesim_core::sync::{quat_to_host, quat_to_sim};
//!
//! let host = [0.0, 0.0, 0.7071068, 0.7071068]; // 90° around Z, xyzw
//! let sim = quat_to_sim(host);
//! assert_eq!(quat_to_host(&sim), host); // exact, not approximate
//! ```

use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use scenesim_types::{HostTransform, Pose};

/// Relabel a host `x,y,z,w` quaternion into the simulation representation.
///
/// Pure component shuffling: no renormalization, so the round trip through
/// [`quat_to_host`] is bit-exact.
#[must_use]
pub fn quat_to_sim(q: [f32; 4]) -> UnitQuaternion<f32> {
    UnitQuaternion::new_unchecked(Quaternion::new(q[3], q[0], q[1], q[2]))
}

/// Relabel a simulation quaternion back into host `x,y,z,w` order.
#[must_use]
pub fn quat_to_host(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.i, q.j, q.k, q.w]
}

/// Convert a host transform into a simulation pose.
#[must_use]
pub fn pose_to_sim(t: &HostTransform) -> Pose {
    Pose::from_position_rotation(
        Point3::new(t.position[0], t.position[1], t.position[2]),
        quat_to_sim(t.rotation),
    )
}

/// Convert a simulation pose into a host transform.
#[must_use]
pub fn pose_to_host(p: &Pose) -> HostTransform {
    HostTransform::new(
        [p.position.x, p.position.y, p.position.z],
        quat_to_host(&p.rotation),
    )
}

/// Compute a kinematic body's smoothed pose and synthesized velocity for one
/// step.
///
/// * `host` - the body's current host transform (authoritative position).
/// * `sim_prev` - the body's pose in the current simulation state.
/// * `decay_frames` - smoothing time constant; larger decays faster.
/// * `smooth_dt` - sub-frame delta `1 / (fps * fps_base)`, smoothing only.
/// * `frame_dt` - solver frame delta `1 / fps`, velocity synthesis only.
/// * `clock` - instance step counter; `0` disables smoothing entirely.
///
/// On the first step the host transform is returned unchanged with zero
/// velocity. Afterwards the position blends from the last simulated position
/// toward the host position, the rotation is copied from the host unsmoothed,
/// and the returned velocity is what the state must carry *during* the solve
/// so contacts feel the motion - it is discarded again after the solve.
#[must_use]
pub fn kinematic_pose(
    host: &HostTransform,
    sim_prev: &Pose,
    decay_frames: u32,
    smooth_dt: f32,
    frame_dt: f32,
    clock: u64,
) -> (Pose, Vector3<f32>) {
    let target = pose_to_sim(host);

    if clock == 0 {
        return (target, Vector3::zeros());
    }

    let blend = (-(decay_frames as f32) * smooth_dt).exp();
    let smoothed =
        target.position + (sim_prev.position - target.position) * blend;
    let velocity = (smoothed - sim_prev.position) / frame_dt;

    (
        Pose::from_position_rotation(smoothed, target.rotation),
        velocity,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quat_round_trip_is_exact() {
        let identity = [0.0, 0.0, 0.0, 1.0];
        assert_eq!(quat_to_host(&quat_to_sim(identity)), identity);

        // 90° around each axis.
        let s = std::f32::consts::FRAC_1_SQRT_2;
        for q in [[s, 0.0, 0.0, s], [0.0, s, 0.0, s], [0.0, 0.0, s, s]] {
            assert_eq!(quat_to_host(&quat_to_sim(q)), q);
        }

        // An arbitrary unit quaternion: the relabeling must preserve the
        // exact bits, including any normalization error it carries.
        let arbitrary = {
            let u = UnitQuaternion::from_euler_angles(0.3_f32, -1.1, 2.4);
            [u.i, u.j, u.k, u.w]
        };
        assert_eq!(quat_to_host(&quat_to_sim(arbitrary)), arbitrary);
    }

    #[test]
    fn test_quat_relabeling_maps_components() {
        let q = quat_to_sim([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(q.w, 0.4);
        assert_eq!(q.i, 0.1);
        assert_eq!(q.j, 0.2);
        assert_eq!(q.k, 0.3);
    }

    #[test]
    fn test_first_step_passes_host_through() {
        let host = HostTransform::from_position([1.0, 2.0, 3.0]);
        let prev = Pose::from_position(Point3::new(9.0, 9.0, 9.0));

        let (pose, vel) = kinematic_pose(&host, &prev, 5, 1.0 / 24.0, 1.0 / 24.0, 0);
        assert_eq!(pose.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(vel, Vector3::zeros());
    }

    #[test]
    fn test_smoothing_lands_between_sim_and_host() {
        let host = HostTransform::from_position([0.0, 0.0, 4.0]);
        let prev = Pose::from_position(Point3::new(0.0, 0.0, 5.0));

        let (pose, vel) = kinematic_pose(&host, &prev, 5, 1.0 / 24.0, 1.0 / 24.0, 1);

        assert!(pose.position.z > 4.0 && pose.position.z < 5.0);
        // Moving down toward the host, so the synthesized velocity is
        // negative in z.
        assert!(vel.z < 0.0);
    }

    #[test]
    fn test_larger_decay_catches_up_faster() {
        let host = HostTransform::from_position([0.0, 0.0, 0.0]);
        let prev = Pose::from_position(Point3::new(0.0, 0.0, 1.0));

        let (slow, _) = kinematic_pose(&host, &prev, 2, 1.0 / 24.0, 1.0 / 24.0, 1);
        let (fast, _) = kinematic_pose(&host, &prev, 20, 1.0 / 24.0, 1.0 / 24.0, 1);

        assert!(fast.position.z < slow.position.z);
    }

    #[test]
    fn test_velocity_uses_frame_delta_not_smooth_delta() {
        let host = HostTransform::from_position([0.0, 0.0, 0.0]);
        let prev = Pose::from_position(Point3::new(0.0, 0.0, 1.0));

        let smooth_dt = 1.0 / 48.0; // fps_base = 2
        let frame_dt = 1.0 / 24.0;
        let (pose, vel) = kinematic_pose(&host, &prev, 5, smooth_dt, frame_dt, 1);

        let expected = (pose.position.z - prev.position.z) / frame_dt;
        assert_relative_eq!(vel.z, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_copied_unsmoothed() {
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let host = HostTransform::new([0.0, 0.0, 0.0], [0.0, 0.0, s, s]);
        let prev = Pose::identity();

        let (pose, _) = kinematic_pose(&host, &prev, 5, 1.0 / 24.0, 1.0 / 24.0, 7);
        assert_eq!(quat_to_host(&pose.rotation), [0.0, 0.0, s, s]);
    }

    #[test]
    fn test_pose_conversions_round_trip() {
        let host = HostTransform::new([1.0, -2.0, 3.5], [0.0, 0.0, 0.0, 1.0]);
        let pose = pose_to_sim(&host);
        assert_eq!(pose_to_host(&pose), host);
    }
}
