//! Cross-module protocol tests: the four-phase step, the double-buffer swap,
//! kinematic pinning, and the manager's per-tick fan-out.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::collections::{HashMap, HashSet};

use approx::assert_relative_eq;
use scenesim_core::sync::{kinematic_pose, quat_to_host};
use scenesim_core::{
    BodyRole, BodySnapshot, HostScene, HostShape, SceneView, ShapeKind, SimulationInstance,
    SimulationManager,
};
use scenesim_types::{HostTransform, InstanceConfig, InstanceId};

// =============================================================================
// Host mocks
// =============================================================================

#[derive(Clone)]
struct MockBody {
    transform: HostTransform,
    role: BodyRole,
}

#[derive(Default)]
struct MockScene {
    bodies: Vec<MockBody>,
    writebacks: Vec<(usize, HostTransform, [f32; 3])>,
    particle_updates: Vec<usize>,
}

impl MockScene {
    fn with_body(transform: HostTransform, role: BodyRole) -> Self {
        Self {
            bodies: vec![MockBody { transform, role }],
            ..Default::default()
        }
    }

    fn snapshot(&self, slot: usize) -> BodySnapshot {
        BodySnapshot::new(
            self.bodies[slot].transform,
            HostShape::new(ShapeKind::Box, [1.0, 1.0, 1.0]),
            self.bodies[slot].role,
        )
    }

    fn snapshots(&self) -> Vec<BodySnapshot> {
        (0..self.bodies.len()).map(|i| self.snapshot(i)).collect()
    }
}

impl HostScene for MockScene {
    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn body_transform(&self, slot: usize) -> HostTransform {
        self.bodies[slot].transform
    }

    fn body_role(&self, slot: usize) -> BodyRole {
        self.bodies[slot].role
    }

    fn write_back(&mut self, slot: usize, transform: HostTransform, linear: [f32; 3], _angular: [f32; 3]) {
        self.bodies[slot].transform = transform;
        self.writebacks.push((slot, transform, linear));
    }

    fn update_particles(&mut self, positions: &[[f32; 3]], _velocities: &[[f32; 3]]) {
        self.particle_updates.push(positions.len());
    }
}

#[derive(Default)]
struct MockView {
    scenes: HashMap<InstanceId, MockScene>,
    dead: HashSet<InstanceId>,
}

impl SceneView for MockView {
    fn is_live(&self, id: InstanceId) -> bool {
        self.scenes.contains_key(&id) && !self.dead.contains(&id)
    }

    fn scene_mut(&mut self, id: InstanceId) -> Option<&mut dyn HostScene> {
        self.scenes.get_mut(&id).map(|s| s as &mut dyn HostScene)
    }
}

fn kinematic_config() -> InstanceConfig {
    InstanceConfig::default()
        .decay_frames(5)
        .fps(24.0)
        .ground_plane(false)
}

fn compiled_instance(scene: &MockScene, config: InstanceConfig) -> SimulationInstance {
    let mut instance = SimulationInstance::new(config);
    instance.build(&scene.snapshots(), None).unwrap();
    instance.finalize().unwrap();
    instance
}

// =============================================================================
// Double-buffer swap
// =============================================================================

#[test]
fn swap_exchanges_buffer_identity_every_step() {
    let mut scene = MockScene::with_body(
        HostTransform::from_position([0.0, 0.0, 5.0]),
        BodyRole::Kinematic,
    );
    let mut instance = compiled_instance(&scene, kinematic_config());

    for _ in 0..4 {
        let (front, back) = instance.states().unwrap();
        let front_ptr = front.body_q.as_ptr();
        let back_ptr = back.body_q.as_ptr();
        assert_ne!(front_ptr, back_ptr);

        instance.step(&mut scene).unwrap();

        let (front_after, back_after) = instance.states().unwrap();
        // Pointer swap, no copy: the roles exchanged exactly.
        assert_eq!(front_after.body_q.as_ptr(), back_ptr);
        assert_eq!(back_after.body_q.as_ptr(), front_ptr);
    }
}

// =============================================================================
// Kinematic pinning
// =============================================================================

#[test]
fn first_step_pins_raw_host_transform() {
    let mut scene = MockScene::with_body(
        HostTransform::from_position([0.0, 0.0, 5.0]),
        BodyRole::Kinematic,
    );
    let mut instance = compiled_instance(&scene, kinematic_config());

    instance.step(&mut scene).unwrap();

    let state = instance.state().unwrap();
    assert_eq!(state.body_q[0].position.z, 5.0);
    assert_eq!(state.body_qd[0].linear.norm(), 0.0);
    assert_eq!(state.body_qd[0].angular.norm(), 0.0);
    assert_eq!(instance.clock(), 1);

    // The host owns kinematic transforms: nothing was written back.
    assert!(scene.writebacks.is_empty());
}

#[test]
fn kinematic_pose_matches_reference_computation_exactly() {
    let mut scene = MockScene::with_body(
        HostTransform::from_position([0.0, 0.0, 5.0]),
        BodyRole::Kinematic,
    );
    let config = kinematic_config();
    let mut instance = compiled_instance(&scene, config.clone());

    instance.step(&mut scene).unwrap();

    // Move the host and recompute what phase 1 must produce.
    scene.bodies[0].transform = HostTransform::from_position([0.0, 0.0, 4.0]);
    let prev = instance.state().unwrap().body_q[0];
    let (expected, injected) = kinematic_pose(
        &scene.bodies[0].transform,
        &prev,
        config.decay_frames,
        config.smooth_dt(),
        config.frame_dt(),
        instance.clock(),
    );
    assert!(injected.norm() > 0.0, "solve-time velocity must be nonzero");

    instance.step(&mut scene).unwrap();

    // Exact pin, regardless of what the solver computed for the body.
    let state = instance.state().unwrap();
    assert_eq!(state.body_q[0].position, expected.position);
    assert_eq!(state.body_q[0].rotation, expected.rotation);
    // The injected velocity was discarded after the solve.
    assert_eq!(state.body_qd[0].linear.norm(), 0.0);
}

#[test]
fn end_to_end_smoothing_scenario() {
    // 1 kinematic body at (0,0,5), 0 particles, decay_frames = 5,
    // frame_dt = 1/24.
    let mut scene = MockScene::with_body(
        HostTransform::from_position([0.0, 0.0, 5.0]),
        BodyRole::Kinematic,
    );
    let mut instance = compiled_instance(&scene, kinematic_config());

    // Step 1: raw host transform, zero velocity.
    instance.step(&mut scene).unwrap();
    {
        let state = instance.state().unwrap();
        assert_eq!(state.body_q[0].position.z, 5.0);
        assert_eq!(state.body_qd[0].linear.norm(), 0.0);
    }

    // Move the host down one unit and step again.
    scene.bodies[0].transform = HostTransform::from_position([0.0, 0.0, 4.0]);
    instance.step(&mut scene).unwrap();

    let state = instance.state().unwrap();
    let z = state.body_q[0].position.z;
    assert!(z > 4.0 && z < 5.0, "smoothed position must land strictly between, z = {z}");
    assert_eq!(state.body_qd[0].linear.norm(), 0.0);

    // Continuing to step converges toward the host position.
    for _ in 0..200 {
        instance.step(&mut scene).unwrap();
    }
    let z = instance.state().unwrap().body_q[0].position.z;
    assert_relative_eq!(z, 4.0, epsilon = 1e-3);
}

#[test]
fn kinematic_rotation_copied_exactly() {
    let s = std::f32::consts::FRAC_1_SQRT_2;
    let mut scene = MockScene::with_body(
        HostTransform::new([0.0, 0.0, 5.0], [0.0, 0.0, s, s]),
        BodyRole::Kinematic,
    );
    let mut instance = compiled_instance(&scene, kinematic_config());

    instance.step(&mut scene).unwrap();
    instance.step(&mut scene).unwrap();

    let state = instance.state().unwrap();
    assert_eq!(quat_to_host(&state.body_q[0].rotation), [0.0, 0.0, s, s]);
}

// =============================================================================
// Dynamic bodies
// =============================================================================

#[test]
fn dynamic_sync_ignores_host_transform() {
    // The host transform of a dynamic body is stale by definition; phase 1
    // must copy the solver-owned state verbatim instead.
    let mut scene = MockScene::with_body(
        HostTransform::from_position([0.0, 0.0, 2.0]),
        BodyRole::Dynamic,
    );
    let mut instance = compiled_instance(&scene, kinematic_config());

    // Host object teleports somewhere absurd between ticks.
    scene.bodies[0].transform = HostTransform::from_position([999.0, 999.0, 999.0]);

    instance.step(&mut scene).unwrap();

    let state = instance.state().unwrap();
    // Solver-owned: fell under gravity from its build pose, unaffected by
    // the host teleport.
    assert!(state.body_q[0].position.z < 2.0);
    assert_relative_eq!(state.body_q[0].position.x, 0.0, epsilon = 1e-5);

    // And the result was written back to the host.
    assert_eq!(scene.writebacks.len(), 1);
    let (slot, transform, linear) = scene.writebacks[0];
    assert_eq!(slot, 0);
    assert!(transform.position[2] < 2.0);
    assert!(linear[2] < 0.0);
}

#[test]
fn role_toggle_is_honored_without_rebuild() {
    let mut scene = MockScene::with_body(
        HostTransform::from_position([0.0, 0.0, 5.0]),
        BodyRole::Kinematic,
    );
    let mut instance = compiled_instance(&scene, kinematic_config());

    instance.step(&mut scene).unwrap();
    assert!(scene.writebacks.is_empty());

    // Host toggles the body to solver control mid-session.
    scene.bodies[0].role = BodyRole::Dynamic;
    instance.step(&mut scene).unwrap();

    // The body is no longer pinned: gravity moved it and the result was
    // written back.
    let state = instance.state().unwrap();
    assert!(state.body_q[0].position.z < 5.0);
    assert_eq!(scene.writebacks.len(), 1);
}

#[test]
fn particles_are_handed_to_the_host_each_step() {
    let config = kinematic_config().synthetic(scenesim_types::ParticleGridConfig {
        dims: [2, 2, 2],
        origin: [0.0, 0.0, 5.0],
        velocity: [0.0, 0.0, 0.0],
        jitter: 0.0,
    });

    let mut scene = MockScene::default();
    let mut instance = SimulationInstance::new(config);
    instance.build(&[], None).unwrap();
    instance.finalize().unwrap();

    instance.step(&mut scene).unwrap();
    instance.step(&mut scene).unwrap();

    assert_eq!(scene.particle_updates, vec![8, 8]);
}

// =============================================================================
// Manager fan-out
// =============================================================================

fn manager_with_two_instances(view: &mut MockView) -> (SimulationManager, InstanceId, InstanceId) {
    let mut manager = SimulationManager::new();

    let scene_a = MockScene::default();
    let mut a = SimulationInstance::new(kinematic_config());
    a.build(&[], None).unwrap();
    a.finalize().unwrap();
    let id_a = a.id();
    view.scenes.insert(id_a, scene_a);
    manager.add(a);

    let scene_b = MockScene::default();
    let mut b = SimulationInstance::new(kinematic_config());
    b.build(&[], None).unwrap();
    b.finalize().unwrap();
    let id_b = b.id();
    view.scenes.insert(id_b, scene_b);
    manager.add(b);

    (manager, id_a, id_b)
}

#[test]
fn activity_gating_skips_but_retains_instances() {
    let mut view = MockView::default();
    let (mut manager, id_a, id_b) = manager_with_two_instances(&mut view);

    manager.set_active(id_b, false).unwrap();
    manager.step_all(&mut view).unwrap();

    assert_eq!(manager.get(id_a).unwrap().clock(), 1);
    assert_eq!(manager.get(id_b).unwrap().clock(), 0);

    // Reactivation resumes from the retained clock, not from zero.
    manager.set_active(id_b, true).unwrap();
    manager.step_all(&mut view).unwrap();

    assert_eq!(manager.get(id_a).unwrap().clock(), 2);
    assert_eq!(manager.get(id_b).unwrap().clock(), 1);
}

#[test]
fn stale_registrations_are_pruned_not_errored() {
    let mut view = MockView::default();
    let (mut manager, id_a, id_b) = manager_with_two_instances(&mut view);

    // The host list dropped A (e.g. an undo) without telling the manager.
    view.dead.insert(id_a);

    manager.step_all(&mut view).unwrap();

    assert!(manager.get(id_a).unwrap_err().is_not_found());
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.get(id_b).unwrap().clock(), 1);
}

#[test]
fn stepping_uncompiled_instance_fails_fast() {
    let mut view = MockView::default();
    let mut manager = SimulationManager::new();

    let instance = SimulationInstance::new(kinematic_config());
    let id = instance.id();
    view.scenes.insert(id, MockScene::default());
    manager.add(instance);

    let err = manager.step_all(&mut view).unwrap_err();
    assert!(err.is_not_compiled());
}

#[test]
fn removal_is_idempotent_through_the_manager() {
    let mut view = MockView::default();
    let (mut manager, id_a, _id_b) = manager_with_two_instances(&mut view);

    manager.remove(id_a);
    assert_eq!(manager.len(), 1);
    manager.remove(id_a);
    assert_eq!(manager.len(), 1);
}
