//! Controller & Sequence Tests
//!
//! Tests for:
//! - Time mapping through controller advance (frequency/phase/extrapolation)
//! - Active → inactive baseline revert from the source record
//! - Controller rebuild after asset data changes
//! - Sequence switching: binding, silent skips, multi-target fan-out
//! - The two-pass frame driver ordering (bones before skin)

use std::sync::Arc;

use glam::{Quat, Vec3};

use sinew::animation::{Controller, ControllerState};
use sinew::scene::{Mesh, Node, Scene};
use sinew::skinning::{BoneInfluences, Skin, SkinWeights, VertexWeight};
use sinew::source::{Record, Value};
use sinew::Trs;

const EPSILON: f32 = 1e-4;

// Controller flags: bit 3 = active, bits 1-2 = extrapolation selector
// (0 cyclic, 1 reverse, 2 constant).
const ACTIVE_CONSTANT: u32 = 0b1100;
const ACTIVE_CYCLIC: u32 = 0b1000;
const INACTIVE_CONSTANT: u32 = 0b0100;

fn translation_data(times: Vec<f32>, values: Vec<Vec3>) -> Record {
    Record::build("TransformData")
        .set(
            "Translations",
            Record::build("Keys")
                .set("Interpolation", 1_u32)
                .set("Time", times)
                .set("Value", values)
                .finish(),
        )
        .finish()
}

fn transform_controller(target: &str, flags: u32, data: Record) -> Record {
    Record::build("Controller")
        .set("Targets", vec![target])
        .set("Start Time", 0.0_f32)
        .set("Stop Time", 10.0_f32)
        .set("Phase", 0.0_f32)
        .set("Frequency", 1.0_f32)
        .set("Flags", flags)
        .set("Data", data)
        .finish()
}

// ============================================================================
// Advance and time mapping
// ============================================================================

#[test]
fn active_controller_writes_mapped_value() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("door"));

    let rec = transform_controller(
        "door",
        ACTIVE_CONSTANT,
        translation_data(vec![0.0, 10.0], vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
    );
    let controller = Controller::from_record(Arc::new(rec), &scene);
    assert_eq!(controller.state(), ControllerState::Active);
    scene.add_controller(controller);

    scene.advance(5.0);
    let handle = scene.find_node("door").unwrap();
    let t = scene.get_node(handle).unwrap().transform.translation;
    assert!((t - Vec3::new(5.0, 0.0, 0.0)).length() < EPSILON, "{t}");

    // Constant extrapolation clamps past the stop time
    scene.advance(25.0);
    let t = scene.get_node(handle).unwrap().transform.translation;
    assert!((t - Vec3::new(10.0, 0.0, 0.0)).length() < EPSILON, "{t}");
}

#[test]
fn cyclic_controller_wraps() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("fan"));

    let rec = transform_controller(
        "fan",
        ACTIVE_CYCLIC,
        translation_data(vec![0.0, 10.0], vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
    );
    let controller = Controller::from_record(Arc::new(rec), &scene);
    scene.add_controller(controller);

    scene.advance(23.0);
    let handle = scene.find_node("fan").unwrap();
    let t = scene.get_node(handle).unwrap().transform.translation;
    assert!((t - Vec3::new(3.0, 0.0, 0.0)).length() < EPSILON, "{t}");
}

#[test]
fn unresolved_target_leaves_controller_unbound() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("present"));

    let rec = transform_controller(
        "absent",
        ACTIVE_CONSTANT,
        translation_data(vec![0.0], vec![Vec3::ONE]),
    );
    let controller = Controller::from_record(Arc::new(rec), &scene);
    assert_eq!(controller.state(), ControllerState::Unbound);
    scene.add_controller(controller);

    // Advancing an unbound controller is a no-op, not a crash
    scene.advance(1.0);
}

// ============================================================================
// Baseline revert
// ============================================================================

#[test]
fn deactivation_reverts_target_to_record_baseline() {
    let mut scene = Scene::new();
    let node_rec = Arc::new(
        Record::build("Node")
            .set("Name", "lamp")
            .set("Translation", Vec3::new(7.0, 8.0, 9.0))
            .set("Alpha", 0.5_f32)
            .finish(),
    );
    scene.add_node(Node::from_record(node_rec));

    let rec = transform_controller(
        "lamp",
        ACTIVE_CONSTANT,
        translation_data(vec![0.0, 10.0], vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
    );
    let mut controller = Controller::from_record(Arc::new(rec), &scene);

    controller.advance(&mut scene, 5.0);
    let handle = scene.find_node("lamp").unwrap();
    let animated = scene.get_node(handle).unwrap().transform.translation;
    assert!((animated - Vec3::new(5.0, 0.0, 0.0)).length() < EPSILON);

    // Asset flips the active flag off: the target must re-derive its
    // baseline from the record, not from any cached value.
    controller.set_active(false);
    controller.advance(&mut scene, 6.0);
    let node = scene.get_node(handle).unwrap();
    assert!((node.transform.translation - Vec3::new(7.0, 8.0, 9.0)).length() < EPSILON);
    assert!((node.appearance.alpha - 0.5).abs() < EPSILON);
}

// ============================================================================
// Rebuild on asset change
// ============================================================================

#[test]
fn rebuild_rereads_flags_and_timing() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("gate"));

    let rec = transform_controller(
        "gate",
        INACTIVE_CONSTANT,
        translation_data(vec![0.0], vec![Vec3::ONE]),
    );
    let mut controller = Controller::from_record(Arc::new(rec), &scene);
    assert_eq!(controller.state(), ControllerState::Inactive);
    assert!((controller.timing.stop - 10.0).abs() < EPSILON);

    controller.rebuild(&scene);
    assert_eq!(controller.state(), ControllerState::Inactive);
}

// ============================================================================
// Sequences
// ============================================================================

fn sequence_record(name: &str, bindings: Vec<Record>) -> Record {
    Record::build("Sequence")
        .set("Name", name)
        .set("Start Time", 0.0_f32)
        .set("Stop Time", 4.0_f32)
        .set("Frequency", 1.0_f32)
        .set("Flags", ACTIVE_CONSTANT)
        .set("Bindings", bindings)
        .finish()
}

fn binding(targets: Vec<&str>, data: Option<Record>) -> Record {
    let mut builder = Record::build("Binding").set("Targets", targets);
    if let Some(data) = data {
        builder = builder.set("Data", data);
    }
    builder.finish()
}

#[test]
fn set_sequence_binds_resolvable_and_skips_the_rest() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("a"));
    scene.add_node(Node::new("b"));

    let seq = sinew::Sequence::from_record(&sequence_record(
        "walk",
        vec![
            binding(
                vec!["a"],
                Some(translation_data(
                    vec![0.0, 4.0],
                    vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)],
                )),
            ),
            // Target not in this scene: silently skipped
            binding(
                vec!["ghost"],
                Some(translation_data(vec![0.0], vec![Vec3::ONE])),
            ),
            // Malformed: no interpolator data, skipped per-entry
            binding(vec!["b"], None),
        ],
    ));
    scene.player.add_sequence(seq);
    scene.set_sequence("walk");

    assert_eq!(scene.player.current(), Some("walk"));
    assert_eq!(scene.player.controllers().len(), 1);

    scene.advance(2.0);
    let a = scene.find_node("a").unwrap();
    let t = scene.get_node(a).unwrap().transform.translation;
    assert!((t - Vec3::new(2.0, 0.0, 0.0)).length() < EPSILON, "{t}");
}

#[test]
fn unknown_sequence_is_a_quiet_no_op() {
    let mut scene = Scene::new();
    scene.set_sequence("nothing-here");
    assert_eq!(scene.player.current(), None);
}

#[test]
fn multi_target_binding_fans_out_with_shared_time() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("left"));
    scene.add_node(Node::new("right"));

    let seq = sinew::Sequence::from_record(&sequence_record(
        "sway",
        vec![binding(
            vec!["left", "right", "ghost"],
            Some(translation_data(
                vec![0.0, 4.0],
                vec![Vec3::ZERO, Vec3::new(0.0, 4.0, 0.0)],
            )),
        )],
    ));
    scene.player.add_sequence(seq);
    scene.set_sequence("sway");
    assert_eq!(scene.player.controllers().len(), 1);
    assert_eq!(scene.player.controllers()[0].targets().len(), 2);

    scene.advance(1.0);
    for name in ["left", "right"] {
        let handle = scene.find_node(name).unwrap();
        let t = scene.get_node(handle).unwrap().transform.translation;
        assert!((t - Vec3::new(0.0, 1.0, 0.0)).length() < EPSILON, "{name}: {t}");
    }
}

#[test]
fn switching_sequences_replaces_controllers() {
    let mut scene = Scene::new();
    scene.add_node(Node::new("a"));

    let walk = sinew::Sequence::from_record(&sequence_record(
        "walk",
        vec![binding(
            vec!["a"],
            Some(translation_data(vec![0.0], vec![Vec3::X])),
        )],
    ));
    let idle = sinew::Sequence::from_record(&sequence_record(
        "idle",
        vec![binding(
            vec!["a"],
            Some(translation_data(vec![0.0], vec![Vec3::Y])),
        )],
    ));
    scene.player.add_sequence(walk);
    scene.player.add_sequence(idle);

    scene.set_sequence("walk");
    scene.advance(0.0);
    let a = scene.find_node("a").unwrap();
    assert!((scene.get_node(a).unwrap().transform.translation - Vec3::X).length() < EPSILON);

    scene.set_sequence("idle");
    scene.advance(0.1);
    assert!((scene.get_node(a).unwrap().transform.translation - Vec3::Y).length() < EPSILON);
}

// ============================================================================
// Frame driver: bones animate in pass 1, skin reads them in pass 2
// ============================================================================

#[test]
fn frame_driver_orders_bones_before_skin() {
    let mut scene = Scene::new();

    let bone = scene.add_node(Node::new("bone"));
    let skin = Skin {
        bones: vec![bone],
        skin_to_bone: vec![Trs::IDENTITY],
        weights: SkinWeights::Flat(vec![BoneInfluences {
            weights: vec![VertexWeight {
                vertex: 0,
                weight: 1.0,
            }],
        }]),
    };
    let mesh = Mesh::new("skinned", vec![Vec3::ZERO], vec![]).with_skin(skin);
    let mesh_key = scene.add_mesh(mesh);
    let mut geometry = Node::new("geometry");
    geometry.mesh = Some(mesh_key);
    scene.add_node(geometry);

    // The bone is itself a controller target
    let rec = transform_controller(
        "bone",
        ACTIVE_CONSTANT,
        translation_data(vec![0.0, 10.0], vec![Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0)]),
    );
    let controller = Controller::from_record(Arc::new(rec), &scene);
    scene.add_controller(controller);

    scene.advance(5.0);

    // Skin output must reflect the bone pose written this same frame
    let mesh = scene.meshes.get(mesh_key).unwrap();
    let deformed = mesh.out_positions[0];
    assert!(
        (deformed - Vec3::new(0.0, 5.0, 0.0)).length() < EPSILON,
        "{deformed}",
    );
    assert!((mesh.bounds.center - deformed).length() < EPSILON);
}

#[test]
fn rigid_fallback_keeps_bind_pose_buffers() {
    let mut scene = Scene::new();
    scene.skinning_enabled = false;

    let bone = scene.add_node(Node::new("bone"));
    let skin = Skin {
        bones: vec![bone],
        skin_to_bone: vec![Trs::IDENTITY],
        weights: SkinWeights::Flat(vec![BoneInfluences {
            weights: vec![VertexWeight {
                vertex: 0,
                weight: 1.0,
            }],
        }]),
    };
    let rest = Vec3::new(1.0, 2.0, 3.0);
    let mesh_key = scene.add_mesh(Mesh::new("skinned", vec![rest], vec![]).with_skin(skin));
    let mut geometry = Node::new("geometry");
    geometry.mesh = Some(mesh_key);
    scene.add_node(geometry);

    scene
        .get_node_mut(bone)
        .unwrap()
        .transform
        .translation = Vec3::splat(100.0);
    scene.advance(1.0);

    // Pipeline bypassed: deformed buffers still hold the bind pose
    let mesh = scene.meshes.get(mesh_key).unwrap();
    assert!((mesh.out_positions[0] - rest).length() < EPSILON);
}

// ============================================================================
// Value plumbing
// ============================================================================

#[test]
fn record_values_round_trip_through_controllers() {
    // Quaternion rotation keys drive the node's rotation
    let mut scene = Scene::new();
    scene.add_node(Node::new("spinner"));

    let data = Record::build("TransformData")
        .set(
            "Rotations",
            Record::build("Keys")
                .set("Interpolation", 1_u32)
                .set("Time", vec![0.0_f32, 2.0])
                .set(
                    "Value",
                    Value::from(vec![Quat::IDENTITY, Quat::from_rotation_y(1.0)]),
                )
                .finish(),
        )
        .finish();
    let rec = transform_controller("spinner", ACTIVE_CONSTANT, data);
    scene.add_controller(Controller::from_record(Arc::new(rec), &scene));

    scene.advance(2.0);
    let handle = scene.find_node("spinner").unwrap();
    let rotation = scene.get_node(handle).unwrap().transform.rotation;
    assert!(rotation.angle_between(Quat::from_rotation_y(1.0)) < 1e-3);
}
