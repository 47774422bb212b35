//! Full-stack tests: FrameSync driving a real worker thread over channels.

use glam::Vec3;

use scenelink_bridge::{FrameSync, SceneNode, TouchEvent};
use scenelink_core::{BodyParams, ConstraintKind, ShapeDesc, SoftKind, VehicleTuning, WheelDesc};
use scenelink_worker::{BasicEngine, Worker};

const DT: f32 = 1.0 / 60.0;

fn sync() -> FrameSync {
    FrameSync::new(Worker::spawn(BasicEngine::new(), DT), DT)
}

fn sphere() -> ShapeDesc {
    ShapeDesc::Sphere { radius: 0.5 }
}

#[test]
fn body_falls_under_gravity() {
    let mut sync = sync();
    let ball = sync
        .add_object(
            SceneNode::at(Vec3::new(0.0, 10.0, 0.0)),
            sphere(),
            BodyParams::default(),
        )
        .unwrap();

    assert!(sync.step(DT, None).unwrap());
    sync.pump_until_idle().unwrap();

    let node = sync.node(ball).unwrap();
    assert!(node.position().y < 10.0, "y = {}", node.position().y);
    assert!(sync.object(ball).unwrap().linear_velocity.y < 0.0);
}

#[test]
fn resting_separated_bodies_produce_no_touch_events() {
    let mut sync = sync();
    sync.set_gravity(Vec3::ZERO).unwrap();
    sync.add_object(SceneNode::at(Vec3::ZERO), sphere(), BodyParams::default())
        .unwrap();
    sync.add_object(
        SceneNode::at(Vec3::new(5.0, 0.0, 0.0)),
        sphere(),
        BodyParams::default(),
    )
    .unwrap();

    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    assert!(sync.take_touch_events().is_empty());
}

#[test]
fn touching_bodies_start_and_end_an_episode() {
    let mut sync = sync();
    sync.set_gravity(Vec3::ZERO).unwrap();
    let a = sync
        .add_object(SceneNode::at(Vec3::ZERO), sphere(), BodyParams::default())
        .unwrap();
    let b = sync
        .add_object(
            SceneNode::at(Vec3::new(0.8, 0.0, 0.0)),
            sphere(),
            BodyParams::default(),
        )
        .unwrap();

    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();
    let events = sync.take_touch_events();
    let started: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TouchEvent::Started { body, other, .. } => Some((*body, *other)),
            _ => None,
        })
        .collect();
    assert!(started.contains(&(a, b)));
    assert!(started.contains(&(b, a)));

    // the contact response separates them; the episode ends
    for _ in 0..10 {
        sync.step(DT, None).unwrap();
        sync.pump_until_idle().unwrap();
    }
    let events = sync.take_touch_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, TouchEvent::Ended { .. })));
}

#[test]
fn removing_a_constrained_body_mid_flight_is_harmless() {
    let mut sync = sync();
    sync.set_gravity(Vec3::ZERO).unwrap();
    let a = sync
        .add_object(SceneNode::at(Vec3::ZERO), sphere(), BodyParams::default())
        .unwrap();
    let b = sync
        .add_object(
            SceneNode::at(Vec3::new(2.0, 0.0, 0.0)),
            sphere(),
            BodyParams::default(),
        )
        .unwrap();
    let joint = sync
        .add_constraint(a, Some(b), Vec3::ZERO, Vec3::ZERO, ConstraintKind::Point)
        .unwrap();

    // the removal races the step; the stale feedback record must be skipped
    sync.remove_object(a).unwrap();
    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    assert!(sync.constraint_feedback(joint).is_none());
    assert!(sync.node(a).is_none());
    assert!(sync.node(b).is_some());
}

#[test]
fn constraint_feedback_arrives_for_live_bodies() {
    let mut sync = sync();
    sync.set_gravity(Vec3::ZERO).unwrap();
    let a = sync
        .add_object(SceneNode::at(Vec3::ZERO), sphere(), BodyParams::default())
        .unwrap();
    let b = sync
        .add_object(
            SceneNode::at(Vec3::new(3.0, 0.0, 0.0)),
            sphere(),
            BodyParams::default(),
        )
        .unwrap();
    let joint = sync
        .add_constraint(a, Some(b), Vec3::ZERO, Vec3::ZERO, ConstraintKind::Point)
        .unwrap();

    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    let feedback = sync.constraint_feedback(joint).unwrap();
    assert_eq!(feedback.body, a);
    assert!(feedback.applied_impulse > 0.0);
}

#[test]
fn wheel_nodes_track_the_chassis() {
    let mut sync = sync();
    sync.set_gravity(Vec3::ZERO).unwrap();
    let chassis = sync
        .add_object(
            SceneNode::at(Vec3::new(0.0, 2.0, 0.0)),
            ShapeDesc::Box {
                half_extents: Vec3::new(1.0, 0.5, 2.0),
            },
            BodyParams {
                mass: 0.0,
                ..BodyParams::default()
            },
        )
        .unwrap();
    let vehicle = sync
        .add_vehicle(
            chassis,
            vec![WheelDesc {
                connection_point: Vec3::new(1.0, 0.0, 1.5),
                direction: Vec3::NEG_Y,
                axle: Vec3::X,
                radius: 0.4,
                suspension_rest_length: 0.5,
                is_front: true,
            }],
            VehicleTuning::default(),
        )
        .unwrap();

    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    let wheel = sync.wheel_node(vehicle, 0).unwrap();
    assert_eq!(wheel.position(), Vec3::new(1.0, 1.5, 1.5));
}

#[test]
fn soft_body_mesh_lands_on_its_node() {
    let mut sync = sync();
    let rope = sync
        .add_soft_body(
            SoftKind::Rope,
            vec![0.0, 5.0, 0.0, 0.0, 6.0, 0.0, 0.0, 7.0, 0.0],
            1.0,
            0.0,
        )
        .unwrap();

    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    let node = sync.node(rope).unwrap();
    assert_eq!(node.mesh().len(), 9);
    // fell a little under gravity, local transform stays zeroed
    assert!(node.mesh()[1] < 5.0);
    assert_eq!(node.position(), Vec3::ZERO);
}

#[test]
fn ready_and_object_callbacks_fire() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut sync = sync();
    let ready = Rc::new(Cell::new(false));
    let created = Rc::new(Cell::new(false));

    let r = Rc::clone(&ready);
    sync.on_ready(move || r.set(true));
    let ball = sync
        .add_object(SceneNode::new(), sphere(), BodyParams::default())
        .unwrap();
    let c = Rc::clone(&created);
    sync.on_object_ready(ball, move || c.set(true));

    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    assert!(ready.get());
    assert!(created.get());
    assert!(sync.is_ready());
}

#[test]
fn scene_transform_write_reaches_the_simulation() {
    let mut sync = sync();
    sync.set_gravity(Vec3::ZERO).unwrap();
    let ball = sync
        .add_object(SceneNode::at(Vec3::ZERO), sphere(), BodyParams::default())
        .unwrap();

    sync.node_mut(ball)
        .unwrap()
        .set_position(Vec3::new(0.0, 42.0, 0.0));
    sync.step(DT, None).unwrap();
    sync.pump_until_idle().unwrap();

    // the push was drained before the step, so the report echoes it back
    let y = sync.node(ball).unwrap().position().y;
    assert!((y - 42.0).abs() < 1e-3, "y = {y}");
}
