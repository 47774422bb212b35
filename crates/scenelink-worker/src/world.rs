//! Command dispatch and per-step report generation.
//!
//! [`SimulationWorld`] owns an engine plus the bookkeeping the engine does
//! not carry: which handles are live per category, and the pool of report
//! buffers handed back by the coordinator. Commands are dispatched through
//! one exhaustive match; an unhandled variant is a compile error.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use scenelink_core::{Handle, SoftKind};
use scenelink_protocol::{Command, CommandError, ReportBuffer, ReportKind, WorkerEvent};

use crate::engine::PhysicsEngine;

fn soft_report_kind(kind: SoftKind) -> ReportKind {
    match kind {
        SoftKind::Rope => ReportKind::SoftRope,
        SoftKind::Cloth => ReportKind::SoftCloth,
        SoftKind::Trimesh => ReportKind::SoftTrimesh,
    }
}

/// One simulation world: an engine, the live-entity registries, and the
/// report buffer pool.
pub struct SimulationWorld<E: PhysicsEngine> {
    engine: E,
    fixed_time_step: f32,
    rigid: BTreeSet<Handle>,
    soft: BTreeMap<Handle, SoftKind>,
    constraints: BTreeSet<Handle>,
    /// Vehicle handle -> wheel count.
    vehicles: BTreeMap<Handle, usize>,
    /// Buffers returned by the coordinator, reused on the next encode of the
    /// same kind so steady-state stepping allocates nothing.
    pool: HashMap<ReportKind, ReportBuffer>,
}

impl<E: PhysicsEngine> SimulationWorld<E> {
    pub fn new(engine: E, fixed_time_step: f32) -> Self {
        Self {
            engine,
            fixed_time_step,
            rigid: BTreeSet::new(),
            soft: BTreeMap::new(),
            constraints: BTreeSet::new(),
            vehicles: BTreeMap::new(),
            pool: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Apply one command, pushing any resulting events onto `events`.
    ///
    /// Failures leave the world consistent; the caller decides whether to log
    /// or surface them, and stepping continues either way.
    pub fn apply(
        &mut self,
        command: Command,
        events: &mut Vec<WorkerEvent>,
    ) -> Result<(), CommandError> {
        match command {
            Command::AddObject(desc) => {
                self.engine.add_body(&desc)?;
                self.rigid.insert(desc.handle);
                events.push(WorkerEvent::ObjectReady {
                    handle: desc.handle,
                });
                Ok(())
            }
            Command::AddSoftBody(desc) => {
                self.engine.add_soft_body(&desc)?;
                self.soft.insert(desc.handle, desc.kind);
                events.push(WorkerEvent::ObjectReady {
                    handle: desc.handle,
                });
                Ok(())
            }
            Command::RemoveObject { handle } => {
                let known = self.rigid.remove(&handle) || self.soft.remove(&handle).is_some();
                self.engine.remove_body(handle);
                if known {
                    Ok(())
                } else {
                    Err(CommandError::StaleHandle(handle))
                }
            }
            Command::UpdateTransform {
                handle,
                position,
                rotation,
            } => self.engine.set_transform(handle, position, rotation),
            Command::SetLinearVelocity { handle, velocity } => {
                self.engine.set_linear_velocity(handle, velocity)
            }
            Command::SetAngularVelocity { handle, velocity } => {
                self.engine.set_angular_velocity(handle, velocity)
            }
            Command::ApplyCentralImpulse { handle, impulse } => {
                self.engine.apply_central_impulse(handle, impulse)
            }
            Command::ApplyImpulse {
                handle,
                impulse,
                point,
            } => self.engine.apply_impulse(handle, impulse, point),
            Command::ApplyForce {
                handle,
                force,
                point,
            } => self.engine.apply_force(handle, force, point),
            Command::SetGravity { gravity } => {
                self.engine.set_gravity(gravity);
                Ok(())
            }
            Command::AddConstraint(desc) => {
                self.engine.add_constraint(&desc)?;
                self.constraints.insert(desc.handle);
                Ok(())
            }
            Command::RemoveConstraint { handle } => {
                self.engine.remove_constraint(handle);
                if self.constraints.remove(&handle) {
                    Ok(())
                } else {
                    Err(CommandError::StaleHandle(handle))
                }
            }
            Command::ConstraintMotor { handle, motor } => {
                self.engine.configure_motor(handle, motor)
            }
            Command::AddVehicle(desc) => {
                self.engine.add_vehicle(&desc)?;
                self.vehicles.insert(desc.handle, desc.wheels.len());
                Ok(())
            }
            Command::SetSteering {
                vehicle,
                wheel,
                value,
            } => self.engine.set_steering(vehicle, wheel, value),
            Command::ApplyEngineForce {
                vehicle,
                wheel,
                force,
            } => self.engine.apply_engine_force(vehicle, wheel, force),
            Command::SetBrake {
                vehicle,
                wheel,
                force,
            } => self.engine.set_brake(vehicle, wheel, force),
            Command::Simulate {
                time_step,
                max_sub_steps,
            } => {
                self.step(time_step, max_sub_steps, events);
                Ok(())
            }
            Command::ReturnBuffer(buffer) => {
                if let Some(kind) = buffer.kind() {
                    self.pool.insert(kind, buffer);
                } else {
                    tracing::warn!("discarding returned buffer with unknown kind tag");
                }
                Ok(())
            }
        }
    }

    /// Step the engine once and emit one report per kind with at least one
    /// live entity, then `StepComplete`.
    fn step(&mut self, time_step: f32, max_sub_steps: u32, events: &mut Vec<WorkerEvent>) {
        self.engine
            .step(time_step, max_sub_steps, self.fixed_time_step);

        if !self.rigid.is_empty() {
            let buf = self.encode_world();
            events.push(WorkerEvent::Report(buf));
        }
        for kind in [SoftKind::Rope, SoftKind::Cloth, SoftKind::Trimesh] {
            if self.soft.values().any(|k| *k == kind) {
                let buf = self.encode_soft(kind);
                events.push(WorkerEvent::Report(buf));
            }
        }
        if !self.rigid.is_empty() {
            let buf = self.encode_collisions();
            events.push(WorkerEvent::Report(buf));
        }
        if !self.vehicles.is_empty() {
            let buf = self.encode_wheels();
            events.push(WorkerEvent::Report(buf));
        }
        if !self.constraints.is_empty() {
            let buf = self.encode_constraints();
            events.push(WorkerEvent::Report(buf));
        }
        events.push(WorkerEvent::StepComplete);
    }

    fn take_buffer(&mut self, kind: ReportKind) -> ReportBuffer {
        self.pool
            .remove(&kind)
            .unwrap_or_else(|| ReportBuffer::new(kind))
    }

    fn encode_world(&mut self) -> ReportBuffer {
        let mut buf = self.take_buffer(ReportKind::WorldTransform);
        buf.begin_fixed(self.rigid.len());
        let mut index = 0;
        for &handle in self.rigid.iter().rev() {
            let Some(state) = self.engine.body_state(handle) else {
                continue;
            };
            let (p, r) = (state.position, state.rotation);
            let (lv, av) = (state.linear_velocity, state.angular_velocity);
            buf.write_record(
                index,
                &[
                    handle.to_f32(),
                    p.x,
                    p.y,
                    p.z,
                    r.x,
                    r.y,
                    r.z,
                    r.w,
                    lv.x,
                    lv.y,
                    lv.z,
                    av.x,
                    av.y,
                    av.z,
                ],
            );
            index += 1;
        }
        buf.set_count(index);
        buf
    }

    fn encode_soft(&mut self, kind: SoftKind) -> ReportBuffer {
        let mut buf = self.take_buffer(soft_report_kind(kind));
        let mut writer = buf.soft_writer();
        for (&handle, _) in self.soft.iter().rev().filter(|(_, k)| **k == kind) {
            if let Some(units) = self.engine.soft_vertices(handle) {
                writer.push(handle, units);
            }
        }
        writer.finish();
        buf
    }

    fn encode_collisions(&mut self) -> ReportBuffer {
        let mut buf = self.take_buffer(ReportKind::Collision);
        let contacts = self.engine.contacts();
        buf.begin_fixed(contacts.len());
        for (index, contact) in contacts.iter().enumerate() {
            buf.write_record(
                index,
                &[
                    contact.body_a.to_f32(),
                    contact.body_b.to_f32(),
                    contact.normal.x,
                    contact.normal.y,
                    contact.normal.z,
                ],
            );
        }
        buf
    }

    fn encode_wheels(&mut self) -> ReportBuffer {
        let mut buf = self.take_buffer(ReportKind::VehicleWheel);
        let total: usize = self.vehicles.values().sum();
        buf.begin_fixed(total);
        let mut index = 0;
        for (&vehicle, &wheels) in self.vehicles.iter().rev() {
            for wheel in 0..wheels {
                let Some(state) = self.engine.wheel_state(vehicle, wheel) else {
                    continue;
                };
                let (p, r) = (state.position, state.rotation);
                buf.write_record(
                    index,
                    &[
                        vehicle.to_f32(),
                        wheel as f32,
                        p.x,
                        p.y,
                        p.z,
                        r.x,
                        r.y,
                        r.z,
                        r.w,
                    ],
                );
                index += 1;
            }
        }
        buf.set_count(index);
        buf
    }

    fn encode_constraints(&mut self) -> ReportBuffer {
        let mut buf = self.take_buffer(ReportKind::ConstraintFeedback);
        buf.begin_fixed(self.constraints.len());
        let mut index = 0;
        for &handle in self.constraints.iter().rev() {
            let Some(state) = self.engine.constraint_state(handle) else {
                continue;
            };
            let a = state.anchor_world;
            buf.write_record(
                index,
                &[
                    handle.to_f32(),
                    state.body.to_f32(),
                    a.x,
                    a.y,
                    a.z,
                    state.applied_impulse,
                ],
            );
            index += 1;
        }
        buf.set_count(index);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::BasicEngine;
    use glam::Vec3;
    use scenelink_core::{BodyParams, ObjectDesc, ShapeDesc, Transform};

    const DT: f32 = 1.0 / 60.0;

    fn world() -> SimulationWorld<BasicEngine> {
        SimulationWorld::new(BasicEngine::new(), DT)
    }

    fn add_sphere(w: &mut SimulationWorld<BasicEngine>, handle: u32, x: f32) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        w.apply(
            Command::AddObject(ObjectDesc {
                handle: Handle(handle),
                shape: ShapeDesc::Sphere { radius: 0.5 },
                transform: Transform::from_position(Vec3::new(x, 0.0, 0.0)),
                params: BodyParams::default(),
            }),
            &mut events,
        )
        .unwrap();
        events
    }

    #[test]
    fn add_object_acknowledges_with_the_handle() {
        let mut w = world();
        let events = add_sphere(&mut w, 7, 0.0);
        assert_eq!(events, vec![WorkerEvent::ObjectReady { handle: Handle(7) }]);
    }

    #[test]
    fn simulate_emits_reports_then_step_complete() {
        let mut w = world();
        add_sphere(&mut w, 1, 0.0);

        let mut events = Vec::new();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();

        // world transforms, collisions, then the completion marker
        assert_eq!(events.len(), 3);
        let WorkerEvent::Report(world_buf) = &events[0] else {
            panic!("expected a report first");
        };
        assert_eq!(world_buf.kind(), Some(ReportKind::WorldTransform));
        assert_eq!(world_buf.count(), 1);
        let WorkerEvent::Report(collision_buf) = &events[1] else {
            panic!("expected a collision report second");
        };
        assert_eq!(collision_buf.kind(), Some(ReportKind::Collision));
        assert_eq!(collision_buf.count(), 0);
        assert_eq!(events[2], WorkerEvent::StepComplete);
    }

    #[test]
    fn empty_world_step_emits_only_step_complete() {
        let mut w = world();
        let mut events = Vec::new();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();
        assert_eq!(events, vec![WorkerEvent::StepComplete]);
    }

    #[test]
    fn world_records_come_out_in_reverse_handle_order() {
        let mut w = world();
        add_sphere(&mut w, 1, 0.0);
        add_sphere(&mut w, 2, 10.0);
        add_sphere(&mut w, 3, 20.0);

        let mut events = Vec::new();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();
        let WorkerEvent::Report(buf) = &events[0] else {
            panic!("expected a report");
        };
        let handles: Vec<u32> = buf
            .records()
            .unwrap()
            .map(|r| Handle::from_f32(r[0]).0)
            .collect();
        assert_eq!(handles, vec![3, 2, 1]);
    }

    #[test]
    fn returned_buffer_is_reused_on_the_next_step() {
        let mut w = world();
        add_sphere(&mut w, 1, 0.0);

        let mut events = Vec::new();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();
        let WorkerEvent::Report(buf) = events.remove(0) else {
            panic!("expected a report");
        };
        let ptr = buf.as_slice().as_ptr();

        w.apply(Command::ReturnBuffer(buf), &mut events).unwrap();
        events.clear();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();
        let WorkerEvent::Report(buf) = &events[0] else {
            panic!("expected a report");
        };
        assert_eq!(buf.as_slice().as_ptr(), ptr);
    }

    #[test]
    fn remove_unknown_handle_is_stale() {
        let mut w = world();
        let mut events = Vec::new();
        assert_eq!(
            w.apply(Command::RemoveObject { handle: Handle(42) }, &mut events),
            Err(CommandError::StaleHandle(Handle(42)))
        );
    }

    #[test]
    fn removed_body_stops_appearing_in_reports() {
        let mut w = world();
        add_sphere(&mut w, 1, 0.0);
        add_sphere(&mut w, 2, 10.0);
        let mut events = Vec::new();
        w.apply(Command::RemoveObject { handle: Handle(1) }, &mut events)
            .unwrap();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();
        let WorkerEvent::Report(buf) = &events[0] else {
            panic!("expected a report");
        };
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn soft_body_gets_its_own_report_kind() {
        let mut w = world();
        let mut events = Vec::new();
        w.apply(
            Command::AddSoftBody(scenelink_core::SoftBodyDesc {
                handle: Handle(1),
                kind: SoftKind::Rope,
                vertices: vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                mass: 1.0,
                pressure: 0.0,
            }),
            &mut events,
        )
        .unwrap();
        events.clear();
        w.apply(
            Command::Simulate {
                time_step: DT,
                max_sub_steps: 1,
            },
            &mut events,
        )
        .unwrap();
        let WorkerEvent::Report(buf) = &events[0] else {
            panic!("expected a report");
        };
        assert_eq!(buf.kind(), Some(ReportKind::SoftRope));
        let records: Vec<_> = buf.soft_records().unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].units.len(), 6);
    }
}
