//! The frame sync loop.
//!
//! [`FrameSync`] is the scene-side coordinator: it owns the handle
//! allocators, the tracked-object registry, and the simulating gate. One
//! step is in flight at a time; a step requested while the previous one is
//! still simulating is dropped, not queued, so a slow simulation never
//! builds a backlog of stale frames.
//!
//! Per step: pending scene transform writes are drained into push commands,
//! the simulate command is sent, and the resulting reports are folded back
//! into the scene when they arrive. Decoded report buffers are handed back
//! to the worker for reuse.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use scenelink_core::{
    BodyParams, ConstraintDesc, ConstraintKind, Handle, HandleAllocator, ObjectDesc, ShapeDesc,
    SoftBodyDesc, SoftKind, Transform, VehicleDesc, VehicleTuning, WheelDesc,
};
use scenelink_protocol::{
    Command, CommandError, MotorCommand, ReportBuffer, ReportKind, WorkerEvent,
};
use scenelink_worker::Worker;

use crate::ready::ReadyLatch;
use crate::scene::{SceneNode, TrackedObject};
use crate::touch::{TouchEvent, TouchTracker};

/// Latest per-step feedback decoded for one constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintFeedback {
    pub body: Handle,
    pub anchor_world: Vec3,
    pub applied_impulse: f32,
}

/// Scene-side coordinator for one simulation worker.
pub struct FrameSync {
    worker: Worker,
    fixed_time_step: f32,
    simulating: bool,

    objects: HashMap<Handle, TrackedObject>,
    /// Vehicle handle -> one node per wheel, updated from wheel reports.
    wheels: HashMap<Handle, Vec<SceneNode>>,
    constraints: HashMap<Handle, Option<ConstraintFeedback>>,

    body_handles: HandleAllocator,
    constraint_handles: HandleAllocator,
    vehicle_handles: HandleAllocator,

    touch: TouchTracker,
    touch_events: Vec<TouchEvent>,
    contact_scratch: Vec<(Handle, Handle, Vec3)>,

    ready: ReadyLatch,
    object_ready: HashMap<Handle, ReadyLatch>,
    update_listeners: Vec<Box<dyn FnMut()>>,
}

impl FrameSync {
    pub fn new(worker: Worker, fixed_time_step: f32) -> Self {
        Self {
            worker,
            fixed_time_step,
            simulating: false,
            objects: HashMap::new(),
            wheels: HashMap::new(),
            constraints: HashMap::new(),
            body_handles: HandleAllocator::new(),
            constraint_handles: HandleAllocator::new(),
            vehicle_handles: HandleAllocator::new(),
            touch: TouchTracker::new(),
            touch_events: Vec::new(),
            contact_scratch: Vec::new(),
            ready: ReadyLatch::new(),
            object_ready: HashMap::new(),
            update_listeners: Vec::new(),
        }
    }

    /// Register a rigid body. The node's current transform becomes the
    /// body's initial pose; the handle is live immediately on this side.
    pub fn add_object(
        &mut self,
        node: SceneNode,
        shape: ShapeDesc,
        params: BodyParams,
    ) -> Result<Handle, CommandError> {
        let handle = self.body_handles.next();
        let transform = Transform::new(node.position(), node.rotation());
        self.objects.insert(handle, TrackedObject::new(handle, node));
        self.worker.send(Command::AddObject(ObjectDesc {
            handle,
            shape,
            transform,
            params,
        }))?;
        Ok(handle)
    }

    /// Register a soft body. Its node hosts the per-frame mesh snapshot; the
    /// vertices are the rest pose in world space.
    pub fn add_soft_body(
        &mut self,
        kind: SoftKind,
        vertices: Vec<f32>,
        mass: f32,
        pressure: f32,
    ) -> Result<Handle, CommandError> {
        let handle = self.body_handles.next();
        self.objects
            .insert(handle, TrackedObject::new(handle, SceneNode::soft()));
        self.worker.send(Command::AddSoftBody(SoftBodyDesc {
            handle,
            kind,
            vertices,
            mass,
            pressure,
        }))?;
        Ok(handle)
    }

    /// Remove a body. Its handle is never reissued; late reports naming it
    /// are skipped on arrival.
    pub fn remove_object(&mut self, handle: Handle) -> Result<(), CommandError> {
        if self.objects.remove(&handle).is_none() {
            return Err(CommandError::StaleHandle(handle));
        }
        self.object_ready.remove(&handle);
        self.worker.send(Command::RemoveObject { handle })
    }

    pub fn add_constraint(
        &mut self,
        body_a: Handle,
        body_b: Option<Handle>,
        pivot_a: Vec3,
        pivot_b: Vec3,
        kind: ConstraintKind,
    ) -> Result<Handle, CommandError> {
        self.require_object(body_a)?;
        if let Some(b) = body_b {
            self.require_object(b)?;
        }
        let handle = self.constraint_handles.next();
        self.constraints.insert(handle, None);
        self.worker.send(Command::AddConstraint(ConstraintDesc {
            handle,
            body_a,
            body_b,
            pivot_a,
            pivot_b,
            kind,
        }))?;
        Ok(handle)
    }

    pub fn remove_constraint(&mut self, handle: Handle) -> Result<(), CommandError> {
        if self.constraints.remove(&handle).is_none() {
            return Err(CommandError::StaleHandle(handle));
        }
        self.worker.send(Command::RemoveConstraint { handle })
    }

    pub fn constraint_motor(
        &mut self,
        handle: Handle,
        motor: MotorCommand,
    ) -> Result<(), CommandError> {
        if !self.constraints.contains_key(&handle) {
            return Err(CommandError::StaleHandle(handle));
        }
        self.worker.send(Command::ConstraintMotor { handle, motor })
    }

    pub fn add_vehicle(
        &mut self,
        chassis: Handle,
        wheels: Vec<WheelDesc>,
        tuning: VehicleTuning,
    ) -> Result<Handle, CommandError> {
        self.require_object(chassis)?;
        let handle = self.vehicle_handles.next();
        self.wheels
            .insert(handle, vec![SceneNode::new(); wheels.len()]);
        self.worker.send(Command::AddVehicle(VehicleDesc {
            handle,
            chassis,
            wheels,
            tuning,
        }))?;
        Ok(handle)
    }

    pub fn set_steering(
        &mut self,
        vehicle: Handle,
        wheel: u32,
        value: f32,
    ) -> Result<(), CommandError> {
        self.require_wheel(vehicle, wheel)?;
        self.worker.send(Command::SetSteering {
            vehicle,
            wheel,
            value,
        })
    }

    pub fn apply_engine_force(
        &mut self,
        vehicle: Handle,
        wheel: u32,
        force: f32,
    ) -> Result<(), CommandError> {
        self.require_wheel(vehicle, wheel)?;
        self.worker.send(Command::ApplyEngineForce {
            vehicle,
            wheel,
            force,
        })
    }

    pub fn set_brake(
        &mut self,
        vehicle: Handle,
        wheel: u32,
        force: f32,
    ) -> Result<(), CommandError> {
        self.require_wheel(vehicle, wheel)?;
        self.worker.send(Command::SetBrake {
            vehicle,
            wheel,
            force,
        })
    }

    pub fn set_gravity(&mut self, gravity: Vec3) -> Result<(), CommandError> {
        self.worker.send(Command::SetGravity { gravity })
    }

    pub fn set_linear_velocity(
        &mut self,
        handle: Handle,
        velocity: Vec3,
    ) -> Result<(), CommandError> {
        self.require_object(handle)?;
        self.worker
            .send(Command::SetLinearVelocity { handle, velocity })
    }

    pub fn set_angular_velocity(
        &mut self,
        handle: Handle,
        velocity: Vec3,
    ) -> Result<(), CommandError> {
        self.require_object(handle)?;
        self.worker
            .send(Command::SetAngularVelocity { handle, velocity })
    }

    pub fn apply_central_impulse(
        &mut self,
        handle: Handle,
        impulse: Vec3,
    ) -> Result<(), CommandError> {
        self.require_object(handle)?;
        self.worker
            .send(Command::ApplyCentralImpulse { handle, impulse })
    }

    pub fn apply_impulse(
        &mut self,
        handle: Handle,
        impulse: Vec3,
        point: Vec3,
    ) -> Result<(), CommandError> {
        self.require_object(handle)?;
        self.worker.send(Command::ApplyImpulse {
            handle,
            impulse,
            point,
        })
    }

    pub fn apply_force(
        &mut self,
        handle: Handle,
        force: Vec3,
        point: Vec3,
    ) -> Result<(), CommandError> {
        self.require_object(handle)?;
        self.worker.send(Command::ApplyForce {
            handle,
            force,
            point,
        })
    }

    /// Request one simulation step.
    ///
    /// Returns `Ok(false)` without sending anything if the previous step has
    /// not completed yet; the frame is dropped rather than queued. When
    /// `max_sub_steps` is absent it defaults to enough fixed substeps to
    /// cover `time_step`.
    pub fn step(
        &mut self,
        time_step: f32,
        max_sub_steps: Option<u32>,
    ) -> Result<bool, CommandError> {
        if self.simulating {
            tracing::debug!("step requested while simulating, dropping frame");
            return Ok(false);
        }
        self.simulating = true;
        self.drain_dirty()?;
        let max_sub_steps = max_sub_steps
            .unwrap_or_else(|| (time_step / self.fixed_time_step).ceil() as u32)
            .max(1);
        self.worker.send(Command::Simulate {
            time_step,
            max_sub_steps,
        })?;
        Ok(true)
    }

    /// Process every event the worker has already sent, without blocking.
    pub fn pump(&mut self) -> Result<(), CommandError> {
        while let Some(event) = self.worker.try_recv()? {
            self.handle_event(event)?;
        }
        Ok(())
    }

    /// Block until the in-flight step (if any) has completed.
    pub fn pump_until_idle(&mut self) -> Result<(), CommandError> {
        self.pump()?;
        while self.simulating {
            let event = self.worker.recv()?;
            self.handle_event(event)?;
        }
        Ok(())
    }

    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Run `callback` once the worker announces readiness (immediately if it
    /// already has). Fires at most once.
    pub fn on_ready(&mut self, callback: impl FnOnce() + 'static) {
        self.ready.on_ready(callback);
    }

    /// Run `callback` once the worker acknowledges creation of `handle`.
    pub fn on_object_ready(&mut self, handle: Handle, callback: impl FnOnce() + 'static) {
        self.object_ready.entry(handle).or_default().on_ready(callback);
    }

    /// Run `callback` after every completed step.
    pub fn on_update(&mut self, callback: impl FnMut() + 'static) {
        self.update_listeners.push(Box::new(callback));
    }

    pub fn node(&self, handle: Handle) -> Option<&SceneNode> {
        self.objects.get(&handle).map(|o| &o.node)
    }

    pub fn node_mut(&mut self, handle: Handle) -> Option<&mut SceneNode> {
        self.objects.get_mut(&handle).map(|o| &mut o.node)
    }

    pub fn object(&self, handle: Handle) -> Option<&TrackedObject> {
        self.objects.get(&handle)
    }

    pub fn wheel_node(&self, vehicle: Handle, wheel: usize) -> Option<&SceneNode> {
        self.wheels.get(&vehicle)?.get(wheel)
    }

    pub fn constraint_feedback(&self, handle: Handle) -> Option<ConstraintFeedback> {
        self.constraints.get(&handle).copied().flatten()
    }

    /// Touch events accumulated since the last call.
    pub fn take_touch_events(&mut self) -> Vec<TouchEvent> {
        std::mem::take(&mut self.touch_events)
    }

    fn require_object(&self, handle: Handle) -> Result<(), CommandError> {
        if self.objects.contains_key(&handle) {
            Ok(())
        } else {
            Err(CommandError::StaleHandle(handle))
        }
    }

    fn require_wheel(&self, vehicle: Handle, wheel: u32) -> Result<(), CommandError> {
        let wheels = self
            .wheels
            .get(&vehicle)
            .ok_or(CommandError::StaleHandle(vehicle))?;
        if wheel as usize >= wheels.len() {
            return Err(CommandError::WheelOutOfRange { vehicle, wheel });
        }
        Ok(())
    }

    /// Push every pending scene transform write to the worker, clearing the
    /// dirty flags. Runs right before the simulate command on the same FIFO,
    /// so the worker sees the writes before it steps.
    fn drain_dirty(&mut self) -> Result<(), CommandError> {
        for object in self.objects.values_mut() {
            let position = object.node.take_dirty_position();
            let rotation = object.node.take_dirty_rotation();
            if position.is_some() || rotation.is_some() {
                self.worker.send(Command::UpdateTransform {
                    handle: object.handle,
                    position,
                    rotation,
                })?;
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WorkerEvent) -> Result<(), CommandError> {
        match event {
            WorkerEvent::EngineLoaded => {
                tracing::debug!("engine loaded");
            }
            WorkerEvent::Ready => {
                self.ready.signal();
            }
            WorkerEvent::ObjectReady { handle } => {
                self.object_ready.entry(handle).or_default().signal();
            }
            WorkerEvent::Report(buffer) => {
                self.apply_report(&buffer);
                // hand the buffer back so the worker reuses it
                self.worker.send(Command::ReturnBuffer(buffer))?;
            }
            WorkerEvent::StepComplete => {
                self.simulating = false;
                for listener in &mut self.update_listeners {
                    listener();
                }
            }
        }
        Ok(())
    }

    fn apply_report(&mut self, buffer: &ReportBuffer) {
        let Some(kind) = buffer.kind() else {
            tracing::warn!("report with unknown kind tag, dropping");
            return;
        };
        match kind {
            ReportKind::WorldTransform => self.apply_world(buffer),
            ReportKind::Collision => self.apply_collisions(buffer),
            ReportKind::VehicleWheel => self.apply_wheels(buffer),
            ReportKind::ConstraintFeedback => self.apply_constraints(buffer),
            ReportKind::SoftRope | ReportKind::SoftCloth | ReportKind::SoftTrimesh => {
                self.apply_soft(buffer)
            }
        }
    }

    fn apply_world(&mut self, buffer: &ReportBuffer) {
        let records = match buffer.records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "malformed world report");
                return;
            }
        };
        for record in records {
            let handle = Handle::from_f32(record[0]);
            // removal raced the report; skip the record
            let Some(object) = self.objects.get_mut(&handle) else {
                continue;
            };
            // a pending scene write owns its component until drained
            if !object.node.dirty_position() {
                object
                    .node
                    .apply_position(Vec3::new(record[1], record[2], record[3]));
            }
            if !object.node.dirty_rotation() {
                object.node.apply_rotation(Quat::from_xyzw(
                    record[4], record[5], record[6], record[7],
                ));
            }
            object.linear_velocity = Vec3::new(record[8], record[9], record[10]);
            object.angular_velocity = Vec3::new(record[11], record[12], record[13]);
        }
    }

    fn apply_collisions(&mut self, buffer: &ReportBuffer) {
        let records = match buffer.records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "malformed collision report");
                return;
            }
        };
        self.contact_scratch.clear();
        for record in records {
            self.contact_scratch.push((
                Handle::from_f32(record[0]),
                Handle::from_f32(record[1]),
                Vec3::new(record[2], record[3], record[4]),
            ));
        }
        self.touch.process(
            &self.contact_scratch,
            &mut self.objects,
            &mut self.touch_events,
        );
    }

    fn apply_wheels(&mut self, buffer: &ReportBuffer) {
        let records = match buffer.records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "malformed wheel report");
                return;
            }
        };
        for record in records {
            let vehicle = Handle::from_f32(record[0]);
            let wheel = record[1] as usize;
            let Some(nodes) = self.wheels.get_mut(&vehicle) else {
                continue;
            };
            let Some(node) = nodes.get_mut(wheel) else {
                continue;
            };
            node.apply_position(Vec3::new(record[2], record[3], record[4]));
            node.apply_rotation(Quat::from_xyzw(
                record[5], record[6], record[7], record[8],
            ));
        }
    }

    fn apply_constraints(&mut self, buffer: &ReportBuffer) {
        let records = match buffer.records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "malformed constraint report");
                return;
            }
        };
        for record in records {
            let handle = Handle::from_f32(record[0]);
            let body = Handle::from_f32(record[1]);
            // skip feedback for constraints or bodies removed in the meantime
            if !self.objects.contains_key(&body) {
                continue;
            }
            let Some(slot) = self.constraints.get_mut(&handle) else {
                continue;
            };
            *slot = Some(ConstraintFeedback {
                body,
                anchor_world: Vec3::new(record[2], record[3], record[4]),
                applied_impulse: record[5],
            });
        }
    }

    fn apply_soft(&mut self, buffer: &ReportBuffer) {
        let records = match buffer.soft_records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "malformed soft-body report");
                return;
            }
        };
        for record in records {
            let Some(object) = self.objects.get_mut(&record.handle) else {
                continue;
            };
            object.node.apply_mesh(record.units);
        }
    }
}
