//! Command and acknowledgement envelopes.
//!
//! Commands are a closed enum dispatched with an exhaustive match on the
//! worker side, so an unhandled operation is a compile error rather than a
//! runtime "unknown command" fallback. Acknowledgements flow the opposite
//! direction and are distinct from reports: they are control messages, not
//! per-step data.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scenelink_core::{ConstraintDesc, Handle, ObjectDesc, SoftBodyDesc, VehicleDesc};

use crate::report::ReportBuffer;

/// Coordinator -> worker requests, processed strictly in send order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    AddObject(ObjectDesc),
    AddSoftBody(SoftBodyDesc),
    RemoveObject {
        handle: Handle,
    },
    /// Authoritative transform push; either field may be absent for a
    /// partial update. Wakes the target body.
    UpdateTransform {
        handle: Handle,
        position: Option<Vec3>,
        rotation: Option<Quat>,
    },
    SetLinearVelocity {
        handle: Handle,
        velocity: Vec3,
    },
    SetAngularVelocity {
        handle: Handle,
        velocity: Vec3,
    },
    ApplyCentralImpulse {
        handle: Handle,
        impulse: Vec3,
    },
    ApplyImpulse {
        handle: Handle,
        impulse: Vec3,
        /// Application point in body-local space.
        point: Vec3,
    },
    ApplyForce {
        handle: Handle,
        force: Vec3,
        point: Vec3,
    },
    SetGravity {
        gravity: Vec3,
    },
    AddConstraint(ConstraintDesc),
    RemoveConstraint {
        handle: Handle,
    },
    /// Motor/limit reconfiguration on a live constraint; wakes the
    /// connected bodies.
    ConstraintMotor {
        handle: Handle,
        motor: MotorCommand,
    },
    AddVehicle(VehicleDesc),
    SetSteering {
        vehicle: Handle,
        wheel: u32,
        value: f32,
    },
    ApplyEngineForce {
        vehicle: Handle,
        wheel: u32,
        force: f32,
    },
    SetBrake {
        vehicle: Handle,
        wheel: u32,
        force: f32,
    },
    /// The single step entrypoint. The worker drains any queued transform
    /// pushes first (they arrive as earlier commands on the same FIFO), steps
    /// once, then emits one report per kind with at least one live entity.
    Simulate {
        time_step: f32,
        max_sub_steps: u32,
    },
    /// Transferable hand-back: returns a decoded report buffer to the worker
    /// so the next encode of that kind reuses it instead of allocating.
    ReturnBuffer(ReportBuffer),
}

/// Constraint motor and limit parameter payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotorCommand {
    HingeSetLimits {
        low: f32,
        high: f32,
        bias_factor: f32,
        relaxation_factor: f32,
    },
    HingeEnableMotor {
        target_velocity: f32,
        max_impulse: f32,
    },
    SliderSetLimits {
        lin_lower: f32,
        lin_upper: f32,
        ang_lower: f32,
        ang_upper: f32,
    },
    SliderEnableLinearMotor {
        target_velocity: f32,
        max_force: f32,
    },
    ConeTwistSetLimit {
        swing_span1: f32,
        swing_span2: f32,
        twist_span: f32,
    },
    DofConfigureAngularMotor {
        axis: u8,
        low_limit: f32,
        high_limit: f32,
        target_velocity: f32,
        max_force: f32,
    },
    DofEnableAngularMotor {
        axis: u8,
        enabled: bool,
    },
}

/// Worker -> coordinator messages: out-of-band acknowledgements plus the
/// per-step report buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerEvent {
    /// The worker thread is up and processing commands.
    Ready,
    /// The physics engine finished loading.
    EngineLoaded,
    /// A body requested via `AddObject`/`AddSoftBody` is live under this
    /// handle; anything deferred on creation may proceed.
    ObjectReady { handle: Handle },
    Report(ReportBuffer),
    /// All reports for the current step have been sent.
    StepComplete,
}

/// Failures surfaced by the command layer.
///
/// The simulation keeps running after any of these; the worker logs the
/// error and moves to the next command. Report *decoding* never produces a
/// stale-handle error at all — those records are skipped by design.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("no live entity for handle {0}")]
    StaleHandle(Handle),
    #[error("shape for handle {0} has no geometry")]
    EmptyGeometry(Handle),
    #[error("wheel {wheel} out of range for vehicle {vehicle}")]
    WheelOutOfRange { vehicle: Handle, wheel: u32 },
    #[error("simulation worker is no longer running")]
    Disconnected,
}
