//! Vehicle descriptions.
//!
//! A vehicle is layered on top of an already-registered chassis body. Wheels
//! have no handles of their own; they are addressed by vehicle handle plus
//! zero-based index into the ordered wheel list.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// Suspension and tire tuning shared by all wheels of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleTuning {
    pub suspension_stiffness: f32,
    pub suspension_compression: f32,
    pub suspension_damping: f32,
    pub max_suspension_travel: f32,
    pub friction_slip: f32,
    pub max_suspension_force: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            suspension_stiffness: 5.88,
            suspension_compression: 0.83,
            suspension_damping: 0.88,
            max_suspension_travel: 500.0,
            friction_slip: 10.5,
            max_suspension_force: 6000.0,
        }
    }
}

/// One wheel, in chassis-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelDesc {
    /// Attachment point on the chassis.
    pub connection_point: Vec3,
    /// Suspension direction, usually straight down.
    pub direction: Vec3,
    /// Axle direction.
    pub axle: Vec3,
    pub radius: f32,
    pub suspension_rest_length: f32,
    /// Front wheels respond to steering commands.
    pub is_front: bool,
}

/// Full payload of an add-vehicle command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDesc {
    pub handle: Handle,
    /// Must name an already-registered rigid body.
    pub chassis: Handle,
    pub wheels: Vec<WheelDesc>,
    pub tuning: VehicleTuning,
}
