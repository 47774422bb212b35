//! Scenelink Core - Shared Bridge Vocabulary
//!
//! Types that both sides of the simulation/scene thread boundary must agree
//! on: stable integer handles, and the body/constraint/vehicle/soft-body
//! descriptions carried inside creation commands.
//!
//! Handles are always allocated on the coordinator side and told to the
//! simulation worker as part of the creation payload, so the two sides never
//! have to negotiate identity.

pub mod constraint;
pub mod handle;
pub mod object;
pub mod soft;
pub mod transform;
pub mod vehicle;

pub use constraint::{ConstraintDesc, ConstraintKind};
pub use handle::{Handle, HandleAllocator};
pub use object::{BodyParams, ObjectDesc, ShapeDesc};
pub use soft::{SoftBodyDesc, SoftKind};
pub use transform::Transform;
pub use vehicle::{VehicleDesc, VehicleTuning, WheelDesc};
