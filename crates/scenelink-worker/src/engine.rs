//! The engine boundary.
//!
//! [`SimulationWorld`] drives any engine through [`PhysicsEngine`]; the trait
//! is the full set of mutations commands can request plus the read surface
//! report encoding needs. Engines validate handles themselves and answer
//! reads with `Option` so a removal that raced a query degrades to a skipped
//! record instead of an error.
//!
//! [`SimulationWorld`]: crate::world::SimulationWorld

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Quat, Vec3};

use scenelink_core::{ConstraintDesc, Handle, ObjectDesc, ShapeDesc, SoftBodyDesc, VehicleDesc};
use scenelink_protocol::{CommandError, MotorCommand};

/// Snapshot of one rigid body after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// One contact between two bodies.
///
/// The normal points from `body_a` toward `body_b`; consumers looking from
/// `body_b`'s side negate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactManifold {
    pub body_a: Handle,
    pub body_b: Handle,
    pub normal: Vec3,
    pub depth: f32,
}

/// Pose of one wheel in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelState {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Per-step feedback for one constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintState {
    /// The constraint's first body.
    pub body: Handle,
    /// The first anchor in world space.
    pub anchor_world: Vec3,
    pub applied_impulse: f32,
}

/// Everything the simulation world needs from an engine.
///
/// Mutations return `Err(CommandError::StaleHandle)` for handles the engine
/// does not know; the world logs and keeps running. Reads return `None` in
/// the same situation so report encoding can skip the entity.
pub trait PhysicsEngine: Send {
    fn add_body(&mut self, desc: &ObjectDesc) -> Result<(), CommandError>;
    fn add_soft_body(&mut self, desc: &SoftBodyDesc) -> Result<(), CommandError>;
    fn remove_body(&mut self, handle: Handle);

    /// Authoritative transform push from the scene. Either component may be
    /// absent for a partial update. Wakes the body.
    fn set_transform(
        &mut self,
        handle: Handle,
        position: Option<Vec3>,
        rotation: Option<Quat>,
    ) -> Result<(), CommandError>;
    fn set_linear_velocity(&mut self, handle: Handle, velocity: Vec3) -> Result<(), CommandError>;
    fn set_angular_velocity(&mut self, handle: Handle, velocity: Vec3)
        -> Result<(), CommandError>;
    fn apply_central_impulse(&mut self, handle: Handle, impulse: Vec3)
        -> Result<(), CommandError>;
    /// `point` is in body-local space.
    fn apply_impulse(
        &mut self,
        handle: Handle,
        impulse: Vec3,
        point: Vec3,
    ) -> Result<(), CommandError>;
    fn apply_force(&mut self, handle: Handle, force: Vec3, point: Vec3)
        -> Result<(), CommandError>;
    fn set_gravity(&mut self, gravity: Vec3);

    fn add_constraint(&mut self, desc: &ConstraintDesc) -> Result<(), CommandError>;
    fn remove_constraint(&mut self, handle: Handle);
    fn configure_motor(&mut self, handle: Handle, motor: MotorCommand)
        -> Result<(), CommandError>;

    fn add_vehicle(&mut self, desc: &VehicleDesc) -> Result<(), CommandError>;
    fn set_steering(&mut self, vehicle: Handle, wheel: u32, value: f32)
        -> Result<(), CommandError>;
    fn apply_engine_force(
        &mut self,
        vehicle: Handle,
        wheel: u32,
        force: f32,
    ) -> Result<(), CommandError>;
    fn set_brake(&mut self, vehicle: Handle, wheel: u32, force: f32) -> Result<(), CommandError>;

    /// Advance by `time_step`, split into substeps of at most
    /// `fixed_time_step`, capped at `max_sub_steps` substeps.
    fn step(&mut self, time_step: f32, max_sub_steps: u32, fixed_time_step: f32);

    fn body_state(&self, handle: Handle) -> Option<BodyState>;
    /// Contacts found during the most recent step.
    fn contacts(&self) -> &[ContactManifold];
    fn wheel_state(&self, vehicle: Handle, wheel: usize) -> Option<WheelState>;
    fn constraint_state(&self, handle: Handle) -> Option<ConstraintState>;
    /// Current soft-body mesh, already in the report unit layout for its kind.
    fn soft_vertices(&self, handle: Handle) -> Option<&[f32]>;
}

/// Engine-side collision shape cache keyed by [`ShapeDesc::cache_key`].
///
/// Identical primitive shape requests share one instance; mesh-backed shapes
/// have no key and are always built fresh.
pub struct ShapeCache<S> {
    shapes: HashMap<String, Arc<S>>,
}

impl<S> ShapeCache<S> {
    pub fn new() -> Self {
        Self {
            shapes: HashMap::new(),
        }
    }

    /// Fetch the shared instance for `desc`, building it on first use.
    pub fn get_or_build(
        &mut self,
        desc: &ShapeDesc,
        build: impl FnOnce(&ShapeDesc) -> S,
    ) -> Arc<S> {
        match desc.cache_key() {
            Some(key) => {
                if let Some(shape) = self.shapes.get(&key) {
                    return Arc::clone(shape);
                }
                let shape = Arc::new(build(desc));
                self.shapes.insert(key, Arc::clone(&shape));
                shape
            }
            None => Arc::new(build(desc)),
        }
    }

    /// Number of distinct cached shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl<S> Default for ShapeCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_shares_identical_primitives() {
        let mut cache: ShapeCache<String> = ShapeCache::new();
        let desc = ShapeDesc::Sphere { radius: 2.0 };
        let a = cache.get_or_build(&desc, |_| "sphere".to_string());
        let b = cache.get_or_build(&desc, |_| panic!("must reuse the cached shape"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn mesh_shapes_bypass_the_cache() {
        let mut cache: ShapeCache<usize> = ShapeCache::new();
        let desc = ShapeDesc::ConvexHull {
            points: vec![0.0, 0.0, 0.0],
        };
        let a = cache.get_or_build(&desc, |_| 1);
        let b = cache.get_or_build(&desc, |_| 2);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(cache.is_empty());
    }
}
