//! Scene nodes and per-object tracking state.
//!
//! A node's transform has two writers: the scene (game logic) and the
//! simulation reports. The scene always wins. Scene writes go through the
//! latching setters, which mark the component dirty; report application goes
//! through the non-latching `apply_*` methods and is skipped for any
//! component currently dirty. The dirty flags are drained into transform
//! push commands at the start of the next step, so a scene write survives
//! exactly the one report that could otherwise clobber it.

use std::collections::HashSet;

use glam::{Quat, Vec3};

use scenelink_core::Handle;

/// One renderable/scene-side object mirrored from the simulation.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    position: Vec3,
    rotation: Quat,
    dirty_position: bool,
    dirty_rotation: bool,
    soft: bool,
    soft_reset: bool,
    /// Soft-body mesh in report unit layout; empty for rigid nodes.
    mesh: Vec<f32>,
}

impl SceneNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// A node that will host soft-body mesh data.
    pub fn soft() -> Self {
        Self {
            soft: true,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Scene write: takes ownership of the position until the next step.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty_position = true;
    }

    /// Scene write: takes ownership of the rotation until the next step.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.dirty_rotation = true;
    }

    pub fn dirty_position(&self) -> bool {
        self.dirty_position
    }

    pub fn dirty_rotation(&self) -> bool {
        self.dirty_rotation
    }

    pub fn is_soft(&self) -> bool {
        self.soft
    }

    pub fn mesh(&self) -> &[f32] {
        &self.mesh
    }

    /// Consume a pending scene position write, clearing the flag.
    pub(crate) fn take_dirty_position(&mut self) -> Option<Vec3> {
        if self.dirty_position {
            self.dirty_position = false;
            Some(self.position)
        } else {
            None
        }
    }

    /// Consume a pending scene rotation write, clearing the flag.
    pub(crate) fn take_dirty_rotation(&mut self) -> Option<Quat> {
        if self.dirty_rotation {
            self.dirty_rotation = false;
            Some(self.rotation)
        } else {
            None
        }
    }

    /// Report write: never latches, and the caller must have checked the
    /// dirty flag first.
    pub(crate) fn apply_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub(crate) fn apply_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Install a soft-body mesh snapshot. On the first application the node's
    /// own transform is zeroed once, since soft vertices arrive in world
    /// space and any local transform would double-apply.
    pub(crate) fn apply_mesh(&mut self, units: &[f32]) {
        if !self.soft_reset {
            self.soft_reset = true;
            self.position = Vec3::ZERO;
            self.rotation = Quat::IDENTITY;
            self.dirty_position = false;
            self.dirty_rotation = false;
        }
        self.mesh.clear();
        self.mesh.extend_from_slice(units);
    }
}

/// A scene node plus the simulation-side state mirrored alongside it.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub handle: Handle,
    pub node: SceneNode,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Handles this object is currently touching.
    pub touches: HashSet<Handle>,
}

impl TrackedObject {
    pub fn new(handle: Handle, node: SceneNode) -> Self {
        Self {
            handle,
            node,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            touches: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_write_latches_until_taken() {
        let mut node = SceneNode::new();
        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(node.dirty_position());
        assert!(!node.dirty_rotation());

        assert_eq!(node.take_dirty_position(), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert!(!node.dirty_position());
        assert_eq!(node.take_dirty_position(), None);
    }

    #[test]
    fn report_write_does_not_latch() {
        let mut node = SceneNode::new();
        node.apply_position(Vec3::new(5.0, 0.0, 0.0));
        assert!(!node.dirty_position());
        assert_eq!(node.position(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn first_mesh_application_zeroes_the_transform_once() {
        let mut node = SceneNode::soft();
        node.set_position(Vec3::new(3.0, 3.0, 3.0));
        node.apply_mesh(&[0.0, 1.0, 0.0]);
        assert_eq!(node.position(), Vec3::ZERO);
        assert!(!node.dirty_position());
        assert_eq!(node.mesh(), &[0.0, 1.0, 0.0]);

        // later scene writes survive subsequent mesh updates
        node.set_position(Vec3::new(7.0, 0.0, 0.0));
        node.apply_mesh(&[0.0, 2.0, 0.0]);
        assert_eq!(node.position(), Vec3::new(7.0, 0.0, 0.0));
        assert_eq!(node.mesh(), &[0.0, 2.0, 0.0]);
    }
}
