//! Constraint descriptions.
//!
//! A constraint links one body to the world or two bodies to each other, with
//! anchor points expressed in each body's local space. The identity is
//! assigned by the coordinator before the engine is told about the
//! constraint, so the coordinator can reference it before the engine
//! acknowledges.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// Type-specific constraint geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Ball-socket joint pinning the two anchors together.
    Point,
    Hinge { axis_a: Vec3, axis_b: Vec3 },
    Slider { axis_a: Vec3, axis_b: Vec3 },
    ConeTwist { axis_a: Vec3, axis_b: Vec3 },
    /// Generic six-degrees-of-freedom joint.
    Dof,
}

/// Full payload of an add-constraint command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDesc {
    pub handle: Handle,
    pub body_a: Handle,
    /// Absent for single-body constraints anchored to the world.
    pub body_b: Option<Handle>,
    /// Anchor in `body_a` local space.
    pub pivot_a: Vec3,
    /// Anchor in `body_b` local space (or world space when `body_b` is absent).
    pub pivot_b: Vec3,
    pub kind: ConstraintKind,
}
