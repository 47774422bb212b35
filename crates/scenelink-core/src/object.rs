//! Rigid body descriptions: collision shape parameters plus the material and
//! initial state needed to construct an engine-side body.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::transform::Transform;

/// Collision shape parameters.
///
/// Primitive shapes can be shared engine-side through a cache keyed by
/// [`ShapeDesc::cache_key`]; mesh-backed shapes carry their own geometry and
/// are never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeDesc {
    Plane { normal: Vec3, constant: f32 },
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Capsule { radius: f32, height: f32 },
    Cylinder { half_extents: Vec3 },
    Cone { radius: f32, height: f32 },
    /// Convex hull over a flat xyz point list.
    ConvexHull { points: Vec<f32> },
    /// Static triangle soup, 9 floats per face.
    ConcaveMesh { triangles: Vec<f32> },
}

impl ShapeDesc {
    /// Canonical cache key, `"<type>_<param>_<param>..."`, so identical shape
    /// requests share one engine-side collision shape instance.
    ///
    /// Mesh-backed shapes return `None` and are always constructed fresh.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            ShapeDesc::Plane { normal, constant } => Some(format!(
                "plane_{}_{}_{}_{}",
                normal.x, normal.y, normal.z, constant
            )),
            ShapeDesc::Box { half_extents } => Some(format!(
                "box_{}_{}_{}",
                half_extents.x, half_extents.y, half_extents.z
            )),
            ShapeDesc::Sphere { radius } => Some(format!("sphere_{radius}")),
            ShapeDesc::Capsule { radius, height } => {
                Some(format!("capsule_{radius}_{height}"))
            }
            ShapeDesc::Cylinder { half_extents } => Some(format!(
                "cylinder_{}_{}_{}",
                half_extents.x, half_extents.y, half_extents.z
            )),
            ShapeDesc::Cone { radius, height } => Some(format!("cone_{radius}_{height}")),
            ShapeDesc::ConvexHull { .. } | ShapeDesc::ConcaveMesh { .. } => None,
        }
    }

    /// True when a mesh-backed shape carries no geometry. Such descriptions
    /// must fail construction instead of producing a degenerate body.
    pub fn geometry_is_empty(&self) -> bool {
        match self {
            ShapeDesc::ConvexHull { points } => points.is_empty(),
            ShapeDesc::ConcaveMesh { triangles } => triangles.is_empty(),
            _ => false,
        }
    }
}

/// Material and mass parameters for a new body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyParams {
    /// Mass in kilograms; 0 makes the body static.
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// Full payload of an add-object command.
///
/// The handle is assigned by the coordinator before the worker ever hears
/// about the body, so the coordinator can reference it immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDesc {
    pub handle: Handle,
    pub shape: ShapeDesc,
    pub transform: Transform,
    pub params: BodyParams,
}
