//! Soft body descriptions: ropes, cloth, and deformable triangle meshes.
//!
//! Soft-body vertex data is expressed directly in world space by the engine,
//! so the owning scene node carries no meaningful local transform once the
//! body is live; the mesh vertices themselves carry position.

use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// Which soft-body representation the engine should build, and which report
/// layout its per-frame mesh data uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftKind {
    /// Chain of vertices; reports 3 floats (position) per vertex.
    Rope,
    /// Vertex grid; reports 6 floats (position + normal) per vertex.
    Cloth,
    /// Triangle mesh; reports 18 floats (3 x position + normal) per face.
    Trimesh,
}

impl SoftKind {
    /// Floats per reported unit (vertex or face).
    pub fn unit_stride(self) -> usize {
        match self {
            SoftKind::Rope => 3,
            SoftKind::Cloth => 6,
            SoftKind::Trimesh => 18,
        }
    }
}

/// Full payload of an add-soft-body command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftBodyDesc {
    pub handle: Handle,
    pub kind: SoftKind,
    /// Rest-pose geometry as a flat xyz list (vertices for rope/cloth,
    /// triangle corners for trimesh).
    pub vertices: Vec<f32>,
    pub mass: f32,
    /// Internal pressure for closed meshes; ignored for ropes.
    pub pressure: f32,
}
