//! Interface to the rendering engine.
//!
//! The stage never rasterizes anything itself; it only pushes transforms,
//! animation poses, buffer contents and draw ranges through these traits.

use crate::asset::AssetHandle;
use glam::{Mat4, Vec3};
use std::ops::Range;

/// Renderer-side entity handle.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct EntityId(pub u32);

/// Vertex buffer attribute slots of the plane renderable.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum VertexSlot {
    /// `FLOAT4` world positions.
    Position = 0,
    /// `FLOAT2` texture coordinates.
    Uv = 1,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PlaneMaterial {
    /// Tiled plane texture applied to every surface.
    Textured,
    /// Transparent material that only shows received shadows.
    ShadowDecal,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any point will grow.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One primitive range of the plane renderable.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Slice of the index buffer drawn as triangles.
    pub indices: Range<u32>,
    pub material: PlaneMaterial,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub culling: bool,
    pub bounds: Aabb,
}

/// Receives the model's per-tick state.
pub trait SceneSink: Send + 'static {
    fn set_animation_pose(&mut self, asset: &AssetHandle, clip: usize, phase_secs: f32);

    fn update_bone_matrices(&mut self, asset: &AssetHandle);

    /// Adds entities to the scene. Entities already in the scene are left
    /// alone.
    fn attach_entities(&mut self, entities: &[EntityId]);

    fn set_world_transform(&mut self, root: EntityId, transform: Mat4);
}

/// Receives the aggregated plane mesh.
pub trait PlaneSink: Send + 'static {
    /// `data` holds `count` vertices of the slot's layout, written starting at
    /// vertex `offset`.
    fn upload_vertex_buffer(&mut self, slot: VertexSlot, data: &[u8], offset: usize, count: usize);

    fn upload_index_buffer(&mut self, data: &[u16], offset: usize, count: usize);

    fn submit_draw_call(&mut self, call: &DrawCall);
}
