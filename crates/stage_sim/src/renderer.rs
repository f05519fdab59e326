//! Headless render backends: they record what a GPU renderer would receive and
//! report it through tracing and the metrics registry.

use crate::metrics::SimMetrics;
use ar_stage::{AssetHandle, DrawCall, EntityId, PlaneMaterial, PlaneSink, SceneSink, VertexSlot};
use glam::{Mat4, Vec3};
use std::collections::HashSet;
use std::sync::Arc;

pub struct LoggingScene {
    metrics: Arc<SimMetrics>,
    attached: HashSet<EntityId>,
    last_transform: Option<Mat4>,
}

impl LoggingScene {
    pub fn new(metrics: Arc<SimMetrics>) -> Self {
        Self {
            metrics,
            attached: HashSet::new(),
            last_transform: None,
        }
    }

    #[cfg(test)]
    pub fn attached(&self) -> usize {
        self.attached.len()
    }

    #[cfg(test)]
    pub fn last_transform(&self) -> Option<Mat4> {
        self.last_transform
    }
}

impl SceneSink for LoggingScene {
    fn set_animation_pose(&mut self, _asset: &AssetHandle, clip: usize, phase_secs: f32) {
        tracing::trace!(clip, phase_secs, "Animation pose applied");
    }

    fn update_bone_matrices(&mut self, asset: &AssetHandle) {
        tracing::trace!(entities = asset.entities.len(), "Bone matrices updated");
    }

    fn attach_entities(&mut self, entities: &[EntityId]) {
        let added = entities.iter().filter(|&&e| self.attached.insert(e)).count();
        if added > 0 {
            tracing::info!(added, total = self.attached.len(), "Model entities attached to scene");
        }
    }

    fn set_world_transform(&mut self, root: EntityId, transform: Mat4) {
        self.metrics.world_transforms_total.inc();
        if self.last_transform != Some(transform) {
            let (scale, _, translation) = transform.to_scale_rotation_translation();
            tracing::debug!(
                root = root.0,
                translation = ?translation,
                scale = scale.x,
                "Model transform changed"
            );
        }
        self.last_transform = Some(transform);
    }
}

/// Buffer sizes and draw ranges as last seen by the plane pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanePassLog {
    pub position_bytes: usize,
    pub uv_bytes: usize,
    pub vertex_count: usize,
    pub index_count: usize,
    pub draws: Vec<DrawCall>,
    /// Renderable bounds as the engine takes them.
    pub bounds_center: Vec3,
    pub bounds_half_extents: Vec3,
}

pub struct LoggingPlanes {
    metrics: Arc<SimMetrics>,
    pending: PlanePassLog,
    last: Option<PlanePassLog>,
}

impl LoggingPlanes {
    pub fn new(metrics: Arc<SimMetrics>) -> Self {
        Self {
            metrics,
            pending: PlanePassLog::default(),
            last: None,
        }
    }

    #[cfg(test)]
    pub fn last_pass(&self) -> Option<&PlanePassLog> {
        self.last.as_ref()
    }

    fn finish_pass(&mut self) {
        let pass = std::mem::take(&mut self.pending);
        self.metrics.plane_passes_total.inc();
        self.metrics.plane_vertices.set(pass.vertex_count as i64);
        self.metrics.plane_indices.set(pass.index_count as i64);
        if pass.index_count == 0 {
            self.metrics.plane_passes_blank_total.inc();
        }
        let resized = self
            .last
            .as_ref()
            .map_or(true, |last| last.vertex_count != pass.vertex_count);
        if resized {
            tracing::debug!(
                vertices = pass.vertex_count,
                indices = pass.index_count,
                position_bytes = pass.position_bytes,
                uv_bytes = pass.uv_bytes,
                center = ?pass.bounds_center,
                half_extents = ?pass.bounds_half_extents,
                "Plane mesh resized"
            );
        }
        self.last = Some(pass);
    }
}

impl PlaneSink for LoggingPlanes {
    fn upload_vertex_buffer(
        &mut self,
        slot: VertexSlot,
        bytes: &[u8],
        _offset: usize,
        count: usize,
    ) {
        match slot {
            VertexSlot::Position => {
                self.pending.position_bytes = bytes.len();
                self.pending.vertex_count = count;
            }
            VertexSlot::Uv => self.pending.uv_bytes = bytes.len(),
        }
    }

    fn upload_index_buffer(&mut self, indices: &[u16], _offset: usize, count: usize) {
        debug_assert!(count <= indices.len());
        self.pending.index_count = count;
    }

    fn submit_draw_call(&mut self, call: &DrawCall) {
        if call.material == PlaneMaterial::Textured {
            self.pending.bounds_center = call.bounds.center();
            self.pending.bounds_half_extents = call.bounds.half_extents();
        }
        self.pending.draws.push(call.clone());
        // The shadow decal is always the last range of a pass.
        if call.material == PlaneMaterial::ShadowDecal {
            self.finish_pass();
        }
    }
}
