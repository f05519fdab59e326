//! Aggregates every tracked plane into one renderable per tick.
//!
//! All planes share a single vertex/index buffer pair of fixed capacity. The
//! upward-facing planes are packed first so the shadow-decal pass can draw a
//! prefix of the same index buffer. When the planes do not fit, the pass
//! stops at the last plane that does and uploads what it has.

use crate::geometry::{
    fan_index_count, fan_indices, polygon_to_world, polygon_uvs, world_uvs, PlaneUv, PlaneVertex,
};
use crate::mailbox::Mailbox;
use crate::render::{Aabb, DrawCall, PlaneMaterial, PlaneSink, VertexSlot};
use crate::tracking::{SurfaceKind, SurfaceTrackable, TrackingTick};
use glam::Vec3;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub const PLANE_VERTEX_CAPACITY: usize = 1000;
pub const PLANE_INDEX_CAPACITY: usize = (PLANE_VERTEX_CAPACITY - 2) * 3;

/// Summary of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFrame {
    /// Planes whose geometry made it into the buffers.
    pub surfaces_written: usize,
    /// Planes left out because the buffers were full.
    pub surfaces_dropped: usize,
    /// Planes with fewer than three boundary points.
    pub surfaces_skipped: usize,
    pub vertex_count: usize,
    pub index_count: usize,
    /// End of the upward-facing index range.
    pub split_index: usize,
    pub bounds: Aabb,
}

impl PlaneFrame {
    pub fn truncated(&self) -> bool {
        self.surfaces_dropped > 0
    }

    /// The textured pass over every plane, then the shadow pass over the
    /// upward-facing prefix.
    pub fn draw_calls(&self) -> [DrawCall; 2] {
        let textured = DrawCall {
            indices: 0..self.index_count as u32,
            material: PlaneMaterial::Textured,
            cast_shadows: false,
            receive_shadows: true,
            culling: true,
            bounds: self.bounds,
        };
        let shadow = DrawCall {
            indices: 0..self.split_index as u32,
            material: PlaneMaterial::ShadowDecal,
            ..textured.clone()
        };
        [textured, shadow]
    }
}

/// Resolves merges, drops duplicates and lost planes, and moves the
/// upward-facing planes to the front.
///
/// Order is otherwise preserved: first sighting wins for duplicates and the
/// sort is stable.
pub fn collect_active(updated: Vec<Arc<SurfaceTrackable>>) -> Vec<Arc<SurfaceTrackable>> {
    let mut seen = HashSet::with_capacity(updated.len());
    let mut active: Vec<_> = updated
        .iter()
        .map(|surface| surface.merge_root())
        .filter(|root| seen.insert(root.id))
        .filter(|root| root.tracking_active)
        .collect();
    active.sort_by_key(|surface| surface.kind != SurfaceKind::HorizontalUp);
    active
}

/// Pass outcomes, readable from outside the aggregator task.
#[derive(Debug, Default)]
pub struct PlanePassCounters {
    /// Ticks with no active planes; the previous mesh stayed up.
    pub skipped: AtomicU64,
    /// Passes that ran out of buffer space.
    pub truncated: AtomicU64,
}

pub struct PlaneMeshAggregator {
    positions: Vec<PlaneVertex>,
    uvs: Vec<PlaneUv>,
    indices: Vec<u16>,
    world: Vec<Vec3>,
    last_frame: Option<PlaneFrame>,
    counters: Arc<PlanePassCounters>,
}

impl PlaneMeshAggregator {
    pub fn new() -> Self {
        Self {
            positions: Vec::with_capacity(PLANE_VERTEX_CAPACITY),
            uvs: Vec::with_capacity(PLANE_VERTEX_CAPACITY),
            indices: Vec::with_capacity(PLANE_INDEX_CAPACITY),
            world: Vec::new(),
            last_frame: None,
            counters: Arc::default(),
        }
    }

    pub fn counters(&self) -> Arc<PlanePassCounters> {
        self.counters.clone()
    }

    pub fn positions(&self) -> &[PlaneVertex] {
        &self.positions
    }

    pub fn uvs(&self) -> &[PlaneUv] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Summary of the last pass that rewrote the buffers.
    pub fn last_frame(&self) -> Option<&PlaneFrame> {
        self.last_frame.as_ref()
    }

    /// Rebuilds the mesh for `tick` and hands it to `sink`.
    ///
    /// Returns `None` when the tick has no active planes; buffers and the
    /// renderer's current mesh are then left as they were.
    pub fn process<P: PlaneSink>(
        &mut self,
        tick: &TrackingTick,
        sink: &mut P,
    ) -> Option<PlaneFrame> {
        let Some(frame) = self.rebuild(tick.snapshot.updated_surfaces()) else {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        if frame.truncated() {
            self.counters.truncated.fetch_add(1, Ordering::Relaxed);
        }
        self.upload(&frame, sink);
        tracing::debug!(
            timestamp_nanos = tick.timestamp_nanos,
            surfaces = frame.surfaces_written,
            vertices = frame.vertex_count,
            indices = frame.index_count,
            split_index = frame.split_index,
            "Plane mesh rebuilt"
        );
        Some(frame)
    }

    /// Fills the scratch buffers from `updated` without touching the renderer.
    pub fn rebuild(&mut self, updated: Vec<Arc<SurfaceTrackable>>) -> Option<PlaneFrame> {
        let active = collect_active(updated);
        if active.is_empty() {
            return None;
        }

        self.positions.clear();
        self.uvs.clear();
        self.indices.clear();

        let mut bounds = Aabb::EMPTY;
        let mut split_index = None;
        let mut written = 0;
        let mut skipped = 0;
        let mut dropped = 0;

        for (i, surface) in active.iter().enumerate() {
            if split_index.is_none() && surface.kind != SurfaceKind::HorizontalUp {
                split_index = Some(self.indices.len());
            }

            let vertex_count = surface.boundary.len();
            if vertex_count < 3 {
                tracing::warn!(
                    surface = surface.id.0,
                    points = vertex_count,
                    "Skipping degenerate plane boundary"
                );
                skipped += 1;
                continue;
            }

            let index_count = fan_index_count(vertex_count);
            if self.positions.len() + vertex_count > PLANE_VERTEX_CAPACITY
                || self.indices.len() + index_count > PLANE_INDEX_CAPACITY
            {
                dropped = active.len() - i;
                tracing::warn!(
                    written,
                    dropped,
                    vertices = self.positions.len(),
                    "Plane buffers full, truncating mesh"
                );
                break;
            }

            let base = self.positions.len() as u16;
            let pose = surface.center_pose.matrix();

            self.world.clear();
            self.world.extend(polygon_to_world(&surface.boundary, &pose));
            for &p in &self.world {
                bounds.grow(p);
            }

            self.positions
                .extend(self.world.iter().map(|&p| PlaneVertex::from_world(p)));
            match surface.kind {
                SurfaceKind::Vertical => self.uvs.extend(polygon_uvs(&surface.boundary)),
                SurfaceKind::HorizontalUp | SurfaceKind::HorizontalDown => {
                    self.uvs.extend(world_uvs(&self.world))
                }
            }
            self.indices.extend(fan_indices(vertex_count, base));

            tracing::trace!(
                surface = surface.id.0,
                kind = ?surface.kind,
                vertex_count,
                "Plane packed"
            );
            written += 1;
        }

        if bounds.is_empty() {
            bounds = Aabb {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            };
        }

        let frame = PlaneFrame {
            surfaces_written: written,
            surfaces_dropped: dropped,
            surfaces_skipped: skipped,
            vertex_count: self.positions.len(),
            index_count: self.indices.len(),
            split_index: split_index.unwrap_or(self.indices.len()),
            bounds,
        };
        self.last_frame = Some(frame.clone());
        Some(frame)
    }

    fn upload<P: PlaneSink>(&self, frame: &PlaneFrame, sink: &mut P) {
        sink.upload_vertex_buffer(
            VertexSlot::Position,
            bytemuck::cast_slice(&self.positions),
            0,
            self.positions.len(),
        );
        sink.upload_vertex_buffer(
            VertexSlot::Uv,
            bytemuck::cast_slice(&self.uvs),
            0,
            self.uvs.len(),
        );
        sink.upload_index_buffer(&self.indices, 0, self.indices.len());

        for call in frame.draw_calls() {
            sink.submit_draw_call(&call);
        }
    }

    /// Consumes ticks until teardown.
    pub async fn run<P: PlaneSink>(
        mut self,
        mut sink: P,
        ticks: Arc<Mailbox<TrackingTick>>,
        mut shutdown: watch::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                tick = ticks.recv() => match tick {
                    Some(tick) => {
                        self.process(&tick, &mut sink);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Plane aggregator stopped");
    }
}

impl Default for PlaneMeshAggregator {
    fn default() -> Self {
        Self::new()
    }
}
