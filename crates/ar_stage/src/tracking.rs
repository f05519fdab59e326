//! Types handed over by the spatial-tracking subsystem.

use glam::{Mat4, Quat, Vec2, Vec3};
use std::sync::Arc;

/// Stable identity of a tracked surface.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SurfaceKind {
    HorizontalUp,
    HorizontalDown,
    Vertical,
}

/// Rigid transform (position + orientation) in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A detected planar region as seen in one tracking snapshot.
#[derive(Debug, Clone)]
pub struct SurfaceTrackable {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
    /// Convex boundary in the plane's local X/Z coordinates.
    pub boundary: Vec<Vec2>,
    pub center_pose: Pose,
    pub tracking_active: bool,
    /// Surface this one was merged into, if any.
    pub merge_target: Option<Arc<SurfaceTrackable>>,
}

impl SurfaceTrackable {
    /// Follows `merge_target` links to the surviving surface.
    pub fn merge_root(self: &Arc<Self>) -> Arc<Self> {
        let mut current = self.clone();
        while let Some(target) = current.merge_target.clone() {
            current = target;
        }
        current
    }
}

/// What a hit-test ray struck.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HitKind {
    /// A sparse feature point.
    Point,
    /// A tracked plane.
    Surface(SurfaceId),
    /// Anything else the tracker reports (depth points, instant placements).
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub kind: HitKind,
    pub world_position: Vec3,
}

/// Read-only view of the tracker state for one cycle.
pub trait TrackingSnapshot: Send + Sync {
    /// Surfaces whose state changed during this cycle.
    fn updated_surfaces(&self) -> Vec<Arc<SurfaceTrackable>>;

    /// Casts a ray through the given pixel. Hits come back nearest first.
    fn hit_test(&self, screen_x: f32, screen_y: f32) -> Vec<Hit>;
}

/// One tracking cycle.
#[derive(Clone)]
pub struct TrackingTick {
    pub timestamp_nanos: i64,
    pub snapshot: Arc<dyn TrackingSnapshot>,
}

impl TrackingTick {
    pub fn new(timestamp_nanos: i64, snapshot: Arc<dyn TrackingSnapshot>) -> Self {
        Self {
            timestamp_nanos,
            snapshot,
        }
    }
}

impl std::fmt::Debug for TrackingTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingTick")
            .field("timestamp_nanos", &self.timestamp_nanos)
            .finish_non_exhaustive()
    }
}

/// Size of the surface the camera image is shown on, in pixels.
pub trait Viewport: Send + Sync {
    fn dimensions(&self) -> Vec2;
}

/// A viewport whose size never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedViewport(pub Vec2);

impl Viewport for FixedViewport {
    fn dimensions(&self) -> Vec2 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(id: u64, merge_target: Option<Arc<SurfaceTrackable>>) -> Arc<SurfaceTrackable> {
        Arc::new(SurfaceTrackable {
            id: SurfaceId(id),
            kind: SurfaceKind::HorizontalUp,
            boundary: Vec::new(),
            center_pose: Pose::IDENTITY,
            tracking_active: true,
            merge_target,
        })
    }

    #[test]
    fn merge_root_follows_the_whole_chain() {
        let root = surface(1, None);
        let middle = surface(2, Some(root.clone()));
        let leaf = surface(3, Some(middle));

        assert_eq!(leaf.merge_root().id, SurfaceId(1));
        assert_eq!(root.merge_root().id, SurfaceId(1));
    }

    #[test]
    fn pose_matrix_rotates_then_translates() {
        let pose = Pose::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let p = pose.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(1.0, 0.0, -1.0)).length() < 1e-5);
    }
}
