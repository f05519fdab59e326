//! Synthetic tracking feed.
//!
//! Plays a small scripted room: a floor that grows as it is "scanned", a
//! second floor patch that is later merged into it, a wall, and a ceiling
//! that drops in and out of tracking. Extra scattered floor patches can be
//! added to push the plane buffers past capacity. Hit-tests cast a pinhole
//! camera ray against the tracked planes and a cloud of feature points.

use crate::config::MAX_TICK_RATE_HZ;
use ar_stage::{
    Hit, HitKind, Pose, SurfaceId, SurfaceKind, SurfaceTrackable, TrackingSnapshot, TrackingTick,
};
use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::sync::Arc;

const CAMERA_HEIGHT_M: f32 = 1.4;
const CAMERA_PITCH_RAD: f32 = -PI / 6.0;
const VERTICAL_FOV_RAD: f32 = PI / 3.0;
/// Max distance between a ray and a feature point that still counts as a hit.
const FEATURE_HIT_RADIUS_M: f32 = 0.05;
const FEATURE_COUNT: usize = 48;

const FLOOR_ID: u64 = 1;
const PATCH_ID: u64 = 2;
const WALL_ID: u64 = 3;
const CEILING_ID: u64 = 4;
const SCATTER_BASE_ID: u64 = 100;

const PATCH_APPEARS_AT: u64 = 30;
const WALL_APPEARS_AT: u64 = 60;
const PATCH_MERGED_AT: u64 = 90;
const CEILING_APPEARS_AT: u64 = 120;
/// Every n-th tick reports no updated planes.
const QUIET_TICK_PERIOD: u64 = 10;

/// Fixed camera looking down -Z from standing height, tilted towards the floor.
#[derive(Debug, Clone, Copy)]
pub struct CameraModel {
    pub position: Vec3,
    pub orientation: Quat,
    pub viewport: Vec2,
}

impl CameraModel {
    pub fn new(viewport: Vec2) -> Self {
        Self {
            position: Vec3::new(0.0, CAMERA_HEIGHT_M, 0.0),
            orientation: Quat::from_rotation_x(CAMERA_PITCH_RAD),
            viewport,
        }
    }

    /// World-space ray direction through a pixel.
    pub fn ray(&self, screen_x: f32, screen_y: f32) -> Vec3 {
        let ndc_x = screen_x / self.viewport.x * 2.0 - 1.0;
        let ndc_y = 1.0 - screen_y / self.viewport.y * 2.0;
        let tan_half = (VERTICAL_FOV_RAD / 2.0).tan();
        let aspect = self.viewport.x / self.viewport.y;
        let local = Vec3::new(ndc_x * tan_half * aspect, ndc_y * tan_half, -1.0).normalize();
        self.orientation * local
    }
}

/// Where a ray meets the plane of `surface`, if it lands inside the boundary.
fn intersect_surface(origin: Vec3, dir: Vec3, surface: &SurfaceTrackable) -> Option<(f32, Vec3)> {
    let pose = surface.center_pose;
    let normal = pose.rotation * Vec3::Y;
    let denom = dir.dot(normal);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (pose.translation - origin).dot(normal) / denom;
    if t <= 0.0 {
        return None;
    }
    let world = origin + dir * t;
    let local = pose.rotation.inverse() * (world - pose.translation);
    contains_convex(&surface.boundary, Vec2::new(local.x, local.z)).then_some((t, world))
}

fn contains_convex(boundary: &[Vec2], p: Vec2) -> bool {
    if boundary.len() < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for (i, &a) in boundary.iter().enumerate() {
        let b = boundary[(i + 1) % boundary.len()];
        let cross = (b - a).perp_dot(p - a);
        if cross.abs() < 1e-9 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Regular polygon of `sides` points around the origin, counter-clockwise.
pub fn regular_polygon(radius: f32, sides: usize) -> Vec<Vec2> {
    (0..sides)
        .map(|k| {
            let a = TAU * k as f32 / sides as f32;
            Vec2::new(radius * a.cos(), radius * a.sin())
        })
        .collect()
}

pub struct FeedSnapshot {
    camera: CameraModel,
    updated: Vec<Arc<SurfaceTrackable>>,
    /// Every plane the tracker knows, updated or not.
    tracked: Vec<Arc<SurfaceTrackable>>,
    features: Arc<Vec<Vec3>>,
}

impl TrackingSnapshot for FeedSnapshot {
    fn updated_surfaces(&self) -> Vec<Arc<SurfaceTrackable>> {
        self.updated.clone()
    }

    fn hit_test(&self, screen_x: f32, screen_y: f32) -> Vec<Hit> {
        let origin = self.camera.position;
        let dir = self.camera.ray(screen_x, screen_y);

        let mut hits: Vec<(f32, Hit)> = self
            .tracked
            .iter()
            .filter(|s| s.tracking_active && s.merge_target.is_none())
            .filter_map(|s| {
                intersect_surface(origin, dir, s).map(|(t, world_position)| {
                    (
                        t,
                        Hit {
                            kind: HitKind::Surface(s.id),
                            world_position,
                        },
                    )
                })
            })
            .collect();

        for &feature in self.features.iter() {
            let t = (feature - origin).dot(dir);
            if t <= 0.0 {
                continue;
            }
            if (origin + dir * t - feature).length() <= FEATURE_HIT_RADIUS_M {
                hits.push((
                    t,
                    Hit {
                        kind: HitKind::Point,
                        world_position: feature,
                    },
                ));
            }
        }

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, hit)| hit).collect()
    }
}

pub struct SyntheticFeed {
    camera: CameraModel,
    tick_period_nanos: i64,
    tick: u64,
    features: Arc<Vec<Vec3>>,
    scatter: Vec<Arc<SurfaceTrackable>>,
}

impl SyntheticFeed {
    pub fn new(viewport: Vec2, tick_rate_hz: u64, extra_planes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let features = (0..FEATURE_COUNT)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-1.5..1.5),
                    rng.gen_range(0.0..0.02),
                    rng.gen_range(-3.0..-0.5),
                )
            })
            .collect();

        let scatter = (0..extra_planes)
            .map(|i| {
                let sides = rng.gen_range(3..=12);
                let radius = rng.gen_range(0.1..0.4);
                let center = Vec3::new(rng.gen_range(-6.0..6.0), 0.0, rng.gen_range(-8.0..-1.0));
                let yaw = Quat::from_rotation_y(rng.gen_range(0.0..TAU));
                Arc::new(SurfaceTrackable {
                    id: SurfaceId(SCATTER_BASE_ID + i as u64),
                    kind: SurfaceKind::HorizontalUp,
                    boundary: regular_polygon(radius, sides),
                    center_pose: Pose::new(center, yaw),
                    tracking_active: true,
                    merge_target: None,
                })
            })
            .collect();

        Self {
            camera: CameraModel::new(viewport),
            tick_period_nanos: 1_000_000_000 / tick_rate_hz.clamp(1, MAX_TICK_RATE_HZ) as i64,
            tick: 0,
            features: Arc::new(features),
            scatter,
        }
    }

    pub fn ticks_emitted(&self) -> u64 {
        self.tick
    }

    /// Planes as the tracker sees them at tick `k`.
    fn room(&self, k: u64) -> Vec<Arc<SurfaceTrackable>> {
        let mut planes = Vec::with_capacity(4 + self.scatter.len());

        let floor_radius = (0.3 + k as f32 * 0.02).min(2.5);
        let floor = Arc::new(SurfaceTrackable {
            id: SurfaceId(FLOOR_ID),
            kind: SurfaceKind::HorizontalUp,
            boundary: regular_polygon(floor_radius, 8),
            center_pose: Pose::from_translation(Vec3::new(0.0, 0.0, -1.5)),
            tracking_active: true,
            merge_target: None,
        });
        planes.push(floor.clone());

        if k >= PATCH_APPEARS_AT {
            planes.push(Arc::new(SurfaceTrackable {
                id: SurfaceId(PATCH_ID),
                kind: SurfaceKind::HorizontalUp,
                boundary: regular_polygon(0.4, 6),
                center_pose: Pose::from_translation(Vec3::new(1.5, 0.0, -3.0)),
                tracking_active: true,
                merge_target: (k >= PATCH_MERGED_AT).then(|| floor.clone()),
            }));
        }

        if k >= WALL_APPEARS_AT {
            planes.push(Arc::new(SurfaceTrackable {
                id: SurfaceId(WALL_ID),
                kind: SurfaceKind::Vertical,
                boundary: regular_polygon(1.2, 4),
                center_pose: Pose::new(Vec3::new(0.0, 1.2, -4.0), Quat::from_rotation_x(FRAC_PI_2)),
                tracking_active: true,
                merge_target: None,
            }));
        }

        if k >= CEILING_APPEARS_AT {
            // Drops out of tracking for a fifth of every 60 ticks.
            let tracking_active = (k - CEILING_APPEARS_AT) % 60 < 48;
            planes.push(Arc::new(SurfaceTrackable {
                id: SurfaceId(CEILING_ID),
                kind: SurfaceKind::HorizontalDown,
                boundary: regular_polygon(1.5, 5),
                center_pose: Pose::new(Vec3::new(0.0, 2.6, -2.0), Quat::from_rotation_x(PI)),
                tracking_active,
                merge_target: None,
            }));
        }

        planes.extend(self.scatter.iter().cloned());
        planes
    }

    /// Produces the next tick.
    pub fn next_tick(&mut self) -> TrackingTick {
        let k = self.tick;
        self.tick += 1;

        let tracked = self.room(k);
        let updated = if k % QUIET_TICK_PERIOD == QUIET_TICK_PERIOD - 1 {
            Vec::new()
        } else {
            tracked.clone()
        };

        let snapshot = FeedSnapshot {
            camera: self.camera,
            updated,
            tracked,
            features: self.features.clone(),
        };
        TrackingTick::new(k as i64 * self.tick_period_nanos, Arc::new(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Vec2 {
        Vec2::new(1080.0, 1920.0)
    }

    #[test]
    fn center_ray_follows_camera_pitch() {
        let camera = CameraModel::new(viewport());
        let dir = camera.ray(540.0, 960.0);
        let expected = Quat::from_rotation_x(CAMERA_PITCH_RAD) * Vec3::NEG_Z;
        assert!((dir - expected).length() < 1e-5, "{dir:?}");
    }

    #[test]
    fn lower_screen_hits_the_floor() {
        let mut feed = SyntheticFeed::new(viewport(), 30, 0, 1);
        let tick = (0..46).map(|_| feed.next_tick()).last().unwrap();

        let hits = tick.snapshot.hit_test(540.0, 1344.0);
        let floor_hit = hits
            .iter()
            .find(|h| h.kind == HitKind::Surface(SurfaceId(FLOOR_ID)))
            .expect("floor should be under the lower screen");
        assert!(floor_hit.world_position.y.abs() < 1e-4);
    }

    #[test]
    fn sky_misses_everything() {
        let mut feed = SyntheticFeed::new(viewport(), 30, 0, 1);
        let tick = feed.next_tick();
        assert!(tick.snapshot.hit_test(540.0, 0.0).is_empty());
    }

    #[test]
    fn timestamps_advance_by_the_tick_period() {
        let mut feed = SyntheticFeed::new(viewport(), 20, 0, 1);
        let stamps: Vec<i64> = (0..3).map(|_| feed.next_tick().timestamp_nanos).collect();
        assert_eq!(stamps, vec![0, 50_000_000, 100_000_000]);
        assert_eq!(feed.ticks_emitted(), 3);
    }

    #[test]
    fn tick_rate_is_clamped_to_a_nonzero_period() {
        let mut feed = SyntheticFeed::new(viewport(), u64::MAX, 0, 1);
        feed.next_tick();
        assert_eq!(feed.next_tick().timestamp_nanos, 1_000_000);

        let mut feed = SyntheticFeed::new(viewport(), 0, 0, 1);
        feed.next_tick();
        assert_eq!(feed.next_tick().timestamp_nanos, 1_000_000_000);
    }

    #[test]
    fn quiet_ticks_report_no_updates() {
        let mut feed = SyntheticFeed::new(viewport(), 30, 0, 1);
        let updates: Vec<usize> = (0..QUIET_TICK_PERIOD)
            .map(|_| feed.next_tick().snapshot.updated_surfaces().len())
            .collect();
        assert_eq!(updates[QUIET_TICK_PERIOD as usize - 1], 0);
        assert!(updates[..QUIET_TICK_PERIOD as usize - 1].iter().all(|&n| n == 1));
    }

    #[test]
    fn patch_merges_into_the_floor() {
        let feed = SyntheticFeed::new(viewport(), 30, 0, 1);
        let before = feed.room(PATCH_MERGED_AT - 1);
        let after = feed.room(PATCH_MERGED_AT);

        let patch = |planes: &[Arc<SurfaceTrackable>]| {
            planes
                .iter()
                .find(|s| s.id == SurfaceId(PATCH_ID))
                .cloned()
                .unwrap()
        };
        assert_eq!(patch(&before).merge_root().id, SurfaceId(PATCH_ID));
        assert_eq!(patch(&after).merge_root().id, SurfaceId(FLOOR_ID));
    }

    #[test]
    fn scattered_patches_are_seeded() {
        let a = SyntheticFeed::new(viewport(), 30, 5, 9);
        let b = SyntheticFeed::new(viewport(), 30, 5, 9);
        let boundaries = |f: &SyntheticFeed| -> Vec<usize> {
            f.scatter.iter().map(|s| s.boundary.len()).collect()
        };
        assert_eq!(boundaries(&a), boundaries(&b));
        assert_eq!(a.room(0).len(), 6);
    }

    #[test]
    fn convex_containment() {
        let square = regular_polygon(1.0, 4);
        assert!(contains_convex(&square, Vec2::ZERO));
        assert!(!contains_convex(&square, Vec2::new(2.0, 0.0)));
        assert!(!contains_convex(&square[..2], Vec2::ZERO));
    }
}
