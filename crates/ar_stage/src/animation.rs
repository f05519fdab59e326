//! Animation and world-transform drive for the placed model.
//!
//! The drive idles in [`DriveState::WaitingForReadiness`] until the model has
//! been placed once, then pushes a pose and a world transform for every tick
//! it consumes. Phase is derived from the absolute tick timestamp, so ticks
//! lost to coalescing never put playback out of step.

use crate::asset::AssetHandle;
use crate::mailbox::Mailbox;
use crate::placement::{PlacementReader, PlacementState, ReadinessWaiter};
use crate::render::SceneSink;
use crate::tracking::TrackingTick;
use glam::{Mat4, Vec3};
use std::sync::Arc;
use tokio::sync::watch;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DriveState {
    WaitingForReadiness,
    Running,
}

/// Playback position for a tick, in seconds.
pub fn animation_phase(timestamp_nanos: i64, duration_secs: f32) -> f32 {
    if duration_secs <= 0.0 {
        return 0.0;
    }
    let secs = timestamp_nanos as f64 / NANOS_PER_SEC;
    secs.rem_euclid(duration_secs as f64) as f32
}

/// `identity · translate · rotate_y · scale`, in that order.
pub fn world_transform(state: &PlacementState) -> Mat4 {
    Mat4::IDENTITY
        * Mat4::from_translation(state.translation)
        * Mat4::from_rotation_y(state.rotation)
        * Mat4::from_scale(Vec3::splat(state.scale))
}

pub struct AnimationDrive<S> {
    asset: AssetHandle,
    clip: usize,
    placement: PlacementReader,
    sink: S,
    state: DriveState,
}

impl<S: SceneSink> AnimationDrive<S> {
    pub fn new(asset: AssetHandle, clip: usize, placement: PlacementReader, sink: S) -> Self {
        Self {
            asset,
            clip,
            placement,
            sink,
            state: DriveState::WaitingForReadiness,
        }
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Moves to [`DriveState::Running`]. Later calls change nothing.
    pub fn mark_ready(&mut self) {
        if self.state == DriveState::WaitingForReadiness {
            tracing::info!(clip = self.clip, "Animation drive running");
            self.state = DriveState::Running;
        }
    }

    /// Pushes pose and world transform for one tick.
    ///
    /// Returns the transform that was pushed, or `None` while still waiting
    /// for the first placement.
    pub fn process_tick(&mut self, tick: &TrackingTick) -> Option<Mat4> {
        if self.state == DriveState::WaitingForReadiness {
            return None;
        }

        if let Some(clip) = self.asset.clip(self.clip) {
            let phase = animation_phase(tick.timestamp_nanos, clip.duration_secs);
            self.sink.set_animation_pose(&self.asset, self.clip, phase);
            self.sink.update_bone_matrices(&self.asset);
        }

        self.sink.attach_entities(&self.asset.entities);

        let placement = self.placement.current();
        let transform = world_transform(&placement);
        self.sink.set_world_transform(self.asset.root, transform);

        tracing::trace!(
            timestamp_nanos = tick.timestamp_nanos,
            translation = ?placement.translation,
            rotation_deg = placement.rotation_degrees(),
            scale = placement.scale,
            "World transform pushed"
        );
        Some(transform)
    }

    /// Waits for readiness, then consumes ticks until teardown.
    pub async fn run(
        mut self,
        mut readiness: ReadinessWaiter,
        ticks: Arc<Mailbox<TrackingTick>>,
        mut shutdown: watch::Receiver<()>,
    ) {
        tokio::select! {
            _ = shutdown.changed() => return,
            ready = readiness.wait() => {
                if !ready {
                    tracing::debug!("Readiness latch dropped before placement");
                    return;
                }
            }
        }
        self.mark_ready();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                tick = ticks.recv() => match tick {
                    Some(tick) => {
                        self.process_tick(&tick);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Animation drive stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AnimationClip;
    use crate::placement::placement_channel;
    use crate::render::EntityId;
    use crate::tracking::{Hit, SurfaceTrackable, TrackingSnapshot};
    use std::f32::consts::FRAC_PI_2;

    struct Empty;

    impl TrackingSnapshot for Empty {
        fn updated_surfaces(&self) -> Vec<Arc<SurfaceTrackable>> {
            Vec::new()
        }

        fn hit_test(&self, _x: f32, _y: f32) -> Vec<Hit> {
            Vec::new()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Pose(usize, f32),
        Bones,
        Attach(usize),
        Transform(EntityId, Mat4),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl SceneSink for Recorder {
        fn set_animation_pose(&mut self, _asset: &AssetHandle, clip: usize, phase_secs: f32) {
            self.calls.push(Call::Pose(clip, phase_secs));
        }

        fn update_bone_matrices(&mut self, _asset: &AssetHandle) {
            self.calls.push(Call::Bones);
        }

        fn attach_entities(&mut self, entities: &[EntityId]) {
            self.calls.push(Call::Attach(entities.len()));
        }

        fn set_world_transform(&mut self, root: EntityId, transform: Mat4) {
            self.calls.push(Call::Transform(root, transform));
        }
    }

    fn asset(clips: Vec<AnimationClip>) -> AssetHandle {
        AssetHandle {
            root: EntityId(7),
            entities: vec![EntityId(7), EntityId(8), EntityId(9)],
            clips,
        }
    }

    fn tick(timestamp_nanos: i64) -> TrackingTick {
        TrackingTick::new(timestamp_nanos, Arc::new(Empty))
    }

    fn dance() -> AnimationClip {
        AnimationClip {
            name: None,
            duration_secs: 4.0,
        }
    }

    #[test]
    fn phase_wraps_on_duration() {
        assert_eq!(animation_phase(1_500_000_000, 4.0), 1.5);
        assert_eq!(animation_phase(9_000_000_000, 4.0), 1.0);
        assert_eq!(animation_phase(9_000_000_000, 0.0), 0.0);
    }

    #[test]
    fn phase_recovers_after_dropped_ticks() {
        let before_gap = animation_phase(5_250_000_000, 4.0);
        let after_gap = animation_phase(5_250_000_000, 4.0);
        assert_eq!(before_gap, after_gap);
        assert_eq!(before_gap, 1.25);
    }

    #[test]
    fn transform_is_translate_rotate_scale() {
        let state = PlacementState {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: FRAC_PI_2,
            scale: 2.0,
        };
        let m = world_transform(&state);

        // +X is scaled to 2, turned onto -Z, then shifted by the translation.
        let p = m.transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5, "{p:?}");
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn waits_for_readiness_before_pushing() {
        let (_writer, reader) = placement_channel();
        let mut drive = AnimationDrive::new(asset(vec![dance()]), 0, reader, Recorder::default());

        assert_eq!(drive.process_tick(&tick(1)), None);
        assert!(drive.sink().calls.is_empty());
        assert_eq!(drive.state(), DriveState::WaitingForReadiness);

        drive.mark_ready();
        drive.mark_ready();
        assert_eq!(drive.state(), DriveState::Running);
        assert!(drive.process_tick(&tick(1)).is_some());
    }

    #[test]
    fn running_tick_poses_attaches_and_transforms() {
        let (writer, reader) = placement_channel();
        writer.update(|s| s.translation = Vec3::new(0.0, 0.0, -1.0));
        let mut drive = AnimationDrive::new(asset(vec![dance()]), 0, reader, Recorder::default());
        drive.mark_ready();

        let m = drive.process_tick(&tick(6_000_000_000)).unwrap();

        assert_eq!(
            drive.sink().calls,
            vec![
                Call::Pose(0, 2.0),
                Call::Bones,
                Call::Attach(3),
                Call::Transform(EntityId(7), m),
            ]
        );
        assert_eq!(m, Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn unanimated_asset_skips_pose() {
        let (_writer, reader) = placement_channel();
        let mut drive = AnimationDrive::new(asset(Vec::new()), 0, reader, Recorder::default());
        drive.mark_ready();

        drive.process_tick(&tick(42));

        assert_eq!(
            drive.sink().calls,
            vec![Call::Attach(3), Call::Transform(EntityId(7), Mat4::IDENTITY)]
        );
    }
}
