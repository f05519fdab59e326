//! Gesture-driven placement of the model.
//!
//! [`GesturePlacementController`] is the only owner of the
//! [`PlacementWriter`]; the animation pipeline holds the matching
//! [`PlacementReader`]. The first successful placement sets the
//! [`ReadinessLatch`], which releases the animation pipeline.

use crate::mailbox::Mailbox;
use crate::tracking::{Hit, HitKind, TrackingTick, Viewport};
use glam::{Vec2, Vec3};
use std::f32::consts::TAU;
use std::sync::Arc;
use tokio::sync::watch;

/// Where the model sits, how it is turned and how large it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementState {
    pub translation: Vec3,
    /// Rotation about the vertical axis, radians in `[0, 2π)`.
    pub rotation: f32,
    /// Uniform scale. Accumulates multiplicatively and is never clamped.
    pub scale: f32,
}

impl PlacementState {
    pub fn rotation_degrees(&self) -> f32 {
        self.rotation.to_degrees()
    }

    pub fn apply_update(&mut self, delta_rotation: f32, delta_scale: f32) {
        self.rotation = wrap_angle(self.rotation + delta_rotation);
        self.scale *= delta_scale;
    }
}

impl Default for PlacementState {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

/// Wraps an angle into `[0, 2π)`.
#[inline]
pub fn wrap_angle(radians: f32) -> f32 {
    let wrapped = radians.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly TAU.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Place the model under a screen point, normalized to `[0, 1]²`.
    Move(Vec2),
    /// Turn by `rotation` radians and multiply the scale by `scale`.
    Update { rotation: f32, scale: f32 },
}

/// Result of applying one gesture, mostly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Placed(Vec3),
    NoHit,
    /// A move arrived before the first tracking tick.
    NoSnapshot,
    Transformed { rotation: f32, scale: f32 },
}

// ---------------------------------------------------------------------------
// Readiness latch
// ---------------------------------------------------------------------------

/// One-shot flag: once set it stays set.
pub struct ReadinessLatch {
    tx: watch::Sender<bool>,
}

impl ReadinessLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Sets the latch. Returns `true` only for the call that flipped it.
    pub fn set(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn waiter(&self) -> ReadinessWaiter {
        ReadinessWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ReadinessLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ReadinessWaiter {
    rx: watch::Receiver<bool>,
}

impl ReadinessWaiter {
    /// Resolves once the latch is set. Returns `false` if the latch was
    /// dropped without ever being set.
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|ready| *ready).await.is_ok()
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }
}

// ---------------------------------------------------------------------------
// Placement handles
// ---------------------------------------------------------------------------

/// Creates the single writer / single reader pair for the placement state.
pub fn placement_channel() -> (PlacementWriter, PlacementReader) {
    let (tx, rx) = watch::channel(PlacementState::default());
    (PlacementWriter { tx }, PlacementReader { rx })
}

pub struct PlacementWriter {
    tx: watch::Sender<PlacementState>,
}

impl PlacementWriter {
    pub fn update(&self, f: impl FnOnce(&mut PlacementState)) {
        self.tx.send_modify(f);
    }

    pub fn current(&self) -> PlacementState {
        *self.tx.borrow()
    }
}

pub struct PlacementReader {
    rx: watch::Receiver<PlacementState>,
}

impl PlacementReader {
    pub fn current(&self) -> PlacementState {
        *self.rx.borrow()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Picks the hit a move gesture lands on: the nearest feature point when there
/// is one, otherwise the nearest hit of any kind.
pub fn select_hit(hits: &[Hit]) -> Option<&Hit> {
    hits.iter()
        .find(|hit| matches!(hit.kind, HitKind::Point))
        .or_else(|| hits.first())
}

pub struct GesturePlacementController {
    placement: PlacementWriter,
    latch: ReadinessLatch,
    viewport: Arc<dyn Viewport>,
    current_tick: watch::Receiver<Option<TrackingTick>>,
}

impl GesturePlacementController {
    pub fn new(
        placement: PlacementWriter,
        latch: ReadinessLatch,
        viewport: Arc<dyn Viewport>,
        current_tick: watch::Receiver<Option<TrackingTick>>,
    ) -> Self {
        Self {
            placement,
            latch,
            viewport,
            current_tick,
        }
    }

    pub fn placement(&self) -> PlacementState {
        self.placement.current()
    }

    pub fn readiness(&self) -> ReadinessWaiter {
        self.latch.waiter()
    }

    pub fn apply(&mut self, event: GestureEvent) -> GestureOutcome {
        match event {
            GestureEvent::Move(normalized) => self.apply_move(normalized),
            GestureEvent::Update { rotation, scale } => {
                let mut next = PlacementState::default();
                self.placement.update(|state| {
                    state.apply_update(rotation, scale);
                    next = *state;
                });
                tracing::debug!(
                    rotation_deg = next.rotation_degrees(),
                    scale = next.scale,
                    "Placement transformed"
                );
                GestureOutcome::Transformed {
                    rotation: next.rotation,
                    scale: next.scale,
                }
            }
        }
    }

    fn apply_move(&mut self, normalized: Vec2) -> GestureOutcome {
        let Some(tick) = self.current_tick.borrow().clone() else {
            tracing::debug!("Move gesture before first tracking tick ignored");
            return GestureOutcome::NoSnapshot;
        };

        let screen = self.viewport.dimensions() * normalized;
        let hits = tick.snapshot.hit_test(screen.x, screen.y);

        let Some(hit) = select_hit(&hits) else {
            tracing::debug!(x = screen.x, y = screen.y, "Move gesture missed every surface");
            return GestureOutcome::NoHit;
        };

        let position = hit.world_position;
        self.placement.update(|state| state.translation = position);
        if self.latch.set() {
            tracing::info!(position = ?position, "Model placed for the first time");
        } else {
            tracing::debug!(position = ?position, kind = ?hit.kind, "Model moved");
        }
        GestureOutcome::Placed(position)
    }

    /// Consumes gestures until teardown.
    pub async fn run(
        mut self,
        gestures: Arc<Mailbox<GestureEvent>>,
        mut shutdown: watch::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = gestures.recv() => match event {
                    Some(event) => {
                        self.apply(event);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Gesture controller stopped");
    }
}
