//! Scripted gesture sequence standing in for touch input.

use ar_stage::GestureEvent;
use glam::Vec2;

const FIRST_PLACEMENT_TICK: u64 = 45;
const REPLACEMENT_TICK: u64 = 240;
const UPDATE_PERIOD: u64 = 20;
const ROTATION_STEP_RAD: f32 = 0.2;
const SCALE_STEP: f32 = 1.05;

/// Gesture, if any, the user performs on tick `k`.
///
/// Places the model on the floor once it is large enough and moves it again
/// later. In between it keeps twisting the model while pinching in and out.
pub fn scripted_gesture(k: u64) -> Option<GestureEvent> {
    match k {
        FIRST_PLACEMENT_TICK => Some(GestureEvent::Move(Vec2::new(0.5, 0.7))),
        REPLACEMENT_TICK => Some(GestureEvent::Move(Vec2::new(0.4, 0.75))),
        k if k > FIRST_PLACEMENT_TICK && k % UPDATE_PERIOD == 0 => {
            let scale = if (k / UPDATE_PERIOD) % 2 == 0 {
                SCALE_STEP
            } else {
                1.0 / SCALE_STEP
            };
            Some(GestureEvent::Update {
                rotation: ROTATION_STEP_RAD,
                scale,
            })
        }
        _ => None,
    }
}
