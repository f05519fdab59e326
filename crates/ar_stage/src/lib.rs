// src/lib.rs
//! AR stage synchronization core.
//!
//! Keeps one animated model and a live mesh of the detected planes in step
//! with a spatial-tracking feed. Every tracking tick produces a world
//! transform for the model and a fresh set of plane vertex/index buffers for
//! the rendering engine.
//!
//! ```text
//! TickFeed ──┬─► AnimationDrive      (animation.rs)  ← PlacementReader
//!            │      └── AssetLoader  (asset.rs)
//!            └─► PlaneMeshAggregator (plane_mesh.rs)
//! GestureSubmitter ─► GesturePlacementController (placement.rs) ─► PlacementWriter
//! ```
//!
//! The tracking subsystem, the rendering engine and asset decoding are
//! external collaborators, reached through the traits in [`tracking`],
//! [`render`] and [`asset`].

pub mod animation;
pub mod asset;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mailbox;
pub mod placement;
pub mod plane_mesh;
pub mod render;
pub mod runtime;
pub mod tracking;

pub use animation::{AnimationDrive, DriveState};
pub use asset::{AnimationClip, AssetDecoder, AssetHandle, AssetLoader};
pub use config::StageConfig;
pub use error::StageError;
pub use mailbox::Mailbox;
pub use placement::{GestureEvent, GesturePlacementController, PlacementState, ReadinessLatch};
pub use plane_mesh::{
    PlaneFrame, PlaneMeshAggregator, PlanePassCounters, PLANE_INDEX_CAPACITY, PLANE_VERTEX_CAPACITY,
};
pub use render::{Aabb, DrawCall, EntityId, PlaneMaterial, PlaneSink, SceneSink, VertexSlot};
pub use runtime::{StageHandle, StageRuntime, StageStats};
pub use tracking::{
    FixedViewport, Hit, HitKind, Pose, SurfaceId, SurfaceKind, SurfaceTrackable,
    TrackingSnapshot, TrackingTick, Viewport,
};
