//! Wires the stage components into tasks on the caller's tokio runtime.
//!
//! Three tasks are spawned: the gesture controller, the plane aggregator and
//! the animation drive (which first loads the asset on the blocking worker).
//! Every tick goes to the aggregator through its own coalescing mailbox and is
//! kept as the snapshot move gestures hit-test against. The drive gets its own
//! mailbox too, but only once the model has been placed.

use crate::animation::AnimationDrive;
use crate::asset::{AssetDecoder, AssetLoader};
use crate::config::StageConfig;
use crate::error::StageError;
use crate::mailbox::Mailbox;
use crate::placement::{
    placement_channel, GestureEvent, GesturePlacementController, ReadinessLatch, ReadinessWaiter,
};
use crate::plane_mesh::{PlaneMeshAggregator, PlanePassCounters};
use crate::render::{PlaneSink, SceneSink};
use crate::tracking::{TrackingTick, Viewport};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Counters the host can export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub plane_ticks_coalesced: u64,
    pub drive_ticks_coalesced: u64,
    pub gestures_coalesced: u64,
    pub plane_passes_skipped: u64,
    pub plane_passes_truncated: u64,
}

/// Producer side of the stage. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct StageHandle {
    current_tick: Arc<watch::Sender<Option<TrackingTick>>>,
    plane_ticks: Arc<Mailbox<TrackingTick>>,
    drive_ticks: Arc<Mailbox<TrackingTick>>,
    gestures: Arc<Mailbox<GestureEvent>>,
    plane_passes: Arc<PlanePassCounters>,
    readiness: ReadinessWaiter,
}

impl StageHandle {
    /// Delivers a tracking tick. A tick still pending in a consumer is
    /// replaced.
    ///
    /// The animation drive only receives ticks once the model has been
    /// placed; earlier ticks never reach it.
    pub fn on_tick(&self, tick: TrackingTick) {
        self.current_tick.send_replace(Some(tick.clone()));
        if self.readiness.is_set() {
            self.drive_ticks.post(tick.clone());
        }
        self.plane_ticks.post(tick);
    }

    /// Delivers a gesture. A gesture still pending is replaced.
    pub fn submit_gesture(&self, event: GestureEvent) {
        if self.gestures.post(event) {
            tracing::trace!("Pending gesture replaced");
        }
    }

    pub fn stats(&self) -> StageStats {
        StageStats {
            plane_ticks_coalesced: self.plane_ticks.coalesced(),
            drive_ticks_coalesced: self.drive_ticks.coalesced(),
            gestures_coalesced: self.gestures.coalesced(),
            plane_passes_skipped: self.plane_passes.skipped.load(Ordering::Relaxed),
            plane_passes_truncated: self.plane_passes.truncated.load(Ordering::Relaxed),
        }
    }

    fn close(&self) {
        self.plane_ticks.close();
        self.drive_ticks.close();
        self.gestures.close();
    }
}

/// Owns the stage tasks. Dropping it aborts them.
pub struct StageRuntime {
    handle: StageHandle,
    shutdown: Option<watch::Sender<()>>,
    tasks: JoinSet<Result<(), StageError>>,
}

impl StageRuntime {
    /// Spawns the stage. Must be called from within a tokio runtime.
    pub fn start<S, P>(
        config: StageConfig,
        decoder: Arc<dyn AssetDecoder>,
        viewport: Arc<dyn Viewport>,
        scene: S,
        planes: P,
    ) -> (Self, StageHandle)
    where
        S: SceneSink,
        P: PlaneSink,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let (tick_tx, tick_rx) = watch::channel(None);
        let aggregator = PlaneMeshAggregator::new();

        let (writer, reader) = placement_channel();
        let controller =
            GesturePlacementController::new(writer, ReadinessLatch::new(), viewport, tick_rx);
        let readiness = controller.readiness();

        let handle = StageHandle {
            current_tick: Arc::new(tick_tx),
            plane_ticks: Arc::new(Mailbox::new()),
            drive_ticks: Arc::new(Mailbox::new()),
            gestures: Arc::new(Mailbox::new()),
            plane_passes: aggregator.counters(),
            readiness: readiness.clone(),
        };

        let mut tasks = JoinSet::new();

        {
            let gestures = handle.gestures.clone();
            let shutdown = shutdown_rx.clone();
            tasks.spawn(async move {
                controller.run(gestures, shutdown).await;
                Ok(())
            });
        }

        {
            let ticks = handle.plane_ticks.clone();
            let shutdown = shutdown_rx.clone();
            tasks.spawn(async move {
                aggregator.run(planes, ticks, shutdown).await;
                Ok(())
            });
        }

        {
            let loader = AssetLoader::new(config.asset_path.clone(), decoder);
            let ticks = handle.drive_ticks.clone();
            let mut shutdown = shutdown_rx;
            let clip = config.animation_clip;
            tasks.spawn(async move {
                let asset = tokio::select! {
                    _ = shutdown.changed() => return Ok(()),
                    loaded = loader.load() => loaded.map_err(|e| {
                        tracing::error!(error = %e, "Asset load failed; stage cannot continue");
                        e
                    })?,
                };
                AnimationDrive::new(asset, clip, reader, scene)
                    .run(readiness, ticks, shutdown)
                    .await;
                Ok(())
            });
        }

        tracing::info!(asset = %config.asset_path.display(), "Stage started");

        let runtime = Self {
            handle: handle.clone(),
            shutdown: Some(shutdown_tx),
            tasks,
        };
        (runtime, handle)
    }

    /// Resolves when a stage task ends on its own. Tasks only end early on a
    /// fatal error, so any `Some` here means the stage is no longer usable.
    pub async fn next_exit(&mut self) -> Option<Result<(), StageError>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.unwrap_or_else(|e| {
            Err(StageError::Task {
                task: "stage",
                reason: e.to_string(),
            })
        }))
    }

    /// Tears down every task together and reports the first failure.
    pub async fn shutdown(mut self) -> Result<(), StageError> {
        tracing::info!("Stage shutting down");
        // Dropping the sender wakes every task's shutdown branch.
        drop(self.shutdown.take());
        self.handle.close();

        let mut first_error = None;
        while let Some(exit) = self.next_exit().await {
            if let Err(e) = exit {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
