mod config;
mod feed;
mod gestures;
mod gltf_asset;
mod metrics;
mod renderer;

use crate::config::Config;
use anyhow::Context;
use ar_stage::{FixedViewport, StageConfig, StageRuntime};
use clap::Parser;
use feed::SyntheticFeed;
use glam::Vec2;
use gltf_asset::GltfDecoder;
use metrics::SimMetrics;
use renderer::{LoggingPlanes, LoggingScene};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

const STATS_INTERVAL_TICKS: u64 = 100;

// One thread drives every stage task; the asset is decoded on the blocking
// pool so it never stalls the tick loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // --- 1. Initialization ---
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();
    let config = Config::parse();
    tracing::info!(config = ?config, "Stage simulator starting with configuration");

    let session_id = uuid::Uuid::new_v4().to_string();
    let metrics = Arc::new(SimMetrics::new());
    let viewport = Vec2::new(config.viewport_width as f32, config.viewport_height as f32);

    // --- 2. Start Metrics Server ---
    let metrics_router = metrics.router();
    let metrics_addr: std::net::SocketAddr = config
        .metrics_listen_addr
        .parse()
        .context("Invalid metrics listen address")?;
    let listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {metrics_addr}"))?;
    tokio::spawn(async move {
        tracing::info!(addr = %metrics_addr, "Metrics server started");
        if let Err(e) = axum::serve(listener, metrics_router.into_make_service()).await {
            tracing::error!(error = %e, "Metrics server exited with an error");
        }
    });

    // --- 3. Start the Stage ---
    let stage_config = StageConfig {
        asset_path: config.asset_path.clone(),
        animation_clip: config.animation_clip,
    };
    let (mut runtime, handle) = StageRuntime::start(
        stage_config,
        Arc::new(GltfDecoder),
        Arc::new(FixedViewport(viewport)),
        LoggingScene::new(metrics.clone()),
        LoggingPlanes::new(metrics.clone()),
    );
    tracing::info!(session_id, "Stage session started");

    let mut feed = SyntheticFeed::new(
        viewport,
        config.tick_rate_hz,
        config.extra_planes,
        config.seed,
    );

    // --- 4. Main Tick Loop ---
    let period = Duration::from_nanos(1_000_000_000 / config.tick_rate_hz);
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received.");
                break;
            },
            exit = runtime.next_exit() => match exit {
                Some(Err(e)) => {
                    return Err(e).context("Stage failed");
                }
                Some(Ok(())) | None => {
                    tracing::warn!("Stage task ended before shutdown");
                    break;
                }
            },
            _ = interval.tick() => {
                let k = feed.ticks_emitted();
                if config.max_ticks > 0 && k >= config.max_ticks {
                    tracing::info!(ticks = k, "Tick budget reached");
                    break;
                }

                handle.on_tick(feed.next_tick());
                metrics.ticks_total.inc();

                if let Some(gesture) = gestures::scripted_gesture(k) {
                    tracing::info!(tick = k, gesture = ?gesture, "Gesture submitted");
                    handle.submit_gesture(gesture);
                }

                if k % STATS_INTERVAL_TICKS == 0 {
                    let stats = handle.stats();
                    metrics.update_stage_stats(stats);
                    tracing::info!(tick = k, stats = ?stats, "Stage stats");
                }
            }
        }
    }

    // --- 5. Teardown ---
    metrics.update_stage_stats(handle.stats());
    runtime.shutdown().await.context("Stage shutdown failed")?;
    tracing::info!(session_id, ticks = feed.ticks_emitted(), "Stage simulator stopped.");
    Ok(())
}
