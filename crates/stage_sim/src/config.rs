use clap::Parser;
use std::path::PathBuf;

pub const MAX_TICK_RATE_HZ: u64 = 1000;

/// `stage_sim` - A headless host for the AR stage core.
///
/// Drives the stage with a synthetic tracking feed and a scripted gesture
/// sequence, and renders into a logging backend. Useful for soak-testing the
/// placement and plane pipelines without a device.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Path to the binary glTF model placed in the scene.
    #[arg(long, env = "STAGE_ASSET_PATH")]
    pub asset_path: PathBuf,

    /// Tracking tick rate of the synthetic feed, 1 to 1000 Hz.
    #[arg(
        long,
        env = "STAGE_TICK_RATE_HZ",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TICK_RATE_HZ)
    )]
    pub tick_rate_hz: u64,

    /// Width of the simulated camera viewport, in pixels.
    #[arg(long, env = "STAGE_VIEWPORT_WIDTH", default_value_t = 1080)]
    pub viewport_width: u32,

    /// Height of the simulated camera viewport, in pixels.
    #[arg(long, env = "STAGE_VIEWPORT_HEIGHT", default_value_t = 1920)]
    pub viewport_height: u32,

    /// Listen address for the Prometheus metrics server.
    #[arg(long, env = "STAGE_METRICS_LISTEN_ADDR", default_value = "127.0.0.1:9102")]
    pub metrics_listen_addr: String,

    /// Number of small scattered floor patches added on top of the scripted
    /// room. Large values exercise buffer truncation.
    #[arg(long, env = "STAGE_EXTRA_PLANES", default_value_t = 0)]
    pub extra_planes: usize,

    /// Stop after this many ticks. 0 runs until Ctrl+C.
    #[arg(long, env = "STAGE_MAX_TICKS", default_value_t = 0)]
    pub max_ticks: u64,

    /// Seed for the synthetic feed.
    #[arg(long, env = "STAGE_SEED", default_value_t = 7)]
    pub seed: u64,

    /// Animation clip driven by the tick timestamps.
    #[arg(long, env = "STAGE_ANIMATION_CLIP", default_value_t = 0)]
    pub animation_clip: usize,
}
