use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus collectors for the headless stage host.
///
/// Shared through an `Arc` between the render backends and the main loop.
pub struct SimMetrics {
    pub registry: Registry,
    /// Ticks emitted by the synthetic feed.
    pub ticks_total: IntCounter,
    /// Plane passes that reached the renderer.
    pub plane_passes_total: IntCounter,
    /// Plane passes whose textured range covered no triangles.
    pub plane_passes_blank_total: IntCounter,
    /// Ticks with no active planes, as counted by the stage.
    pub plane_passes_skipped: IntGauge,
    /// Passes that ran out of plane buffer space, as counted by the stage.
    pub plane_passes_truncated: IntGauge,
    /// Vertices in the last uploaded plane mesh.
    pub plane_vertices: IntGauge,
    /// Indices in the last uploaded plane mesh.
    pub plane_indices: IntGauge,
    /// World transforms pushed for the model.
    pub world_transforms_total: IntCounter,
    /// Ticks replaced before a consumer picked them up.
    pub ticks_coalesced: IntGauge,
    /// Gestures replaced before the controller picked them up.
    pub gestures_coalesced: IntGauge,
}

impl SimMetrics {
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("ar_stage_sim".into()), None)
            .expect("Failed to create custom metrics registry");

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry
                    .register(Box::new(collector.clone()))
                    .expect("Failed to register metric");
                collector
            }};
        }

        Self {
            ticks_total: reg!(IntCounter::new(
                "ticks_total",
                "Total tracking ticks emitted by the feed"
            )
            .unwrap()),
            plane_passes_total: reg!(IntCounter::new(
                "plane_passes_total",
                "Plane mesh passes uploaded to the renderer"
            )
            .unwrap()),
            plane_passes_blank_total: reg!(IntCounter::new(
                "plane_passes_blank_total",
                "Plane mesh passes that uploaded no triangles"
            )
            .unwrap()),
            plane_passes_skipped: reg!(IntGauge::new(
                "plane_passes_skipped",
                "Ticks that left the previous plane mesh in place"
            )
            .unwrap()),
            plane_passes_truncated: reg!(IntGauge::new(
                "plane_passes_truncated",
                "Plane passes truncated at buffer capacity"
            )
            .unwrap()),
            plane_vertices: reg!(IntGauge::new(
                "plane_vertices",
                "Vertices in the last uploaded plane mesh"
            )
            .unwrap()),
            plane_indices: reg!(IntGauge::new(
                "plane_indices",
                "Indices in the last uploaded plane mesh"
            )
            .unwrap()),
            world_transforms_total: reg!(IntCounter::new(
                "world_transforms_total",
                "World transforms pushed for the placed model"
            )
            .unwrap()),
            ticks_coalesced: reg!(IntGauge::new(
                "ticks_coalesced",
                "Ticks dropped because a newer tick replaced them"
            )
            .unwrap()),
            gestures_coalesced: reg!(IntGauge::new(
                "gestures_coalesced",
                "Gestures dropped because a newer gesture replaced them"
            )
            .unwrap()),
            registry,
        }
    }

    /// Serves the registry on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    TextEncoder::new()
                        .encode(&metric_families, &mut buffer)
                        .expect("Failed to encode metrics");
                    String::from_utf8(buffer)
                        .expect("Metrics buffer is not valid UTF-8")
                        .into_response()
                }
            }),
        )
    }

    pub fn update_stage_stats(&self, stats: ar_stage::StageStats) {
        self.ticks_coalesced
            .set((stats.plane_ticks_coalesced + stats.drive_ticks_coalesced) as i64);
        self.gestures_coalesced.set(stats.gestures_coalesced as i64);
        self.plane_passes_skipped.set(stats.plane_passes_skipped as i64);
        self.plane_passes_truncated.set(stats.plane_passes_truncated as i64);
    }
}
