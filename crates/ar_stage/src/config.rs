use std::path::PathBuf;

/// Host-provided settings for a [`crate::StageRuntime`].
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Location of the model asset (binary glTF in the reference host).
    pub asset_path: PathBuf,
    /// Animation clip driven by the tick timestamps.
    ///
    /// An index past the asset's clip list behaves like an asset without
    /// animation tracks.
    pub animation_clip: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from("assets/model.glb"),
            animation_clip: 0,
        }
    }
}
