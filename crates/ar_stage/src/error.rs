//! Error type shared by every stage component.

use std::path::PathBuf;

/// Failures that can escape the stage.
///
/// Only asset loading is allowed to fail; everything that happens on the tick
/// path is absorbed locally and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to read asset {path}: {source}")]
    AssetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed asset: {0}")]
    AssetDecode(String),

    #[error("failed to upload asset resources: {0}")]
    ResourceUpload(String),

    #[error("asset worker did not complete: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("stage task `{task}` failed: {reason}")]
    Task { task: &'static str, reason: String },
}
