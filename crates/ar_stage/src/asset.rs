//! One-shot model loading off the tick path.

use crate::error::StageError;
use crate::render::EntityId;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: Option<String>,
    pub duration_secs: f32,
}

/// A decoded model, ready to be placed in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetHandle {
    /// Entity that receives the world transform.
    pub root: EntityId,
    /// Every renderable entity of the model.
    pub entities: Vec<EntityId>,
    pub clips: Vec<AnimationClip>,
}

impl AssetHandle {
    pub fn clip(&self, index: usize) -> Option<&AnimationClip> {
        self.clips.get(index)
    }
}

/// Turns raw asset bytes into renderer resources.
pub trait AssetDecoder: Send + Sync + 'static {
    /// Parses the asset and creates its entities.
    fn decode(&self, bytes: &[u8]) -> Result<AssetHandle, StageError>;

    /// Uploads textures and buffers of a decoded asset.
    fn upload_resources(&self, asset: &AssetHandle) -> Result<(), StageError>;
}

pub struct AssetLoader {
    path: PathBuf,
    decoder: Arc<dyn AssetDecoder>,
}

impl AssetLoader {
    pub fn new(path: impl Into<PathBuf>, decoder: Arc<dyn AssetDecoder>) -> Self {
        Self {
            path: path.into(),
            decoder,
        }
    }

    /// Reads and decodes the asset on the blocking worker, then uploads its
    /// resources. Any failure is fatal to the stage: there is no fallback
    /// model.
    pub async fn load(&self) -> Result<AssetHandle, StageError> {
        let started = Instant::now();
        let path = self.path.clone();
        let decoder = self.decoder.clone();

        let asset = tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path).map_err(|source| StageError::AssetIo {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "Asset bytes read");
            decoder.decode(&bytes)
        })
        .await??;

        self.decoder.upload_resources(&asset)?;

        tracing::info!(
            path = %self.path.display(),
            entities = asset.entities.len(),
            clips = asset.clips.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Asset ready"
        );
        Ok(asset)
    }
}
