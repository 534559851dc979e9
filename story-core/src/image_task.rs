//! Detached character-image generation.
//!
//! [`ImageTask::spawn`] hands back an [`ImageId`] straight away and leaves
//! the render-download-store work running on the tokio runtime. Nothing
//! rejoins the turn: failures are logged and the asset simply never shows
//! up, so clients poll [`ImageAssets::is_ready`] by id.

use crate::backend::{ByteStream, ImageBackend};
use crate::config::StoryConfig;
use crate::error::BackendError;
use crate::id::ImageId;
use crate::prompts;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

/// Where image assets live and how they are named.
#[derive(Debug, Clone)]
pub struct ImageAssets {
    dir: PathBuf,
    extension: String,
}

impl ImageAssets {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &StoryConfig) -> Self {
        Self::new(&config.assets_dir, &config.image_extension)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of the asset for `id`.
    pub fn path_for(&self, id: ImageId) -> PathBuf {
        self.dir.join(format!("{id}.{}", self.extension))
    }

    fn partial_path_for(&self, id: ImageId) -> PathBuf {
        self.dir.join(format!("{id}.{}.part", self.extension))
    }

    /// Whether the asset for `id` has been fully written.
    pub async fn is_ready(&self, id: ImageId) -> bool {
        fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }
}

/// Handle to a background job that nobody is required to wait on.
#[derive(Debug)]
pub struct DetachedTask {
    id: ImageId,
    handle: JoinHandle<()>,
}

impl DetachedTask {
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Let the task run unobserved and keep only its id.
    pub fn detach(self) -> ImageId {
        self.id
    }

    /// Wait for the task to finish, whatever its outcome.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!(image_id = %self.id, error = %e, "Image task did not run to completion");
        }
    }
}

#[derive(Debug, Error)]
enum ImageTaskError {
    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("image reply contained no images")]
    NoImage,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Schedules character portraits.
#[derive(Clone)]
pub struct ImageTask {
    backend: Arc<dyn ImageBackend>,
    assets: ImageAssets,
}

impl ImageTask {
    pub fn new(backend: Arc<dyn ImageBackend>, assets: ImageAssets) -> Self {
        Self { backend, assets }
    }

    pub fn assets(&self) -> &ImageAssets {
        &self.assets
    }

    /// Start rendering a portrait for `description`.
    ///
    /// Returns without touching the network or disk. Must be called from
    /// within a tokio runtime.
    pub fn spawn(&self, description: &str) -> DetachedTask {
        let id = ImageId::new();
        let prompt = prompts::image_prompt(description);
        let backend = Arc::clone(&self.backend);
        let assets = self.assets.clone();

        tracing::info!(image_id = %id, "Scheduling character image");

        let handle = tokio::spawn(async move {
            match render_and_store(backend.as_ref(), &assets, id, &prompt).await {
                Ok(path) => {
                    tracing::info!(image_id = %id, path = %path.display(), "Stored character image");
                }
                Err(e) => {
                    tracing::warn!(image_id = %id, error = %e, "Character image task failed");
                }
            }
        });

        DetachedTask { id, handle }
    }
}

async fn render_and_store(
    backend: &dyn ImageBackend,
    assets: &ImageAssets,
    id: ImageId,
    prompt: &str,
) -> Result<PathBuf, ImageTaskError> {
    let reply = backend.generate_image(prompt).await?;
    let url = reply.first_url().ok_or(ImageTaskError::NoImage)?;
    let mut stream = backend.fetch_asset(url).await?;

    fs::create_dir_all(assets.dir()).await?;

    // Write beside the final name so a failed download never looks like an asset.
    let partial = assets.partial_path_for(id);
    let target = assets.path_for(id);
    let written = match write_stream(&mut stream, &partial).await {
        Ok(()) => fs::rename(&partial, &target).await.map_err(ImageTaskError::from),
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }
    Ok(target)
}

async fn write_stream(stream: &mut ByteStream, path: &Path) -> Result<(), ImageTaskError> {
    let mut file = fs::File::create(path).await?;
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}
