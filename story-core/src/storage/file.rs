use super::{Storage, Storyline};
use crate::error::StorageError;
use crate::id::SegmentId;
use crate::segment::StorySegment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// On-disk layout of a storyline file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedStoryline {
    version: u32,
    /// Unix seconds of the last write.
    saved_at: String,
    #[serde(flatten)]
    storyline: Storyline,
}

/// Storyline persisted to a JSON file.
///
/// The whole file is rewritten on every save. Saves through one instance are
/// serialized; two instances on the same path will overwrite each other.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    storyline: Mutex<Storyline>,
}

impl JsonFileStorage {
    /// Open `path`, loading it if it exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let storyline = if fs::try_exists(&path).await? {
            load(&path).await?
        } else {
            Storyline::default()
        };

        tracing::debug!(path = %path.display(), segments = storyline.messages.len(), "Opened storyline file");
        Ok(Self {
            path,
            storyline: Mutex::new(storyline),
        })
    }

    /// Apply `change` to a copy, write it, then keep it.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut Storyline) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut current = self.storyline.lock().await;
        let mut next = current.clone();
        let out = change(&mut next)?;
        save(&self.path, &next).await?;
        *current = next;
        Ok(out)
    }
}

async fn load(path: &Path) -> Result<Storyline, StorageError> {
    let content = fs::read_to_string(path).await?;
    let saved: SavedStoryline = serde_json::from_str(&content)?;

    if saved.version != SAVE_VERSION {
        return Err(StorageError::VersionMismatch {
            expected: SAVE_VERSION,
            found: saved.version,
        });
    }

    Ok(saved.storyline)
}

async fn save(path: &Path, storyline: &Storyline) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let saved = SavedStoryline {
        version: SAVE_VERSION,
        saved_at: unix_now(),
        storyline: storyline.clone(),
    };
    let content = serde_json::to_string_pretty(&saved)?;
    fs::write(path, content).await?;
    Ok(())
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn get_storyline(&self) -> Result<Vec<StorySegment>, StorageError> {
        Ok(self.storyline.lock().await.segments())
    }

    async fn save_message(&self, segment: &StorySegment) -> Result<(), StorageError> {
        self.commit(|line| line.append(segment)).await
    }

    async fn save_game_instruction_message(
        &self,
        segment: &StorySegment,
    ) -> Result<SegmentId, StorageError> {
        self.commit(|line| line.set_instructions(segment)).await
    }
}
