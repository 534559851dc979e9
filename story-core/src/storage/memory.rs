use super::{Storage, Storyline};
use crate::error::StorageError;
use crate::id::SegmentId;
use crate::segment::StorySegment;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Storyline held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    storyline: RwLock<Storyline>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_storyline(&self) -> Result<Vec<StorySegment>, StorageError> {
        Ok(self.storyline.read().await.segments())
    }

    async fn save_message(&self, segment: &StorySegment) -> Result<(), StorageError> {
        self.storyline.write().await.append(segment)
    }

    async fn save_game_instruction_message(
        &self,
        segment: &StorySegment,
    ) -> Result<SegmentId, StorageError> {
        self.storyline.write().await.set_instructions(segment)
    }
}
