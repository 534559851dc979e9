//! StorySession - the high-level API for playing a story.
//!
//! A session pairs a [`StoryOrchestrator`] with its storage and does the
//! persistence the orchestrator leaves to its caller.

use crate::backend::{ImageBackend, ModelBackend, OpenAiBackend};
use crate::config::StoryConfig;
use crate::error::{StoryError, StoryResult};
use crate::id::ImageId;
use crate::image_task::ImageAssets;
use crate::orchestrator::StoryOrchestrator;
use crate::random::RandomSource;
use crate::segment::{RawUserMessage, StorySegment};
use crate::storage::Storage;
use std::sync::Arc;

/// A playable story backed by a storage collaborator.
///
/// Turns are not serialized: two concurrent [`send`](Self::send) calls read
/// the same storyline and both append. Drive one session from one task.
pub struct StorySession {
    orchestrator: StoryOrchestrator,
    storage: Arc<dyn Storage>,
}

impl StorySession {
    pub fn new(
        config: &StoryConfig,
        storage: Arc<dyn Storage>,
        model: Arc<dyn ModelBackend>,
        images: Arc<dyn ImageBackend>,
    ) -> Self {
        Self {
            orchestrator: StoryOrchestrator::new(config, Arc::clone(&storage), model, images),
            storage,
        }
    }

    /// A session on the OpenAI client configured from the environment.
    pub fn from_env(config: &StoryConfig, storage: Arc<dyn Storage>) -> StoryResult<Self> {
        let client = openai::OpenAi::from_env().map_err(crate::error::BackendError::from)?;
        let backend = Arc::new(OpenAiBackend::new(client).with_config(config));
        Ok(Self::new(config, storage, backend.clone(), backend))
    }

    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.orchestrator = self.orchestrator.with_random_source(random);
        self
    }

    /// Begin a new story and persist its opening.
    ///
    /// Returns the full storyline after the opening has been saved.
    pub async fn start(&self) -> StoryResult<Vec<StorySegment>> {
        let instructions = self.orchestrator.build_game_instruction_message();
        let start = self.orchestrator.build_start_message();

        let opening = self
            .orchestrator
            .start_story(&[instructions.clone(), start.clone()])
            .await?;

        self.storage.save_game_instruction_message(&instructions).await?;
        self.storage.save_message(&start).await?;
        self.storage.save_message(&opening).await?;

        tracing::info!("Story started");
        self.story().await
    }

    /// Play one turn and persist both sides of it.
    pub async fn send(&self, text: &str) -> StoryResult<StorySegment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoryError::Validation("player input is empty".to_string()));
        }

        let raw = RawUserMessage::new(text);
        let reply = self.orchestrator.progress_story(raw.clone()).await?;

        let mut user_segment = StorySegment::from(raw);
        user_segment.assign_id();
        self.storage.save_message(&user_segment).await?;
        self.storage.save_message(&reply).await?;

        Ok(reply)
    }

    /// The persisted storyline.
    pub async fn story(&self) -> StoryResult<Vec<StorySegment>> {
        self.orchestrator.get_full_story().await
    }

    pub fn assets(&self) -> &ImageAssets {
        self.orchestrator.image_assets()
    }

    /// Whether the portrait for `id` is available yet.
    pub async fn image_ready(&self, id: ImageId) -> bool {
        self.assets().is_ready(id).await
    }
}
