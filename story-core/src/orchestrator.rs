//! The story orchestrator: one call per turn.
//!
//! The orchestrator composes context, asks the model for the next segment,
//! decodes it and schedules a portrait when a new character appears. It reads
//! the storyline but never writes it; persisting what it returns is the
//! caller's job.

use crate::backend::{ImageBackend, ModelBackend};
use crate::composer::compose_context;
use crate::config::StoryConfig;
use crate::error::{StoryError, StoryResult};
use crate::image_task::{ImageAssets, ImageTask};
use crate::injector::CharacterInjector;
use crate::parser::{parse_story_reply, ParsedReply};
use crate::prompts;
use crate::random::RandomSource;
use crate::segment::{RawUserMessage, Role, SegmentMeta, StorySegment};
use crate::storage::Storage;
use std::sync::Arc;

/// Coordinates a single story.
#[derive(Clone)]
pub struct StoryOrchestrator {
    storage: Arc<dyn Storage>,
    model: Arc<dyn ModelBackend>,
    images: ImageTask,
    injector: CharacterInjector,
}

impl StoryOrchestrator {
    pub fn new(
        config: &StoryConfig,
        storage: Arc<dyn Storage>,
        model: Arc<dyn ModelBackend>,
        images: Arc<dyn ImageBackend>,
    ) -> Self {
        Self {
            storage,
            model,
            images: ImageTask::new(images, ImageAssets::from_config(config)),
            injector: CharacterInjector::new(config.injection_probability),
        }
    }

    /// Drive character injection from a different random source.
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.injector = self.injector.with_random_source(random);
        self
    }

    pub fn image_assets(&self) -> &ImageAssets {
        self.images.assets()
    }

    /// The standing game instructions. Left pending: storage assigns its id.
    pub fn build_game_instruction_message(&self) -> StorySegment {
        StorySegment::pending(Role::Developer, prompts::GAME_INSTRUCTIONS)
    }

    /// The directive that opens the story.
    pub fn build_start_message(&self) -> StorySegment {
        StorySegment::developer(prompts::START)
    }

    /// Generate the opening segment from `context`.
    #[tracing::instrument(skip_all, fields(context_len = context.len()))]
    pub async fn start_story(&self, context: &[StorySegment]) -> StoryResult<StorySegment> {
        let reply = self.model.post_messages(context).await?;
        let parsed = parse_story_reply(&reply)?;

        if parsed.segment.content.is_empty() {
            return Err(StoryError::Validation(
                "opening story segment is empty".to_string(),
            ));
        }

        Ok(self.finalize(parsed))
    }

    /// Advance the story by one turn in response to the player.
    #[tracing::instrument(skip_all)]
    pub async fn progress_story(&self, user_message: RawUserMessage) -> StoryResult<StorySegment> {
        let storyline = self.storage.get_storyline().await?;
        let introduction = self.injector.maybe_introduce(self.model.as_ref()).await?;

        let context = compose_context(&storyline, introduction, user_message);
        tracing::debug!(context_len = context.len(), "Composed turn context");

        let reply = self.model.post_messages(&context).await?;
        let parsed = parse_story_reply(&reply)?;
        Ok(self.finalize(parsed))
    }

    /// The persisted storyline, unchanged.
    pub async fn get_full_story(&self) -> StoryResult<Vec<StorySegment>> {
        Ok(self.storage.get_storyline().await?)
    }

    fn finalize(&self, parsed: ParsedReply) -> StorySegment {
        let description = parsed.character_description;
        let image_id = if description.is_empty() {
            None
        } else {
            Some(self.images.spawn(&description).detach())
        };

        tracing::info!(
            segment_id = ?parsed.segment.id,
            image_id = ?image_id,
            "Story segment ready"
        );
        parsed
            .segment
            .with_meta(SegmentMeta::for_character(image_id, &description))
    }
}
