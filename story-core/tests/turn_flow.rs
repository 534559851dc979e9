//! End-to-end turn tests against scripted backends.
//!
//! Run with: `cargo test -p story-core --test turn_flow`

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use story_core::testing::{story_reply, MockBackend, MockImageBackend};
use story_core::{
    FixedRandom, ImageAssets, ImageId, MemoryStorage, ModelReply, RawUserMessage, Role,
    Storage, StoryConfig, StoryError, StoryOrchestrator, StorySegment,
};
use tempfile::TempDir;

/// Roll that never triggers a character injection at the default probability.
const NO_INJECTION: f64 = 0.95;

struct Harness {
    _dir: TempDir,
    storage: Arc<MemoryStorage>,
    model: Arc<MockBackend>,
    images: Arc<MockImageBackend>,
    orchestrator: StoryOrchestrator,
}

fn harness(model: MockBackend, images: MockImageBackend, roll: f64) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = StoryConfig::new().with_assets_dir(dir.path());
    let storage = Arc::new(MemoryStorage::new());
    let model = Arc::new(model);
    let images = Arc::new(images);

    let orchestrator = StoryOrchestrator::new(&config, storage.clone(), model.clone(), images.clone())
        .with_random_source(Arc::new(FixedRandom(roll)));

    Harness {
        _dir: dir,
        storage,
        model,
        images,
        orchestrator,
    }
}

async fn wait_until_ready(assets: &ImageAssets, id: ImageId) -> bool {
    for _ in 0..200 {
        if assets.is_ready(id).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

// =============================================================================
// Scenario 1: well-formed reply with a character
// =============================================================================

#[tokio::test]
async fn test_reply_with_character() {
    let h = harness(
        MockBackend::new()
            .with_story_reply(ModelReply::assistant(
                r#"{"story":"You enter a cave.","characterDescription":"a grizzled dwarf"}"#,
            ))
            .with_story_reply(story_reply("The dwarf grunts.", "a pale child")),
        MockImageBackend::new(),
        NO_INJECTION,
    );

    let first = h
        .orchestrator
        .progress_story(RawUserMessage::new("I enter the cave"))
        .await
        .unwrap();

    assert_eq!(first.content, "You enter a cave.");
    assert_eq!(first.role, Role::Assistant);
    assert!(first.id.is_some());
    let meta = first.meta.clone().unwrap();
    assert_eq!(meta.character_description.as_deref(), Some("a grizzled dwarf"));
    let first_image = meta.image_id.expect("image id should be assigned");

    let second = h
        .orchestrator
        .progress_story(RawUserMessage::new("I greet him"))
        .await
        .unwrap();
    let second_image = second.image_id().expect("image id should be assigned");
    assert_ne!(first_image, second_image);
    assert_ne!(first.id, second.id);

    assert!(wait_until_ready(h.orchestrator.image_assets(), first_image).await);
    assert!(wait_until_ready(h.orchestrator.image_assets(), second_image).await);
}

// =============================================================================
// Scenario 2: non-textual reply content
// =============================================================================

#[tokio::test]
async fn test_numeric_content_fails_progress() {
    let h = harness(
        MockBackend::new().with_story_reply(ModelReply::assistant(json!(42))),
        MockImageBackend::new(),
        NO_INJECTION,
    );

    let result = h
        .orchestrator
        .progress_story(RawUserMessage::new("I wait"))
        .await;
    assert!(matches!(result, Err(StoryError::Validation(_))));
}

#[tokio::test]
async fn test_numeric_content_fails_start() {
    let h = harness(
        MockBackend::new().with_story_reply(ModelReply::assistant(json!(42))),
        MockImageBackend::new(),
        NO_INJECTION,
    );
    let context = [
        h.orchestrator.build_game_instruction_message(),
        h.orchestrator.build_start_message(),
    ];

    let result = h.orchestrator.start_story(&context).await;
    assert!(matches!(result, Err(StoryError::Validation(_))));
}

#[tokio::test]
async fn test_prose_reply_is_malformed() {
    let h = harness(
        MockBackend::new().with_story_reply(ModelReply::assistant("You enter a cave.")),
        MockImageBackend::new(),
        NO_INJECTION,
    );

    let result = h
        .orchestrator
        .progress_story(RawUserMessage::new("I enter"))
        .await;
    assert!(matches!(result, Err(StoryError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_array_reply_is_malformed() {
    let h = harness(
        MockBackend::new().with_story_reply(ModelReply::assistant(
            r#"["You enter a cave.","a grizzled dwarf"]"#,
        )),
        MockImageBackend::new(),
        NO_INJECTION,
    );

    let result = h
        .orchestrator
        .progress_story(RawUserMessage::new("I enter"))
        .await;
    assert!(matches!(result, Err(StoryError::MalformedResponse(_))));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.images.prompts().is_empty());
}

// =============================================================================
// Scenario 3: empty character description
// =============================================================================

#[tokio::test]
async fn test_empty_description_schedules_nothing() {
    let h = harness(
        MockBackend::new().with_story_reply(story_reply("The wind howls.", "")),
        MockImageBackend::new(),
        NO_INJECTION,
    );

    let segment = h
        .orchestrator
        .progress_story(RawUserMessage::new("I listen"))
        .await
        .unwrap();

    let meta = segment.meta.unwrap();
    assert!(meta.image_id.is_none());
    assert!(meta.character_description.is_none());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.images.prompts().is_empty());
    assert_eq!(h.images.fetch_count(), 0);
}

// =============================================================================
// Scenario 4: injection roll misses
// =============================================================================

#[tokio::test]
async fn test_missed_roll_composes_no_introduction() {
    let h = harness(
        MockBackend::new().with_story_reply(story_reply("Quiet.", "")),
        MockImageBackend::new(),
        0.31,
    );
    let earlier = StorySegment::new(Role::Assistant, "Dusk falls.");
    h.storage.save_message(&earlier).await.unwrap();

    h.orchestrator
        .progress_story(RawUserMessage::new("I make camp"))
        .await
        .unwrap();

    let context = h.model.last_context().unwrap();
    assert_eq!(context.len(), 2);
    assert!(context.iter().all(|s| s.role != Role::Developer));
    assert_eq!(h.model.character_prompt_count(), 0);
}

#[tokio::test]
async fn test_hit_roll_composes_introduction() {
    let h = harness(
        MockBackend::new()
            .with_character_reply(ModelReply::assistant("a hooded ferryman"))
            .with_story_reply(story_reply("A boat approaches.", "a hooded ferryman")),
        MockImageBackend::new(),
        0.05,
    );

    h.orchestrator
        .progress_story(RawUserMessage::new("I wait at the river"))
        .await
        .unwrap();

    let context = h.model.last_context().unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].role, Role::Developer);
    assert!(context[0].content.contains("a hooded ferryman"));
    assert_eq!(context[1].role, Role::User);
    assert!(context[1].is_pending());
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_turns_do_not_touch_storyline() {
    let h = harness(
        MockBackend::new()
            .with_story_reply(story_reply("Opening.", "a bard"))
            .with_story_reply(story_reply("Next.", "")),
        MockImageBackend::new(),
        NO_INJECTION,
    );
    h.storage
        .save_message(&StorySegment::developer("start"))
        .await
        .unwrap();
    let before = h.storage.get_storyline().await.unwrap();

    h.orchestrator.start_story(&before).await.unwrap();
    h.orchestrator
        .progress_story(RawUserMessage::new("onward"))
        .await
        .unwrap();

    assert_eq!(h.storage.get_storyline().await.unwrap(), before);
    assert_eq!(h.orchestrator.get_full_story().await.unwrap(), before);
}

#[tokio::test]
async fn test_image_id_returned_before_image_exists() {
    let h = harness(
        MockBackend::new().with_story_reply(story_reply("A knight rides in.", "a silver knight")),
        MockImageBackend::new().gated(),
        NO_INJECTION,
    );

    let segment = h
        .orchestrator
        .progress_story(RawUserMessage::new("I look up"))
        .await
        .unwrap();
    let image_id = segment.image_id().unwrap();
    let assets = h.orchestrator.image_assets();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!assets.is_ready(image_id).await);

    h.images.open_gate();
    assert!(wait_until_ready(assets, image_id).await);
}

#[tokio::test]
async fn test_image_failure_does_not_affect_turn() {
    let h = harness(
        MockBackend::new().with_story_reply(story_reply("A witch cackles.", "a witch")),
        MockImageBackend::new().failing_generation(),
        NO_INJECTION,
    );

    let segment = h
        .orchestrator
        .progress_story(RawUserMessage::new("I duck"))
        .await
        .unwrap();
    let image_id = segment.image_id().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!h.orchestrator.image_assets().is_ready(image_id).await);
}
