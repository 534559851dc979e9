//! Testing utilities for the story engine.
//!
//! This module provides tools for deterministic tests without API calls:
//! - `MockBackend` returns scripted model replies and records what it was sent
//! - `MockImageBackend` serves scripted images, optionally held behind a gate
//! - `story_reply` builds a well-formed structured reply

use crate::backend::{ByteStream, ImageBackend, ImageDescriptor, ImageReply, ModelBackend, ModelReply};
use crate::error::BackendError;
use crate::segment::StorySegment;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A reply whose content is the JSON-encoded story shape.
pub fn story_reply(story: &str, character_description: &str) -> ModelReply {
    ModelReply::assistant(
        serde_json::json!({
            "story": story,
            "characterDescription": character_description,
        })
        .to_string(),
    )
}

/// A model backend that returns scripted replies in order.
///
/// Running out of scripted replies is reported as an unavailable backend.
#[derive(Default)]
pub struct MockBackend {
    story_replies: Mutex<VecDeque<ModelReply>>,
    character_replies: Mutex<VecDeque<ModelReply>>,
    contexts: Mutex<Vec<Vec<StorySegment>>>,
    character_prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next story request.
    pub fn with_story_reply(self, reply: ModelReply) -> Self {
        self.queue_story_reply(reply);
        self
    }

    /// Queue a reply for the next character prompt.
    pub fn with_character_reply(self, reply: ModelReply) -> Self {
        lock(&self.character_replies).push_back(reply);
        self
    }

    pub fn queue_story_reply(&self, reply: ModelReply) {
        lock(&self.story_replies).push_back(reply);
    }

    /// Every context posted so far, in order.
    pub fn contexts(&self) -> Vec<Vec<StorySegment>> {
        lock(&self.contexts).clone()
    }

    /// The most recently posted context.
    pub fn last_context(&self) -> Option<Vec<StorySegment>> {
        lock(&self.contexts).last().cloned()
    }

    pub fn character_prompt_count(&self) -> usize {
        lock(&self.character_prompts).len()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn post_messages(&self, messages: &[StorySegment]) -> Result<ModelReply, BackendError> {
        lock(&self.contexts).push(messages.to_vec());
        lock(&self.story_replies)
            .pop_front()
            .ok_or_else(|| BackendError::Unavailable("no scripted story reply".to_string()))
    }

    async fn post_character_prompt(&self, prompt: &str) -> Result<ModelReply, BackendError> {
        lock(&self.character_prompts).push(prompt.to_string());
        lock(&self.character_replies)
            .pop_front()
            .ok_or_else(|| BackendError::Unavailable("no scripted character reply".to_string()))
    }
}

/// An image backend serving one scripted image.
pub struct MockImageBackend {
    reply: ImageReply,
    chunks: Vec<Vec<u8>>,
    fail_after: Option<usize>,
    fail_generation: bool,
    gate: Option<Semaphore>,
    prompts: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

impl Default for MockImageBackend {
    fn default() -> Self {
        Self {
            reply: ImageReply {
                data: vec![ImageDescriptor::new("https://images.test/portrait.png")],
            },
            chunks: vec![b"\x89PNG".to_vec()],
            fail_after: None,
            fail_generation: false,
            gate: None,
            prompts: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl MockImageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body chunks served by the download stream.
    pub fn with_chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Reply with an empty image list.
    pub fn without_images(mut self) -> Self {
        self.reply = ImageReply::default();
        self
    }

    /// Fail every generation request.
    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    /// Break the download stream after `chunks` chunks.
    pub fn failing_download_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    /// Hold every generation request until [`open_gate`](Self::open_gate).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let held and future generation requests through.
    pub fn open_gate(&self) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(1024);
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    async fn generate_image(&self, prompt: &str) -> Result<ImageReply, BackendError> {
        lock(&self.prompts).push(prompt.to_string());

        if let Some(ref gate) = self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            permit.forget();
        }

        if self.fail_generation {
            return Err(BackendError::Unavailable("image generation failed".to_string()));
        }
        Ok(self.reply.clone())
    }

    async fn fetch_asset(&self, _url: &str) -> Result<ByteStream, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut items: Vec<Result<Vec<u8>, BackendError>> = self.chunks.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(BackendError::Unavailable("connection reset".to_string())));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
