//! Model and image backend boundary.
//!
//! The engine talks to its language model through [`ModelBackend`] and to
//! its image generator through [`ImageBackend`]. Replies cross this boundary
//! in a small, explicit shape; validating that shape is the engine's job.

mod client;

pub use client::OpenAiBackend;

use crate::error::{BackendError, StoryError, StoryResult};
use crate::segment::{Role, StorySegment};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A stream of downloaded asset bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, BackendError>> + Send>>;

/// Language-model backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send the composed context for a turn.
    async fn post_messages(&self, messages: &[StorySegment]) -> Result<ModelReply, BackendError>;

    /// Ask for a new character description.
    async fn post_character_prompt(&self, prompt: &str) -> Result<ModelReply, BackendError>;
}

/// Image-generation backend.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Request an image for `prompt`.
    async fn generate_image(&self, prompt: &str) -> Result<ImageReply, BackendError>;

    /// Open a byte stream over a generated image.
    async fn fetch_asset(&self, url: &str) -> Result<ByteStream, BackendError>;
}

/// A model reply as received, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub role: Role,
    /// Raw content; only a JSON string counts as text.
    pub content: serde_json::Value,
}

impl ModelReply {
    /// An assistant reply with arbitrary content.
    pub fn assistant(content: impl Into<serde_json::Value>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// The reply's text, or a validation error if the content is not a string.
    pub fn text(&self) -> StoryResult<&str> {
        self.content.as_str().ok_or_else(|| {
            StoryError::Validation(format!(
                "expected textual reply content, got {}",
                json_kind(&self.content)
            ))
        })
    }
}

/// Reply from the image backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReply {
    pub data: Vec<ImageDescriptor>,
}

impl ImageReply {
    /// The first image's retrieval URL.
    pub fn first_url(&self) -> Option<&str> {
        self.data.first().map(|d| d.url.as_str())
    }
}

/// One generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub url: String,
}

impl ImageDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
