//! Turn-based storytelling engine driven by a language model.
//!
//! This crate provides:
//! - Turn orchestration: context composition, model call, reply decoding
//! - Probabilistic character injection with a pluggable random source
//! - Detached character-portrait generation, polled by image id
//! - Storyline storage collaborators (in-memory and JSON file)
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use story_core::{MemoryStorage, StoryConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoryConfig::from_env();
//!     let session = StorySession::from_env(&config, Arc::new(MemoryStorage::new()))?;
//!
//!     session.start().await?;
//!     let reply = session.send("I push open the tavern door").await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod composer;
pub mod config;
pub mod error;
pub mod id;
pub mod image_task;
pub mod injector;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod random;
pub mod segment;
pub mod session;
pub mod storage;
pub mod testing;

// Primary public API
pub use backend::{ImageBackend, ModelBackend, ModelReply, OpenAiBackend};
pub use config::StoryConfig;
pub use error::{BackendError, StorageError, StoryError, StoryResult};
pub use id::{ImageId, SegmentId};
pub use image_task::{DetachedTask, ImageAssets, ImageTask};
pub use injector::CharacterInjector;
pub use orchestrator::StoryOrchestrator;
pub use random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
pub use segment::{RawUserMessage, Role, SegmentMeta, StorySegment};
pub use session::StorySession;
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
