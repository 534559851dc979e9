//! Storyline persistence.
//!
//! The engine only ever reads the storyline; appending returned segments is
//! the caller's job. Implementations are append-only: a persisted segment is
//! never changed or removed. Nothing here serializes read-then-append across
//! concurrent turns; callers that run turns in parallel must do that
//! themselves.

mod file;
mod memory;

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;
use crate::id::SegmentId;
use crate::segment::StorySegment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The storage collaborator.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The game instructions (if saved) followed by every message in order.
    async fn get_storyline(&self) -> Result<Vec<StorySegment>, StorageError>;

    /// Append a finalized segment. Pending segments are rejected.
    async fn save_message(&self, segment: &StorySegment) -> Result<(), StorageError>;

    /// Store the standing instructions, assigning an id if needed.
    ///
    /// The instructions are saved once; a second save is rejected.
    async fn save_game_instruction_message(
        &self,
        segment: &StorySegment,
    ) -> Result<SegmentId, StorageError>;
}

/// In-memory shape shared by the storage implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storyline {
    pub game_instructions: Option<StorySegment>,
    pub messages: Vec<StorySegment>,
}

impl Storyline {
    /// Instructions first, then messages.
    pub fn segments(&self) -> Vec<StorySegment> {
        self.game_instructions
            .iter()
            .chain(self.messages.iter())
            .cloned()
            .collect()
    }

    fn append(&mut self, segment: &StorySegment) -> Result<(), StorageError> {
        if segment.is_pending() {
            return Err(StorageError::PendingId);
        }
        self.messages.push(segment.clone());
        Ok(())
    }

    fn set_instructions(&mut self, segment: &StorySegment) -> Result<SegmentId, StorageError> {
        if self.game_instructions.is_some() {
            return Err(StorageError::InstructionsAlreadySaved);
        }
        let mut segment = segment.clone();
        let id = segment.assign_id();
        self.game_instructions = Some(segment);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Role;

    #[test]
    fn test_instructions_lead_storyline() {
        let mut line = Storyline::default();
        line.append(&StorySegment::developer("start")).unwrap();
        let id = line
            .set_instructions(&StorySegment::pending(Role::Developer, "rules"))
            .unwrap();

        let segments = line.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, Some(id));
        assert_eq!(segments[0].content, "rules");
        assert_eq!(segments[1].content, "start");
    }

    #[test]
    fn test_pending_segment_rejected() {
        let mut line = Storyline::default();
        let result = line.append(&StorySegment::pending(Role::User, "hi"));
        assert!(matches!(result, Err(StorageError::PendingId)));
        assert!(line.messages.is_empty());
    }

    #[test]
    fn test_instructions_keep_existing_id() {
        let mut line = Storyline::default();
        let segment = StorySegment::developer("rules");
        let id = line.set_instructions(&segment).unwrap();
        assert_eq!(Some(id), segment.id);
    }

    #[test]
    fn test_second_instructions_rejected() {
        let mut line = Storyline::default();
        let first = line
            .set_instructions(&StorySegment::pending(Role::Developer, "rules v1"))
            .unwrap();

        let result = line.set_instructions(&StorySegment::pending(Role::Developer, "rules v2"));
        assert!(matches!(result, Err(StorageError::InstructionsAlreadySaved)));

        let segments = line.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].id, Some(first));
        assert_eq!(segments[0].content, "rules v1");
    }
}
