//! Story segments: the unit of narrative exchange.

use crate::id::{ImageId, SegmentId};
use serde::{Deserialize, Serialize};

/// Who authored a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standing or one-off directive to the model.
    Developer,
    /// The player.
    User,
    /// The model's narration.
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Developer => "developer",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Image metadata attached to assistant segments.
///
/// `None` in either field is the "nothing here" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMeta {
    /// Id of the scheduled image task; poll the assets directory for it.
    pub image_id: Option<ImageId>,
    /// The description the image was requested for.
    pub character_description: Option<String>,
}

impl SegmentMeta {
    /// Metadata for a turn that introduced a character.
    ///
    /// An empty description means no image was scheduled, so both fields
    /// collapse to `None`.
    pub fn for_character(image_id: Option<ImageId>, description: &str) -> Self {
        if description.is_empty() {
            return Self::default();
        }
        Self {
            image_id,
            character_description: Some(description.to_string()),
        }
    }
}

/// One role-tagged unit of story or directive text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySegment {
    /// `None` while the segment is pending (not yet finalized).
    pub id: Option<SegmentId>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SegmentMeta>,
}

impl StorySegment {
    /// A segment with a freshly assigned id.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Some(SegmentId::new()),
            role,
            content: content.into(),
            meta: None,
        }
    }

    /// A segment whose id will be assigned later.
    pub fn pending(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            meta: None,
        }
    }

    pub fn developer(content: impl Into<String>) -> Self {
        Self::new(Role::Developer, content)
    }

    pub fn with_meta(mut self, meta: SegmentMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    /// Assign an id if the segment is still pending.
    ///
    /// Returns the segment's id; calling this again returns the same id.
    pub fn assign_id(&mut self) -> SegmentId {
        *self.id.get_or_insert_with(SegmentId::new)
    }

    /// The image id scheduled for this segment, if any.
    pub fn image_id(&self) -> Option<ImageId> {
        self.meta.as_ref().and_then(|m| m.image_id)
    }
}

/// Player input before it has been given an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUserMessage {
    pub content: String,
}

impl RawUserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl From<RawUserMessage> for StorySegment {
    fn from(raw: RawUserMessage) -> Self {
        StorySegment::pending(Role::User, raw.content)
    }
}
