//! Decoding of structured story replies.

use crate::backend::ModelReply;
use crate::error::{StoryError, StoryResult};
use crate::segment::StorySegment;
use serde::{Deserialize, Serialize};

/// The shape the model is instructed to reply with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoryReply {
    pub story: String,
    #[serde(rename = "characterDescription")]
    pub character_description: String,
}

/// A decoded reply: the finalized segment plus the raw description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Segment with a fresh id, the reply's role and the story as content.
    pub segment: StorySegment,
    /// May be empty when no character appeared.
    pub character_description: String,
}

/// Decode a model reply into a story segment.
///
/// # Errors
///
/// - [`StoryError::Validation`] if the content is not text.
/// - [`StoryError::MalformedResponse`] if the text is not a JSON object with
///   exactly `story` and `characterDescription` string fields.
pub fn parse_story_reply(reply: &ModelReply) -> StoryResult<ParsedReply> {
    let text = reply.text()?;
    let decoded = decode_story(text)?;

    Ok(ParsedReply {
        segment: StorySegment::new(reply.role, decoded.story),
        character_description: decoded.character_description,
    })
}

fn decode_story(text: &str) -> StoryResult<StoryReply> {
    let malformed = |reason: String| {
        tracing::error!(error = %reason, response_length = text.len(), "Story reply did not decode");
        StoryError::MalformedResponse(reason)
    };

    // Derived struct decoding also accepts sequences; only objects count.
    let value: serde_json::Value =
        serde_json::from_str(strip_code_fence(text)).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// Models sometimes wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
