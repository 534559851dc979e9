//! Assembles the context sent to the model for one turn.

use crate::segment::{RawUserMessage, StorySegment};

/// Build the ordered context for a turn.
///
/// The result is the storyline in order, then the character introduction if
/// one was drawn this turn, then the player's new (still pending) segment.
pub fn compose_context(
    storyline: &[StorySegment],
    introduction: Option<StorySegment>,
    user_message: RawUserMessage,
) -> Vec<StorySegment> {
    let mut context = Vec::with_capacity(storyline.len() + 2);
    context.extend_from_slice(storyline);
    context.extend(introduction);
    context.push(user_message.into());
    context
}
