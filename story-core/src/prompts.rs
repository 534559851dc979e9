//! Fixed prompt texts.

/// Standing instructions sent at the head of every context.
pub const GAME_INSTRUCTIONS: &str = include_str!("prompts/game_instructions.txt");

/// Directive that opens a new story.
pub const START: &str = include_str!("prompts/start.txt");

/// Asks the model for a new character description.
pub const NEW_CHARACTER: &str = include_str!("prompts/new_character.txt");

const IMAGE_PREFIX: &str = include_str!("prompts/image_prefix.txt");

/// Directive telling the model to bring a character in next turn.
pub fn character_introduction(description: &str) -> String {
    format!(
        "If the user's prompt is accepted and the story moves on, introduce a new character in the next story segment: {description}"
    )
}

/// Image-generation prompt for a character description.
pub fn image_prompt(description: &str) -> String {
    format!("{}: {description}", IMAGE_PREFIX.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions_name_both_fields() {
        assert!(GAME_INSTRUCTIONS.contains("\"story\""));
        assert!(GAME_INSTRUCTIONS.contains("\"characterDescription\""));
    }

    #[test]
    fn test_image_prompt() {
        let prompt = image_prompt("a grizzled dwarf");
        assert!(prompt.ends_with(": a grizzled dwarf"));
        assert!(!prompt.contains('\n'));
    }
}
