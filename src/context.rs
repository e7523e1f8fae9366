//! Conversation context assembler.
//!
//! Flattens the host's chat snapshot into the single text blob the model
//! sees: character card, user persona, then the recent conversation with
//! each line passed through the tag sanitizer.

use crate::sanitize::TagSanitizer;
use crate::types::ChatSnapshot;
use tracing::debug;

/// The composed context plus the display names resolved while building it,
/// kept for downstream `{char}`/`{user}` substitution.
#[derive(Debug, Clone)]
pub struct ComposedContext {
    pub text: String,
    pub character_name: String,
    pub user_name: String,
}

/// Compose the context text from a chat snapshot.
///
/// Sections appear in fixed order and are individually optional: the
/// character card when a character is selected, the user persona only when
/// a persona description exists, and the conversation itself. History lines
/// whose sanitized text is blank are skipped.
pub fn build_context(
    snapshot: &ChatSnapshot,
    context_length: usize,
    sanitizer: &TagSanitizer,
) -> ComposedContext {
    let character_name = non_empty_or(&snapshot.character_name, "Character");
    let user_name = non_empty_or(&snapshot.user_name, "User");
    let context_length = if context_length == 0 { 10 } else { context_length };

    let start = snapshot.history.len().saturating_sub(context_length);
    let recent = &snapshot.history[start..];

    let mut text = String::new();

    if let Some(character) = &snapshot.character {
        text.push_str("=== Character Card ===\n");
        text.push_str(&format!("Name: {}\n", character.name));
        if !character.description.is_empty() {
            text.push_str(&format!("Description: {}\n", character.description));
        }
        if !character.personality.is_empty() {
            text.push_str(&format!("Personality: {}\n", character.personality));
        }
        if !character.scenario.is_empty() {
            text.push_str(&format!("Scenario: {}\n", character.scenario));
        }
        text.push('\n');
    }

    if let Some(persona) = &snapshot.persona {
        if !persona.description.is_empty() {
            let persona_name = non_empty_or(&persona.name, &user_name);
            text.push_str("=== User Persona ===\n");
            text.push_str(&format!("Name: {}\n", persona_name));
            text.push_str(&format!("Description: {}\n\n", persona.description));
        }
    }

    text.push_str("=== Conversation ===\n");
    text.push_str(&format!("Character: {}\nUser: {}\n\n", character_name, user_name));

    for turn in recent {
        let speaker = if turn.is_user { &user_name } else { &character_name };
        let cleaned = sanitizer.clean(&turn.text);
        if cleaned.trim().is_empty() {
            continue;
        }
        text.push_str(&format!("{}: {}\n\n", speaker, cleaned));
    }

    debug!("Composed context: {} chars", text.len());

    ComposedContext {
        text,
        character_name,
        user_name,
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CharacterProfile, ConversationTurn, PersonaProfile};

    fn turn(is_user: bool, text: &str) -> ConversationTurn {
        ConversationTurn {
            is_user,
            text: text.to_string(),
        }
    }

    fn compose(snapshot: &ChatSnapshot) -> ComposedContext {
        build_context(snapshot, 10, &TagSanitizer::default())
    }

    #[test]
    fn card_skips_empty_fields() {
        let snapshot = ChatSnapshot {
            character: Some(CharacterProfile {
                name: "Mira".into(),
                description: "a wandering scholar".into(),
                ..Default::default()
            }),
            character_name: "Mira".into(),
            user_name: "Ana".into(),
            ..Default::default()
        };
        let composed = compose(&snapshot);
        assert!(composed.text.contains("=== Character Card ===\nName: Mira\n"));
        assert!(composed.text.contains("Description: a wandering scholar"));
        assert!(!composed.text.contains("Personality:"));
        assert!(!composed.text.contains("Scenario:"));
    }

    #[test]
    fn persona_section_omitted_without_description() {
        let snapshot = ChatSnapshot {
            persona: Some(PersonaProfile {
                name: "Ana".into(),
                description: String::new(),
            }),
            ..Default::default()
        };
        assert!(!compose(&snapshot).text.contains("=== User Persona ==="));

        let snapshot = ChatSnapshot {
            persona: Some(PersonaProfile {
                name: "Ana".into(),
                description: "a tired knight".into(),
            }),
            ..Default::default()
        };
        let composed = compose(&snapshot);
        assert!(composed.text.contains("=== User Persona ===\nName: Ana\nDescription: a tired knight\n\n"));
    }

    #[test]
    fn conversation_lines_use_resolved_speaker_names() {
        let snapshot = ChatSnapshot {
            history: vec![turn(false, "Hello."), turn(true, "Hi!")],
            character_name: "Mira".into(),
            user_name: "Ana".into(),
            ..Default::default()
        };
        let composed = compose(&snapshot);
        assert!(composed.text.contains("Character: Mira\nUser: Ana\n\n"));
        assert!(composed.text.contains("Mira: Hello.\n\n"));
        assert!(composed.text.contains("Ana: Hi!\n\n"));
    }

    #[test]
    fn blank_sanitized_lines_are_skipped() {
        let snapshot = ChatSnapshot {
            history: vec![turn(false, "<think>only hidden</think>"), turn(true, "Visible")],
            ..Default::default()
        };
        let composed = compose(&snapshot);
        assert!(!composed.text.contains("only hidden"));
        assert!(composed.text.contains("User: Visible"));
    }

    #[test]
    fn history_is_trimmed_to_context_length() {
        let history: Vec<ConversationTurn> =
            (0..20).map(|i| turn(false, &format!("line {i}"))).collect();
        let snapshot = ChatSnapshot {
            history,
            ..Default::default()
        };
        let composed = build_context(&snapshot, 5, &TagSanitizer::default());
        assert!(!composed.text.contains("line 14"));
        assert!(composed.text.contains("line 15"));
        assert!(composed.text.contains("line 19"));
    }

    #[test]
    fn names_fall_back_when_host_sends_none() {
        let composed = compose(&ChatSnapshot::default());
        assert_eq!(composed.character_name, "Character");
        assert_eq!(composed.user_name, "User");
    }
}
