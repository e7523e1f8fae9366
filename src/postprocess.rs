//! Message role post-processing.
//!
//! Some chat-completions backends reject `system` messages outside the
//! first slot, or reject them entirely. The selected policy rewrites roles
//! just before the request goes out; order and content never change.

use crate::types::{ChatMessage, ChatRole, PostProcessingMode};

/// Apply the configured role policy to an assembled message list.
pub fn apply_post_processing(
    messages: Vec<ChatMessage>,
    mode: PostProcessingMode,
) -> Vec<ChatMessage> {
    if messages.is_empty() {
        return messages;
    }

    match mode {
        PostProcessingMode::None => messages,
        // Every system message becomes a user message.
        PostProcessingMode::SemiStrict => messages
            .into_iter()
            .map(|mut msg| {
                if msg.role == ChatRole::System {
                    msg.role = ChatRole::User;
                }
                msg
            })
            .collect(),
        // Only the first system message keeps its role.
        PostProcessingMode::Strict => {
            let mut seen_system = false;
            messages
                .into_iter()
                .map(|mut msg| {
                    if msg.role == ChatRole::System {
                        if seen_system {
                            msg.role = ChatRole::User;
                        }
                        seen_system = true;
                    }
                    msg
                })
                .collect()
        }
    }
}
