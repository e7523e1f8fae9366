//! The generation pipeline for one rendered character message.
//!
//! Context assembly, preset merging, role post-processing, the API call,
//! and response normalization, in that order. Every step's failure is
//! terminal for this attempt only.

use crate::api::CompletionsClient;
use crate::config::CyoaConfig;
use crate::context::build_context;
use crate::error::CyoaError;
use crate::macros::{MacroExpander, SnapshotExpander};
use crate::options::parse_options;
use crate::postprocess::apply_post_processing;
use crate::sanitize::TagSanitizer;
use crate::types::{ChatMessage, ChatRole, ChatSnapshot, OptionSet};
use chrono::Utc;
use tracing::{debug, warn};

/// Assemble the outbound message list for one generation: preset prompts
/// (macro-expanded) first, then the substituted system prompt, then the
/// composed context as the user turn, with the role policy applied last.
pub fn build_messages(config: &CyoaConfig, snapshot: &ChatSnapshot) -> Vec<ChatMessage> {
    let sanitizer = TagSanitizer::from_preserved_list(&config.preserved_tags);
    let composed = build_context(snapshot, config.context_length, &sanitizer);

    let system_prompt = config
        .system_prompt
        .replace("{n}", &config.number_of_options.to_string())
        .replace("{char}", &composed.character_name)
        .replace("{user}", &composed.user_name);

    let mut messages = Vec::new();

    if config.use_preset {
        if let Some(preset) = &config.uploaded_preset {
            let expander =
                SnapshotExpander::new(snapshot, &composed.character_name, &composed.user_name);
            for prompt in &preset.prompts {
                let content = match expander.expand(&prompt.content) {
                    Ok(expanded) => expanded,
                    Err(e) => {
                        warn!("Macro substitution failed, sending content as-is: {e}");
                        prompt.content.clone()
                    }
                };
                messages.push(ChatMessage {
                    role: prompt.role,
                    content,
                });
            }
        }
    }

    messages.push(ChatMessage {
        role: ChatRole::System,
        content: system_prompt,
    });
    messages.push(ChatMessage {
        role: ChatRole::User,
        content: composed.text,
    });

    apply_post_processing(messages, config.post_processing)
}

/// Run the full pipeline for one message and turn the response into an
/// option set.
pub async fn generate_options(
    config: &CyoaConfig,
    message_id: u64,
    snapshot: &ChatSnapshot,
) -> Result<OptionSet, CyoaError> {
    let messages = build_messages(config, snapshot);

    debug!(
        "Generating options for message {} ({} outbound messages)",
        message_id,
        messages.len()
    );

    let max_tokens = if config.max_tokens == 0 { 500 } else { config.max_tokens };
    let client = CompletionsClient::new(&config.api_endpoint, &config.api_key);
    let content = client.complete(&config.model, &messages, max_tokens).await?;

    let options = parse_options(&content)?;

    Ok(OptionSet {
        message_id,
        options,
        generated_at: Utc::now(),
    })
}
