//! Configuration schema for cyoa.toml.

use crate::types::{PostProcessingMode, StoredPreset};
use serde::{Deserialize, Serialize};

/// Default option-generation prompt template. `{n}`, `{char}` and `{user}`
/// are substituted per generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a CYOA (Choose Your Own Adventure) option generator. Based on the conversation context provided, generate exactly {n} distinct action options that {user} could take next.

Each option should be:
- Written in first person from {user}'s perspective
- A short, actionable choice (1-2 sentences max)
- Distinct from other options (offer variety: cautious, bold, curious, etc.)

Respond ONLY with a JSON array of strings, nothing else. Example format:
[\"I approach the stranger carefully.\", \"I draw my weapon and demand answers.\", \"I hide and observe from a distance.\"]";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CyoaConfig {
    /// Master switch; generation is skipped entirely when false.
    pub enabled: bool,

    /// Base URL of the OpenAI-compatible API.
    pub api_endpoint: String,

    /// Bearer token for the API.
    pub api_key: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// How many options the model is asked to produce.
    pub number_of_options: u32,

    /// How many recent conversation turns go into the context.
    pub context_length: usize,

    /// Completion token cap per request.
    pub max_tokens: u32,

    /// Whether stored preset prompts are injected ahead of the system turn.
    pub use_preset: bool,

    /// Role rewriting policy for strict backends.
    pub post_processing: PostProcessingMode,

    /// Comma/whitespace separated tag names the sanitizer keeps.
    pub preserved_tags: String,

    /// Option-generation prompt template.
    pub system_prompt: String,

    /// Preset stored by `load-preset`, if any. Kept last so the TOML
    /// serializer emits plain values before this table.
    pub uploaded_preset: Option<StoredPreset>,
}

impl Default for CyoaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_endpoint: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            number_of_options: 3,
            context_length: 10,
            max_tokens: 500,
            use_preset: false,
            post_processing: PostProcessingMode::None,
            preserved_tags: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            uploaded_preset: None,
        }
    }
}

impl CyoaConfig {
    /// Whether the remote API is usable with the current values.
    pub fn api_configured(&self) -> bool {
        !self.api_endpoint.is_empty() && !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_settings_surface() {
        let config = CyoaConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.number_of_options, 3);
        assert_eq!(config.context_length, 10);
        assert_eq!(config.max_tokens, 500);
        assert!(!config.use_preset);
        assert_eq!(config.post_processing, PostProcessingMode::None);
        assert!(config.preserved_tags.is_empty());
        assert!(config.system_prompt.contains("{n}"));
        assert!(config.system_prompt.contains("{user}"));
        assert!(config.uploaded_preset.is_none());
    }

    #[test]
    fn api_configured_needs_both_endpoint_and_key() {
        let mut config = CyoaConfig::default();
        assert!(!config.api_configured());
        config.api_endpoint = "https://api.example.com".into();
        assert!(!config.api_configured());
        config.api_key = "sk-test".into();
        assert!(config.api_configured());
    }
}
