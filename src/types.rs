//! Shared types used across the cyoa sidecar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// A single turn in the outbound completions request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Lenient parse for role strings coming from uploaded preset documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

// ---------------------------------------------------------------------------
// Host chat state
// ---------------------------------------------------------------------------

/// Card data for the character currently speaking. Fields the host has no
/// value for arrive as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterProfile {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub scenario: String,
}

/// The user-side persona, meaningful only when a description exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaProfile {
    pub name: String,
    pub description: String,
}

/// One message of conversation history as the host stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub is_user: bool,
    pub text: String,
}

/// Everything the host knows about the current chat, carried on the
/// triggering event so a generation needs no follow-up queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSnapshot {
    pub character: Option<CharacterProfile>,
    pub persona: Option<PersonaProfile>,
    pub history: Vec<ConversationTurn>,
    pub character_name: String,
    pub user_name: String,
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// A prompt fragment retained from an uploaded preset document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetPrompt {
    pub identifier: String,
    pub role: ChatRole,
    pub content: String,
}

/// A validated preset as stored in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPreset {
    pub name: String,
    pub prompts: Vec<PresetPrompt>,
}

// ---------------------------------------------------------------------------
// Role post-processing
// ---------------------------------------------------------------------------

/// Role rewriting policy for backends that restrict where `system`
/// messages may appear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostProcessingMode {
    #[default]
    None,
    SemiStrict,
    Strict,
}

impl fmt::Display for PostProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::SemiStrict => write!(f, "semi-strict"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

// ---------------------------------------------------------------------------
// Option sets
// ---------------------------------------------------------------------------

/// The options produced by one generation cycle. Ephemeral: the host
/// discards it on the next user message, swipe, or regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSet {
    pub message_id: u64,
    pub options: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Host protocol
// ---------------------------------------------------------------------------

/// Events the host pushes over the sidecar's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A character message finished rendering; generate options for it.
    CharacterMessageRendered {
        message_id: u64,
        snapshot: ChatSnapshot,
    },
    /// The user sent their own message; displayed options are stale.
    UserMessageRendered,
    /// The user swiped to a different message; displayed options are stale.
    MessageSwiped,
}

/// Outputs the sidecar writes to stdout, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum EngineOutput {
    /// A fresh option set to render beneath the message.
    Options {
        message_id: u64,
        options: Vec<String>,
        generated_at: DateTime<Utc>,
    },
    /// Generation failed; the host shows the error where options would be.
    GenerationFailed { message_id: u64, error: String },
    /// Remove any displayed option sets.
    ClearOptions,
}
