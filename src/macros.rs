//! `{{...}}` macro expansion for preset prompt content.
//!
//! Preset fragments are written against the host's macro language. The
//! sidecar expands the semantic macros it can resolve from the chat
//! snapshot and drops comment/formatting scaffolding; anything it does not
//! recognize is left in place for the model to ignore.

use crate::types::ChatSnapshot;
use anyhow::Result;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static MACRO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^}]*)\}\}").unwrap());

/// Expands `{{...}}` macros in prompt content.
///
/// Expansion runs at use time, once per generation. A failing expander is
/// not fatal: the caller logs the error and sends the content unexpanded.
pub trait MacroExpander {
    fn expand(&self, content: &str) -> Result<String>;
}

/// Expander backed by the chat snapshot carried on the triggering event.
pub struct SnapshotExpander<'a> {
    snapshot: &'a ChatSnapshot,
    character_name: &'a str,
    user_name: &'a str,
}

impl<'a> SnapshotExpander<'a> {
    pub fn new(snapshot: &'a ChatSnapshot, character_name: &'a str, user_name: &'a str) -> Self {
        Self {
            snapshot,
            character_name,
            user_name,
        }
    }

    fn resolve(&self, name: &str) -> Option<String> {
        let character = self.snapshot.character.as_ref();
        match name {
            "char" => Some(self.character_name.to_string()),
            "user" => Some(self.user_name.to_string()),
            "description" => Some(character.map(|c| c.description.clone()).unwrap_or_default()),
            "personality" => Some(character.map(|c| c.personality.clone()).unwrap_or_default()),
            "scenario" => Some(character.map(|c| c.scenario.clone()).unwrap_or_default()),
            "persona" => Some(
                self.snapshot
                    .persona
                    .as_ref()
                    .map(|p| p.description.clone())
                    .unwrap_or_default(),
            ),
            "trim" | "noop" => Some(String::new()),
            _ => None,
        }
    }
}

impl MacroExpander for SnapshotExpander<'_> {
    fn expand(&self, content: &str) -> Result<String> {
        let expanded = MACRO.replace_all(content, |caps: &Captures<'_>| {
            let body = caps[1].trim();
            if body.starts_with("//") {
                return String::new();
            }
            match self.resolve(&body.to_ascii_lowercase()) {
                Some(value) => value,
                None => caps[0].to_string(),
            }
        });
        Ok(expanded.into_owned())
    }
}
