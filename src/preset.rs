//! Preset document parsing and filtering.
//!
//! A preset is an externally produced JSON document carrying a flat
//! `prompts` list plus per-character `prompt_order` lists. Only the order
//! list keyed by the custom-template sentinel id matters here; its enabled
//! entries are resolved against the prompt map and filtered down to
//! fragments that carry real content.

use crate::error::CyoaError;
use crate::types::{ChatRole, PresetPrompt, StoredPreset};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::info;

/// `character_id` of the order list representing the custom template
/// arrangement.
pub const CUSTOM_ORDER_SENTINEL: i64 = 100_001;

static COMMENT_MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{//[^}]*\}\}").unwrap());
static TRIM_NOOP_MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{(?:trim|noop)\}\}").unwrap());
static ANY_MACRO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").unwrap());
static CONTENT_MACRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{(char|user|persona|scenario|personality|description|system|original|input|message)\}\}")
        .unwrap()
});

#[derive(Debug, Deserialize)]
struct PresetDocument {
    #[serde(default)]
    prompts: Option<Vec<RawPrompt>>,
    #[serde(default)]
    prompt_order: Option<Vec<RawOrderGroup>>,
}

#[derive(Debug, Deserialize)]
struct RawPrompt {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    marker: bool,
}

#[derive(Debug, Deserialize)]
struct RawOrderGroup {
    // Other tools key order lists by character name as well, so this is not
    // always a number.
    #[serde(default)]
    character_id: serde_json::Value,
    #[serde(default)]
    order: Option<Vec<RawOrderEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawOrderEntry {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    enabled: bool,
}

/// Parse and validate an uploaded preset document.
///
/// Document-shape problems (no `prompts` array, no `prompt_order` array, no
/// sentinel order entry) fail the upload with a `Format` error. Individual
/// entries are handled leniently: a marker, an empty or macro-only content,
/// or an unknown role just drops that entry.
pub fn parse_preset(name: &str, raw: &str) -> Result<StoredPreset, CyoaError> {
    let doc: PresetDocument = serde_json::from_str(raw)
        .map_err(|e| CyoaError::Format(format!("not a valid preset document: {e}")))?;

    let prompts = doc
        .prompts
        .ok_or_else(|| CyoaError::Format("missing prompts array".into()))?;
    let order_groups = doc
        .prompt_order
        .ok_or_else(|| CyoaError::Format("missing prompt_order array".into()))?;

    // Last declared prompt with a given identifier wins.
    let mut by_identifier: HashMap<&str, &RawPrompt> = HashMap::new();
    for prompt in &prompts {
        if let Some(identifier) = prompt.identifier.as_deref() {
            by_identifier.insert(identifier, prompt);
        }
    }

    let custom_order = order_groups
        .iter()
        .find(|group| group.character_id.as_i64() == Some(CUSTOM_ORDER_SENTINEL))
        .and_then(|group| group.order.as_deref())
        .ok_or_else(|| CyoaError::Format("missing custom prompt order".into()))?;

    let mut selected = Vec::new();
    for entry in custom_order {
        if !entry.enabled {
            continue;
        }
        let Some(identifier) = entry.identifier.as_deref() else {
            continue;
        };
        let Some(prompt) = by_identifier.get(identifier) else {
            continue;
        };
        if prompt.marker {
            continue;
        }
        let Some(content) = prompt.content.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        let Some(role) = prompt.role.as_deref().and_then(ChatRole::parse) else {
            continue;
        };
        if !has_actual_content(content) {
            continue;
        }
        selected.push(PresetPrompt {
            identifier: identifier.to_string(),
            role,
            content: content.to_string(),
        });
    }

    info!("Parsed preset '{}': {} prompts retained", name, selected.len());

    Ok(StoredPreset {
        name: name.to_string(),
        prompts: selected,
    })
}

/// Judge whether prompt content is more than macro scaffolding.
///
/// Comment, `{{trim}}` and `{{noop}}` macros are stripped first; what
/// remains counts as real if there is text outside `{{...}}` placeholders,
/// or if one of the semantic content macros appears.
pub fn has_actual_content(content: &str) -> bool {
    let cleaned = COMMENT_MACRO.replace_all(content, "");
    let cleaned = TRIM_NOOP_MACRO.replace_all(&cleaned, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return false;
    }

    let has_text_outside_macros = !ANY_MACRO.replace_all(cleaned, "").trim().is_empty();
    has_text_outside_macros || CONTENT_MACRO.is_match(cleaned)
}
