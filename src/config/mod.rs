pub mod schema;

pub use schema::CyoaConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default sidecar home directory (~/.cyoa).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".cyoa"))
        .unwrap_or_else(|| PathBuf::from(".cyoa"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<CyoaConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path).context("Failed to read cyoa config file")?;
        let config: CyoaConfig =
            toml::from_str(&contents).context("Failed to parse cyoa config (TOML)")?;
        Ok(config)
    } else {
        Ok(CyoaConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &CyoaConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatRole, PresetPrompt, StoredPreset};

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("cyoa.toml")).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyoa.toml");

        let mut config = CyoaConfig::default();
        config.enabled = true;
        config.api_endpoint = "https://api.example.com".into();
        config.preserved_tags = "think, quote".into();
        config.uploaded_preset = Some(StoredPreset {
            name: "adventure".into(),
            prompts: vec![PresetPrompt {
                identifier: "main".into(),
                role: ChatRole::System,
                content: "Stay in character.".into(),
            }],
        });

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert!(loaded.enabled);
        assert_eq!(loaded.api_endpoint, "https://api.example.com");
        assert_eq!(loaded.preserved_tags, "think, quote");
        let preset = loaded.uploaded_preset.unwrap();
        assert_eq!(preset.name, "adventure");
        assert_eq!(preset.prompts.len(), 1);
        assert_eq!(preset.prompts[0].role, ChatRole::System);
    }
}
