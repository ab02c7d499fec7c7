use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::session::DEFAULT_POLL_DURATION_SECS;
use crate::state::Visibility;

pub(crate) const CONFIG_FILE_NAME: &str = "compose_config.json";

// Mastodon's default status length.
const DEFAULT_MAX_CHARACTERS: u32 = 500;
const DEFAULT_MENTION_SUGGESTION_LIMIT: u32 = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ComposerConfig {
    pub(crate) max_characters: Option<u32>,
    pub(crate) default_visibility: Option<Visibility>,
    pub(crate) default_language: Option<String>,
    pub(crate) mention_suggestion_limit: Option<u32>,
    pub(crate) default_poll_duration_secs: Option<u32>,
}

impl ComposerConfig {
    pub(crate) fn max_characters(&self) -> u32 {
        self.max_characters
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_MAX_CHARACTERS)
    }

    pub(crate) fn default_visibility(&self) -> Visibility {
        self.default_visibility.unwrap_or_default()
    }

    pub(crate) fn default_language(&self) -> Option<String> {
        self.default_language
            .as_ref()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    }

    pub(crate) fn mention_suggestion_limit(&self) -> u32 {
        self.mention_suggestion_limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_MENTION_SUGGESTION_LIMIT)
    }

    pub(crate) fn default_poll_duration_secs(&self) -> u32 {
        self.default_poll_duration_secs
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_POLL_DURATION_SECS)
    }
}

fn read_config(path: &Path) -> anyhow::Result<ComposerConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

pub(crate) fn load_composer_config(data_dir: &str) -> ComposerConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    if !path.exists() {
        return ComposerConfig::default();
    }
    match read_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(err = %format!("{e:#}"), "composer config unreadable, using defaults");
            ComposerConfig::default()
        }
    }
}

pub(crate) fn default_config_json() -> String {
    let config = ComposerConfig {
        max_characters: Some(DEFAULT_MAX_CHARACTERS),
        default_visibility: Some(Visibility::Public),
        default_language: None,
        mention_suggestion_limit: Some(DEFAULT_MENTION_SUGGESTION_LIMIT),
        default_poll_duration_secs: Some(DEFAULT_POLL_DURATION_SECS),
    };
    serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string())
}
