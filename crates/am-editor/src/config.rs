//! Editor session settings.

use serde::Deserialize;

/// Settings for a `ModelSession`.
///
/// Loaded from JSON; every field is optional and falls back to the
/// default below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Commands kept in undo history. `None` keeps everything. Default: **None**.
    pub max_undo_depth: Option<usize>,

    /// How many times the session drains deferred commands after one
    /// execute before giving up on observers that keep scheduling more.
    /// Must be at least 1. Default: **8**.
    pub max_deferred_rounds: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: None,
            max_deferred_rounds: 8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid editor config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("max_deferred_rounds must be at least 1")]
    NoDeferredRounds,
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_deferred_rounds == 0 {
            return Err(ConfigError::NoDeferredRounds);
        }
        Ok(())
    }
}
