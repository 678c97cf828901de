/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Solver settings stored as TOML in the config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Spacing constants used when laying out path groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// X coordinate of the first column (the main path when one is set)
    pub origin_x: f32,

    /// Y coordinate shared by the first node of every group
    pub origin_y: f32,

    /// Horizontal distance between group columns
    pub group_spacing: f32,

    /// Vertical distance between consecutive nodes of one group
    pub node_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 50.0,
            origin_y: 50.0,
            group_spacing: 300.0,
            node_spacing: 120.0,
        }
    }
}

/// Chat-completion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// OpenAI-compatible chat completions URL
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Request server-sent-event streaming instead of a single JSON body
    pub stream: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            stream: true,
        }
    }
}

/// Where persisted problem state lives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the default data directory when set
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured data directory, or `<config dir>/data`
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| super::config_dir().join("data"))
    }
}

/// Top-level solver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub layout: LayoutConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
}

impl SolverConfig {
    /// Load the config file, falling back to defaults if it is missing or invalid
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(_)) => Self::default(),
            Err(e) => {
                log::warn!("Ignoring invalid config at {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Load and parse a specific config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(format!("{e}")))
    }

    /// Save to the default config file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save to a specific path, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(format!("{e}")))?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(format!("{e}")))?;

        std::fs::write(path, toml_string).map_err(|e| ConfigError::Io(format!("{e}")))
    }

    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        super::config_dir().join("config.toml")
    }
}

/// Errors from reading or writing the config file
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
            ConfigError::Serialize(e) => write!(f, "Config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
