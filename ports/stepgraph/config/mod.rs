/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Configuration for the solver core.

pub mod settings;

use std::path::PathBuf;

pub use settings::{ChatConfig, ConfigError, LayoutConfig, SolverConfig, StorageConfig};

/// Per-user config directory (`$XDG_CONFIG_HOME/stepgraph`,
/// `%APPDATA%\stepgraph`, ...), or `.stepgraph` when the platform has none
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|base| base.join("stepgraph"))
        .unwrap_or_else(|| PathBuf::from(".stepgraph"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_in_app_name() {
        assert!(config_dir().ends_with("stepgraph") || config_dir().ends_with(".stepgraph"));
    }
}
