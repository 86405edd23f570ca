// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Plugin configuration.

use crate::error::PluginResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default manifest file name
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Environment variable holding plugin directories (platform path-list syntax)
pub const ENV_PLUGIN_DIRS: &str = "CONDUCTOR_PLUGIN_DIRS";

/// Environment variable overriding the manifest file name
pub const ENV_PLUGIN_MANIFEST: &str = "CONDUCTOR_PLUGIN_MANIFEST";

/// Plugin discovery configuration
///
/// # Example TOML Configuration
///
/// ```toml
/// directories = ["/opt/conductor/plugins", "./plugins"]
/// manifest_filename = "manifest.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directories whose immediate subdirectories are plugins
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    #[serde(default = "default_manifest_filename")]
    pub manifest_filename: String,
}

fn default_manifest_filename() -> String {
    MANIFEST_FILENAME.to_string()
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            manifest_filename: default_manifest_filename(),
        }
    }
}

impl PluginConfig {
    pub fn new(directories: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Create a configuration from a JSON string.
    pub fn from_json(json: &str) -> PluginResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Create a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> PluginResult<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Read `CONDUCTOR_PLUGIN_DIRS` and `CONDUCTOR_PLUGIN_MANIFEST`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dirs) = std::env::var_os(ENV_PLUGIN_DIRS) {
            config.directories = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        if let Ok(name) = std::env::var(ENV_PLUGIN_MANIFEST) {
            if !name.trim().is_empty() {
                config.manifest_filename = name;
            }
        }

        config
    }
}
