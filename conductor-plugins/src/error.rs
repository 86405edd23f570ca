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

//! Plugin error types

use crate::manifest::PluginKind;
use std::sync::Arc;
use thiserror::Error;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur in the plugin system
///
/// Cloneable so one failed load can be handed to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    // Lookup errors
    #[error("Plugin '{0}' not found; run plugin discovery before resolving it")]
    NotFound(String),

    /// No registered loader accepts the plugin's kind.
    #[error("{}", loader_unavailable(.name, .kind))]
    LoaderUnavailable { name: String, kind: PluginKind },

    // Manifest errors
    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Manifest parse error: {0}")]
    ManifestParseError(String),

    // Capability errors
    #[error("Unknown capability: '{0}'")]
    UnknownCapability(String),

    // Runtime errors
    #[error("Plugin load failed: {0}")]
    LoadFailed(String),

    #[error("Plugin '{plugin}' has no action '{action}'")]
    ActionNotFound { plugin: String, action: String },

    #[error("Plugin execution error: {0}")]
    ExecutionError(String),

    #[error("Invalid hook binding: {0}")]
    InvalidHookBinding(String),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[source] Arc<std::io::Error>),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

fn loader_unavailable(name: &str, kind: &PluginKind) -> String {
    match kind {
        PluginKind::Wasm => format!(
            "Cannot load WASM plugin '{name}': the optional WASM runtime is not installed. \
             Install the WASM runtime component to enable WASM plugins"
        ),
        other => format!("No loader available for plugin '{name}' of kind '{other}'"),
    }
}

impl PluginError {
    /// Whether this is the expected "optional WASM runtime missing" failure.
    pub fn is_wasm_runtime_missing(&self) -> bool {
        matches!(
            self,
            PluginError::LoaderUnavailable {
                kind: PluginKind::Wasm,
                ..
            }
        )
    }
}

impl From<std::io::Error> for PluginError {
    fn from(e: std::io::Error) -> Self {
        PluginError::IoError(Arc::new(e))
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(e: serde_json::Error) -> Self {
        PluginError::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for PluginError {
    fn from(e: toml::de::Error) -> Self {
        PluginError::SerializationError(e.to_string())
    }
}

impl From<semver::Error> for PluginError {
    fn from(e: semver::Error) -> Self {
        PluginError::InvalidManifest(format!("Invalid version: {}", e))
    }
}
