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

//! Plugin manifest schema and parser
//!
//! Defines the structure of the `manifest.json` file found in every plugin
//! directory:
//!
//! ```json
//! {
//!     "name": "git-tools",
//!     "version": "1.2.0",
//!     "type": "native",
//!     "description": "Git helpers",
//!     "entry": "git_tools",
//!     "trust": "verified",
//!     "capabilities": { "required": ["git", "fs-read"], "optional": ["network"] },
//!     "exports": {
//!         "actions": [{ "name": "status", "description": "Working tree status" }],
//!         "hooks": [{ "event": "workflow:*:*:before", "function": "audit" }]
//!     }
//! }
//! ```

use crate::capabilities::CapabilitySet;
use crate::error::{PluginError, PluginResult};
use conductor_hooks::EventPattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// How a plugin is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// In-process plugin built by a registered factory
    Native,
    /// Sandboxed WebAssembly module
    Wasm,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Native => write!(f, "native"),
            PluginKind::Wasm => write!(f, "wasm"),
        }
    }
}

/// Plugin manifest - the declarative description of a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name, unique case-insensitively
    pub name: String,

    /// Plugin version (semver)
    pub version: String,

    #[serde(rename = "type")]
    pub kind: PluginKind,

    #[serde(default)]
    pub description: String,

    /// Loader-specific entry point (factory name, module path)
    #[serde(default)]
    pub entry: String,

    /// Free-form trust label
    #[serde(default)]
    pub trust: Option<String>,

    #[serde(default)]
    pub capabilities: CapabilityDeclaration,

    #[serde(default)]
    pub exports: PluginExports,
}

/// Capability tokens as written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDeclaration {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

/// Actions and hook bindings a plugin offers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginExports {
    #[serde(default)]
    pub actions: Vec<ActionExport>,
    #[serde(default)]
    pub hooks: Vec<HookExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExport {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the action parameters
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// Binds a plugin action to hook events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookExport {
    /// Event pattern, `domain:component:action:timing`
    pub event: String,
    /// Action invoked when the hook fires
    pub function: String,
}

impl PluginManifest {
    /// Load manifest from a file
    pub fn from_file(path: &Path) -> PluginResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PluginError::ManifestNotFound(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Load manifest `filename` from a plugin directory
    pub fn from_directory(dir: &Path, filename: &str) -> PluginResult<Self> {
        Self::from_file(&dir.join(filename))
    }

    /// Parse and validate manifest JSON
    pub fn from_json(content: &str) -> PluginResult<Self> {
        let manifest: Self = serde_json::from_str(content)
            .map_err(|e| PluginError::ManifestParseError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    pub fn validate(&self) -> PluginResult<()> {
        if self.name.trim().is_empty() {
            return Err(PluginError::InvalidManifest(
                "Plugin name cannot be empty".into(),
            ));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(PluginError::InvalidManifest(format!(
                "Plugin name '{}' can only contain alphanumeric characters, dots, hyphens, and underscores",
                self.name
            )));
        }

        semver::Version::parse(&self.version)?;

        let mut seen = HashSet::new();
        for action in &self.exports.actions {
            if action.name.trim().is_empty() {
                return Err(PluginError::InvalidManifest(format!(
                    "Plugin '{}' exports an action with an empty name",
                    self.name
                )));
            }
            if !seen.insert(action.name.as_str()) {
                return Err(PluginError::InvalidManifest(format!(
                    "Plugin '{}' exports action '{}' more than once",
                    self.name, action.name
                )));
            }
        }

        for hook in &self.exports.hooks {
            let pattern = EventPattern::new(hook.event.as_str());
            if pattern.timing().is_none() {
                return Err(PluginError::InvalidManifest(format!(
                    "Hook export '{}' of plugin '{}' must be 'domain:component:action:timing' \
                     with a concrete timing",
                    hook.event, self.name
                )));
            }
            if hook.function.trim().is_empty() {
                return Err(PluginError::InvalidManifest(format!(
                    "Hook export '{}' of plugin '{}' has no function",
                    hook.event, self.name
                )));
            }
        }

        Ok(())
    }

    /// Get parsed version
    pub fn version(&self) -> PluginResult<semver::Version> {
        Ok(semver::Version::parse(&self.version)?)
    }

    /// Find an exported action
    pub fn action(&self, name: &str) -> Option<&ActionExport> {
        self.exports.actions.iter().find(|a| a.name == name)
    }

    /// Resolve the declared capability tokens
    pub fn capability_set(&self) -> PluginResult<CapabilitySet> {
        CapabilitySet::resolve(&self.capabilities)
    }
}
