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

//! Plugin capabilities
//!
//! Manifests declare capabilities as free-form tokens. Tokens are matched
//! case-insensitively with `-` and `_` ignored, so `fs-read`, `FS_READ` and
//! `fsread` all name [`Capability::FsRead`].

use crate::error::{PluginError, PluginResult};
use crate::manifest::CapabilityDeclaration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Individual capability that can be declared by a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read files
    FsRead,
    /// Write files
    FsWrite,
    /// Network access
    Network,
    /// Execute shell commands
    Shell,
    /// Run git commands
    Git,
    /// Read host configuration
    ConfigRead,
    /// Modify host configuration
    ConfigWrite,
    /// Read environment variables
    EnvRead,
    /// Invoke agents
    AgentInvoke,
    /// Start workflows
    WorkflowRun,
    /// Send notifications
    Notifications,
    /// Access clipboard
    Clipboard,
}

impl Capability {
    pub const ALL: [Capability; 12] = [
        Capability::FsRead,
        Capability::FsWrite,
        Capability::Network,
        Capability::Shell,
        Capability::Git,
        Capability::ConfigRead,
        Capability::ConfigWrite,
        Capability::EnvRead,
        Capability::AgentInvoke,
        Capability::WorkflowRun,
        Capability::Notifications,
        Capability::Clipboard,
    ];

    /// Map a manifest token to a capability. Returns `None` for unknown tokens.
    pub fn parse(token: &str) -> Option<Capability> {
        let normalized: String = token
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        let cap = match normalized.as_str() {
            "fsread" | "filesystemread" => Capability::FsRead,
            "fswrite" | "filesystemwrite" => Capability::FsWrite,
            "network" | "net" | "http" => Capability::Network,
            "shell" | "exec" => Capability::Shell,
            "git" => Capability::Git,
            "configread" => Capability::ConfigRead,
            "configwrite" => Capability::ConfigWrite,
            "envread" | "env" => Capability::EnvRead,
            "agentinvoke" | "agents" => Capability::AgentInvoke,
            "workflowrun" | "workflows" => Capability::WorkflowRun,
            "notifications" | "notify" => Capability::Notifications,
            "clipboard" => Capability::Clipboard,
            _ => return None,
        };
        Some(cap)
    }

    /// Canonical manifest token
    pub fn token(&self) -> &'static str {
        match self {
            Capability::FsRead => "fs-read",
            Capability::FsWrite => "fs-write",
            Capability::Network => "network",
            Capability::Shell => "shell",
            Capability::Git => "git",
            Capability::ConfigRead => "config-read",
            Capability::ConfigWrite => "config-write",
            Capability::EnvRead => "env-read",
            Capability::AgentInvoke => "agent-invoke",
            Capability::WorkflowRun => "workflow-run",
            Capability::Notifications => "notifications",
            Capability::Clipboard => "clipboard",
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Capability::FsRead => "Read files",
            Capability::FsWrite => "Write files",
            Capability::Network => "Full network access",
            Capability::Shell => "Execute shell commands",
            Capability::Git => "Run git commands",
            Capability::ConfigRead => "Read configuration",
            Capability::ConfigWrite => "Modify configuration",
            Capability::EnvRead => "Read environment variables",
            Capability::AgentInvoke => "Invoke agents",
            Capability::WorkflowRun => "Start workflows",
            Capability::Notifications => "Send desktop notifications",
            Capability::Clipboard => "Access clipboard",
        }
    }

    /// Check if this capability is considered dangerous
    pub fn is_dangerous(&self) -> bool {
        matches!(
            self,
            Capability::FsWrite
                | Capability::Network
                | Capability::Shell
                | Capability::ConfigWrite
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Capability {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::parse(s).ok_or_else(|| PluginError::UnknownCapability(s.to_string()))
    }
}

/// A set of capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a manifest declaration. Unknown required tokens are an error;
    /// unknown optional tokens are skipped.
    pub fn resolve(declaration: &CapabilityDeclaration) -> PluginResult<Self> {
        let mut set = Self::new();

        for token in &declaration.required {
            set.add(token.parse()?);
        }

        for token in &declaration.optional {
            match Capability::parse(token) {
                Some(cap) => set.add(cap),
                None => tracing::debug!(capability = %token, "Skipping unknown optional capability"),
            }
        }

        Ok(set)
    }

    /// Required capabilities only, skipping tokens that do not parse.
    pub fn required_lenient(declaration: &CapabilityDeclaration) -> Self {
        declaration
            .required
            .iter()
            .filter_map(|token| Capability::parse(token))
            .collect()
    }

    /// Add a capability
    pub fn add(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    /// Check if a capability is present
    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    /// Get dangerous capabilities
    pub fn dangerous(&self) -> Vec<Capability> {
        self.iter().filter(Capability::is_dangerous).collect()
    }

    /// Check if set is empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Number of capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(required: &[&str], optional: &[&str]) -> CapabilityDeclaration {
        CapabilityDeclaration {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_token_normalization() {
        for token in ["fs-read", "FS_READ", "fsread", "Fs-Read", " fs_read "] {
            assert_eq!(Capability::parse(token), Some(Capability::FsRead), "{token}");
        }
        assert_eq!(Capability::parse("config_read"), Some(Capability::ConfigRead));
        assert_eq!(Capability::parse("teleport"), None);
    }

    #[test]
    fn test_canonical_tokens_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::parse(cap.token()), Some(cap));
        }
    }

    #[test]
    fn test_unknown_required_token_is_error() {
        let err = CapabilitySet::resolve(&declaration(&["git", "teleport"], &[])).unwrap_err();
        assert!(matches!(err, PluginError::UnknownCapability(t) if t == "teleport"));
    }

    #[test]
    fn test_unknown_optional_token_is_skipped() {
        let set = CapabilitySet::resolve(&declaration(&["git"], &["teleport", "network"])).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.has(Capability::Git));
        assert!(set.has(Capability::Network));
    }

    #[test]
    fn test_dangerous_capabilities() {
        let set: CapabilitySet = [Capability::FsRead, Capability::Shell, Capability::Network]
            .into_iter()
            .collect();
        assert_eq!(set.dangerous().len(), 2);
    }
}
