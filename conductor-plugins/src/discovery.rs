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

//! Plugin discovery
//!
//! Scans plugin directories for manifests and produces an immutable
//! [`PluginCatalog`] snapshot. Nothing is loaded here.

use crate::config::{PluginConfig, MANIFEST_FILENAME};
use crate::manifest::{PluginKind, PluginManifest};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A plugin found on disk: its directory and parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPlugin {
    path: PathBuf,
    manifest: PluginManifest,
}

impl DiscoveredPlugin {
    pub fn new(path: impl Into<PathBuf>, manifest: PluginManifest) -> Self {
        Self {
            path: path.into(),
            manifest,
        }
    }

    /// Plugin directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn kind(&self) -> PluginKind {
        self.manifest.kind
    }
}

/// Point-in-time result of a discovery scan, keyed by lowercase plugin name.
#[derive(Debug, Clone)]
pub struct PluginCatalog {
    plugins: BTreeMap<String, DiscoveredPlugin>,
    scanned_at: DateTime<Utc>,
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl PluginCatalog {
    pub fn empty() -> Self {
        Self {
            plugins: BTreeMap::new(),
            scanned_at: Utc::now(),
        }
    }

    /// Add a plugin. A later plugin with the same name replaces an earlier one.
    fn insert(&mut self, plugin: DiscoveredPlugin) {
        let key = plugin.name().to_lowercase();
        if let Some(previous) = self.plugins.insert(key, plugin) {
            tracing::debug!(
                plugin = %previous.name(),
                path = %previous.path().display(),
                "Discovered plugin shadowed by a later directory"
            );
        }
    }

    /// Look up a plugin by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<&DiscoveredPlugin> {
        self.plugins.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredPlugin> {
        self.plugins.values()
    }

    /// Plugin names as declared in their manifests
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// When the scan that produced this catalog ran
    pub fn scanned_at(&self) -> DateTime<Utc> {
        self.scanned_at
    }
}

impl FromIterator<DiscoveredPlugin> for PluginCatalog {
    fn from_iter<I: IntoIterator<Item = DiscoveredPlugin>>(iter: I) -> Self {
        let mut catalog = Self::empty();
        for plugin in iter {
            catalog.insert(plugin);
        }
        catalog
    }
}

/// Scans directories for plugin manifests.
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    manifest_filename: String,
}

impl Default for PluginDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginDiscovery {
    pub fn new() -> Self {
        Self {
            manifest_filename: MANIFEST_FILENAME.to_string(),
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            manifest_filename: config.manifest_filename.clone(),
        }
    }

    /// Use a manifest file name other than `manifest.json`
    pub fn with_manifest_filename(mut self, filename: impl Into<String>) -> Self {
        self.manifest_filename = filename.into();
        self
    }

    /// Scan every directory and return a fresh catalog. Missing directories
    /// and unparseable manifests are logged and skipped.
    pub fn scan<P: AsRef<Path>>(&self, directories: &[P]) -> PluginCatalog {
        let mut catalog = PluginCatalog::empty();

        for dir in directories {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                tracing::warn!(
                    directory = %dir.display(),
                    "Plugin directory does not exist, skipping"
                );
                continue;
            }

            for plugin in self.scan_directory(dir) {
                catalog.insert(plugin);
            }
        }

        tracing::info!(
            plugins = catalog.len(),
            directories = directories.len(),
            "Plugin discovery complete"
        );

        catalog
    }

    /// Scan the immediate subdirectories of one directory
    fn scan_directory(&self, dir: &Path) -> Vec<DiscoveredPlugin> {
        let mut plugins = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(directory = %dir.display(), error = %e, "Failed to read plugin directory entry");
                    continue;
                }
            };

            let plugin_dir = entry.path();
            if !plugin_dir.is_dir() {
                continue;
            }

            let manifest_path = plugin_dir.join(&self.manifest_filename);
            if !manifest_path.is_file() {
                tracing::debug!(path = %plugin_dir.display(), "No manifest, not a plugin");
                continue;
            }

            match PluginManifest::from_file(&manifest_path) {
                Ok(manifest) => {
                    tracing::debug!(plugin = %manifest.name, path = %plugin_dir.display(), "Discovered plugin");
                    plugins.push(DiscoveredPlugin::new(plugin_dir, manifest));
                }
                Err(e) => {
                    tracing::warn!(
                        path = %manifest_path.display(),
                        error = %e,
                        "Failed to parse plugin manifest, skipping"
                    );
                }
            }
        }

        plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str) -> PluginManifest {
        PluginManifest::from_json(&format!(
            r#"{{"name": "{name}", "version": "1.0.0", "type": "native"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_catalog_lookup_is_case_insensitive() {
        let catalog: PluginCatalog = [DiscoveredPlugin::new("/p/git", manifest("Git-Tools"))]
            .into_iter()
            .collect();
        assert!(catalog.contains("git-tools"));
        assert_eq!(catalog.get("GIT-TOOLS").unwrap().name(), "Git-Tools");
        assert_eq!(catalog.names(), vec!["Git-Tools".to_string()]);
    }

    #[test]
    fn test_catalog_last_one_wins() {
        let catalog: PluginCatalog = [
            DiscoveredPlugin::new("/first/git", manifest("git")),
            DiscoveredPlugin::new("/second/git", manifest("GIT")),
        ]
        .into_iter()
        .collect();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("git").unwrap().path(), Path::new("/second/git"));
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let catalog = PluginDiscovery::new().scan(&["/definitely/not/here"]);
        assert!(catalog.is_empty());
    }
}
