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

//! Plugin manager - registry of loaded plugin instances
//!
//! Keys are plugin names folded to lowercase, so at most one instance per
//! name exists at any time.

use crate::error::PluginResult;
use crate::manifest::PluginKind;
use crate::plugin::Plugin;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct PluginManager {
    plugins: DashMap<String, Arc<dyn Plugin>>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded plugin, replacing any instance with the same name.
    /// Returns the replaced instance.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
        let name = plugin.name().to_string();
        tracing::info!(plugin = %name, kind = %plugin.kind(), "Plugin registered");
        self.plugins.insert(key(&name), plugin)
    }

    /// Get a loaded plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(&key(name)).map(|p| Arc::clone(p.value()))
    }

    pub fn get_by_kind(&self, kind: PluginKind) -> Vec<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(|p| p.kind() == kind)
            .map(|p| Arc::clone(p.value()))
            .collect()
    }

    /// All loaded plugins, sorted by name
    pub fn list(&self) -> Vec<Arc<dyn Plugin>> {
        let mut plugins: Vec<_> = self.plugins.iter().map(|p| Arc::clone(p.value())).collect();
        plugins.sort_by(|a, b| a.name().cmp(b.name()));
        plugins
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(&key(name))
    }

    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// Remove and shut down a plugin. Returns `Ok(false)` if nothing was
    /// loaded under `name`.
    ///
    /// The instance leaves the registry and the manager's reference is
    /// dropped whether or not its shutdown succeeds; a shutdown error is
    /// returned afterwards.
    pub async fn unload(&self, name: &str) -> PluginResult<bool> {
        let Some((_, plugin)) = self.plugins.remove(&key(name)) else {
            return Ok(false);
        };

        let result = plugin.shutdown().await;
        drop(plugin);

        match result {
            Ok(()) => {
                tracing::info!(plugin = %name, "Plugin unloaded");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(plugin = %name, error = %e, "Plugin shutdown failed during unload");
                Err(e)
            }
        }
    }

    /// Unload every plugin. Shutdown failures are logged. Returns how many
    /// plugins were unloaded.
    pub async fn unload_all(&self) -> usize {
        let names: Vec<String> = self.plugins.iter().map(|p| p.key().clone()).collect();
        let mut unloaded = 0;

        for name in names {
            match self.unload(&name).await {
                Ok(true) | Err(_) => unloaded += 1,
                Ok(false) => {}
            }
        }

        unloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::manifest::PluginManifest;
    use crate::plugin::FnPlugin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plugin(name: &str, kind: &str) -> FnPlugin {
        FnPlugin::new(
            PluginManifest::from_json(&format!(
                r#"{{"name": "{name}", "version": "1.0.0", "type": "{kind}"}}"#
            ))
            .unwrap(),
        )
    }

    #[test]
    fn test_register_and_get_case_insensitive() {
        let manager = PluginManager::new();
        assert!(manager.register(Arc::new(plugin("Git", "native"))).is_none());
        assert!(manager.get("git").is_some());
        assert!(manager.contains("GIT"));
        assert!(manager.register(Arc::new(plugin("git", "native"))).is_some());
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_get_by_kind() {
        let manager = PluginManager::new();
        manager.register(Arc::new(plugin("a", "native")));
        manager.register(Arc::new(plugin("b", "wasm")));
        manager.register(Arc::new(plugin("c", "native")));
        assert_eq!(manager.get_by_kind(PluginKind::Native).len(), 2);
        assert_eq!(manager.get_by_kind(PluginKind::Wasm).len(), 1);
    }

    #[tokio::test]
    async fn test_unload_runs_shutdown_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let manager = PluginManager::new();
        manager.register(Arc::new(plugin("a", "native").with_shutdown(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));

        assert!(manager.unload("A").await.unwrap());
        assert!(!manager.unload("a").await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unload_releases_instance_when_shutdown_fails() {
        let manager = PluginManager::new();
        let instance: Arc<dyn Plugin> = Arc::new(
            plugin("a", "native")
                .with_shutdown(|| Err(PluginError::ExecutionError("stuck".into()))),
        );
        manager.register(Arc::clone(&instance));
        assert_eq!(Arc::strong_count(&instance), 2);

        let err = manager.unload("a").await.unwrap_err();
        assert!(matches!(err, PluginError::ExecutionError(_)));
        assert!(!manager.contains("a"));
        assert_eq!(Arc::strong_count(&instance), 1);
    }

    #[tokio::test]
    async fn test_unload_all() {
        let manager = PluginManager::new();
        manager.register(Arc::new(plugin("a", "native")));
        manager.register(Arc::new(plugin("b", "native")));
        assert_eq!(manager.unload_all().await, 2);
        assert_eq!(manager.count(), 0);
    }
}
