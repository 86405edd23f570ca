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

//! Loader strategies
//!
//! A [`PluginLoader`] turns a discovered plugin into a running instance.
//! The router asks each registered loader in turn whether it accepts a
//! manifest. Only the native loader ships; a WASM loader plugs in through
//! the same trait when the runtime is available.

use crate::discovery::DiscoveredPlugin;
use crate::error::{PluginError, PluginResult};
use crate::manifest::{PluginKind, PluginManifest};
use crate::plugin::Plugin;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

#[async_trait]
pub trait PluginLoader: Send + Sync {
    /// Loader name for logs
    fn name(&self) -> &str;

    /// Whether this loader can materialise `manifest`
    fn can_load(&self, manifest: &PluginManifest) -> bool;

    async fn load(&self, plugin: &DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>>;
}

/// Builds a native plugin instance from its discovery record.
pub type PluginFactory =
    Arc<dyn Fn(&DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> + Send + Sync>;

/// Loads `native` plugins through factories registered in-process, keyed by
/// the manifest's `entry`.
#[derive(Default)]
pub struct NativePluginLoader {
    factories: DashMap<String, PluginFactory>,
}

impl NativePluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for entry point `entry`, replacing any previous one.
    pub fn register_factory<F>(&self, entry: impl Into<String>, factory: F)
    where
        F: Fn(&DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        let entry = entry.into();
        tracing::debug!(entry = %entry, "Native plugin factory registered");
        self.factories.insert(entry, Arc::new(factory));
    }

    pub fn has_factory(&self, entry: &str) -> bool {
        self.factories.contains_key(entry)
    }
}

#[async_trait]
impl PluginLoader for NativePluginLoader {
    fn name(&self) -> &str {
        "native"
    }

    fn can_load(&self, manifest: &PluginManifest) -> bool {
        manifest.kind == PluginKind::Native
    }

    async fn load(&self, plugin: &DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> {
        let entry = &plugin.manifest().entry;
        let factory = self
            .factories
            .get(entry)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| {
                PluginError::LoadFailed(format!(
                    "no native factory registered for entry '{}' of plugin '{}'",
                    entry,
                    plugin.name()
                ))
            })?;

        factory(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::FnPlugin;

    fn discovered(kind: &str, entry: &str) -> DiscoveredPlugin {
        let manifest = PluginManifest::from_json(&format!(
            r#"{{"name": "p", "version": "1.0.0", "type": "{kind}", "entry": "{entry}"}}"#
        ))
        .unwrap();
        DiscoveredPlugin::new("/plugins/p", manifest)
    }

    #[test]
    fn test_native_loader_accepts_native_only() {
        let loader = NativePluginLoader::new();
        assert!(loader.can_load(discovered("native", "p").manifest()));
        assert!(!loader.can_load(discovered("wasm", "p.wasm").manifest()));
    }

    #[tokio::test]
    async fn test_load_through_factory() {
        let loader = NativePluginLoader::new();
        loader.register_factory("p_main", |d: &DiscoveredPlugin| {
            Ok(Arc::new(FnPlugin::new(d.manifest().clone())) as Arc<dyn Plugin>)
        });

        let plugin = loader.load(&discovered("native", "p_main")).await.unwrap();
        assert_eq!(plugin.name(), "p");
    }

    #[tokio::test]
    async fn test_missing_factory_fails() {
        let loader = NativePluginLoader::new();
        let err = loader
            .load(&discovered("native", "absent"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PluginError::LoadFailed(_)));
    }
}
