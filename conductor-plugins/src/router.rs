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

//! Plugin router
//!
//! Resolves plugin names to loaded instances. Resolution order:
//!
//! 1. an instance already in the [`PluginManager`]
//! 2. the discovery snapshot, then the first [`PluginLoader`] accepting the
//!    manifest kind
//!
//! Concurrent first resolutions of one name share a single in-flight load
//! and all observe its outcome, success or failure.

use crate::capabilities::Capability;
use crate::config::PluginConfig;
use crate::discovery::{DiscoveredPlugin, PluginCatalog, PluginDiscovery};
use crate::error::{PluginError, PluginResult};
use crate::hooks::{bind_plugin_hooks, unbind_plugin_hooks};
use crate::loader::PluginLoader;
use crate::manager::PluginManager;
use crate::plugin::Plugin;
use conductor_hooks::HookRegistry;
use conductor_telemetry::Metrics;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Outcome of one load attempt, shared by every caller that waited on it.
type InFlight = Arc<OnceCell<PluginResult<Arc<dyn Plugin>>>>;

pub struct PluginRouter {
    manager: Arc<PluginManager>,
    loaders: Vec<Arc<dyn PluginLoader>>,
    catalog: RwLock<Arc<PluginCatalog>>,
    in_flight: DashMap<String, InFlight>,
    config: PluginConfig,
    hooks: Option<Arc<HookRegistry>>,
    metrics: Option<Arc<Metrics>>,
}

impl PluginRouter {
    pub fn new(manager: Arc<PluginManager>, loaders: Vec<Arc<dyn PluginLoader>>) -> Self {
        PluginRouterBuilder::new()
            .with_manager(manager)
            .with_loaders(loaders)
            .build()
    }

    pub fn builder() -> PluginRouterBuilder {
        PluginRouterBuilder::new()
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Current discovery snapshot
    pub fn catalog(&self) -> Arc<PluginCatalog> {
        Arc::clone(&self.catalog.read())
    }

    /// Replace the discovery snapshot. Readers see the old or the new
    /// catalog, never a mix.
    pub fn set_catalog(&self, catalog: PluginCatalog) -> Arc<PluginCatalog> {
        let catalog = Arc::new(catalog);
        *self.catalog.write() = Arc::clone(&catalog);
        catalog
    }

    /// Scan `directories` and install the result as the new snapshot.
    pub fn discover<P: AsRef<Path>>(&self, directories: &[P]) -> Arc<PluginCatalog> {
        let catalog = PluginDiscovery::from_config(&self.config).scan(directories);
        self.set_catalog(catalog)
    }

    /// Scan the configured plugin directories.
    pub fn discover_configured(&self) -> Arc<PluginCatalog> {
        self.discover(&self.config.directories)
    }

    /// Resolve a plugin by name, loading it on first use.
    pub async fn resolve(&self, name: &str) -> PluginResult<Arc<dyn Plugin>> {
        if let Some(plugin) = self.manager.get(name) {
            return Ok(plugin);
        }

        let discovered = self
            .catalog()
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let key = name.to_lowercase();
        let cell: InFlight = Arc::clone(
            self.in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let result = cell
            .get_or_init(|| async {
                // A load that finished between the manager check and here.
                if let Some(plugin) = self.manager.get(&key) {
                    return Ok(plugin);
                }
                self.load(&discovered).await
            })
            .await
            .clone();

        // A failed load is retried by the next resolve once this flight ends.
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));

        result
    }

    async fn load(&self, discovered: &DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> {
        let manifest = discovered.manifest();
        let kind = manifest.kind.to_string();

        let Some(loader) = self.loaders.iter().find(|l| l.can_load(manifest)) else {
            return Err(PluginError::LoaderUnavailable {
                name: manifest.name.clone(),
                kind: manifest.kind,
            });
        };

        tracing::debug!(plugin = %manifest.name, loader = loader.name(), "Loading plugin");

        let loaded = loader.load(discovered).await.and_then(|plugin| {
            if let Some(registry) = &self.hooks {
                bind_plugin_hooks(&plugin, registry)?;
            }
            Ok(plugin)
        });

        if let Some(metrics) = &self.metrics {
            metrics.record_plugin_load(&kind, loaded.is_ok());
        }

        match loaded {
            Ok(plugin) => {
                self.manager.register(Arc::clone(&plugin));
                tracing::info!(
                    plugin = %manifest.name,
                    kind = %kind,
                    path = %discovered.path().display(),
                    "Plugin loaded"
                );
                Ok(plugin)
            }
            Err(e) => {
                tracing::warn!(plugin = %manifest.name, error = %e, "Plugin load failed");
                Err(e)
            }
        }
    }

    /// Every loaded plugin plus a best-effort load of each discovered one.
    ///
    /// A missing WASM runtime skips that plugin; any other load failure
    /// aborts the pass and is returned.
    pub async fn get_all_plugins(&self) -> PluginResult<Vec<Arc<dyn Plugin>>> {
        let catalog = self.catalog();

        for discovered in catalog.iter() {
            if self.manager.contains(discovered.name()) {
                continue;
            }

            match self.resolve(discovered.name()).await {
                Ok(_) => {}
                Err(e) if e.is_wasm_runtime_missing() => {
                    tracing::warn!(plugin = %discovered.name(), error = %e, "Skipping plugin");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.manager.list())
    }

    /// Loaded plugins whose required capabilities include `capability`.
    /// Never triggers loading.
    pub fn get_plugins_by_capability(&self, capability: Capability) -> Vec<Arc<dyn Plugin>> {
        self.manager
            .list()
            .into_iter()
            .filter(|plugin| {
                plugin
                    .manifest()
                    .capabilities
                    .required
                    .iter()
                    .filter_map(|token| Capability::parse(token))
                    .any(|cap| cap == capability)
            })
            .collect()
    }

    /// Unbind the plugin's hooks and unload it.
    pub async fn unload(&self, name: &str) -> PluginResult<bool> {
        if let (Some(registry), Some(plugin)) = (&self.hooks, self.manager.get(name)) {
            unbind_plugin_hooks(plugin.manifest(), registry);
        }
        self.manager.unload(name).await
    }
}

/// Builder for creating a PluginRouter with custom settings.
#[derive(Default)]
pub struct PluginRouterBuilder {
    manager: Option<Arc<PluginManager>>,
    loaders: Vec<Arc<dyn PluginLoader>>,
    config: PluginConfig,
    hooks: Option<Arc<HookRegistry>>,
    metrics: Option<Arc<Metrics>>,
}

impl PluginRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing plugin manager.
    pub fn with_manager(mut self, manager: Arc<PluginManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Append a loader. Loaders are consulted in insertion order.
    pub fn with_loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub fn with_loaders(mut self, loaders: impl IntoIterator<Item = Arc<dyn PluginLoader>>) -> Self {
        self.loaders.extend(loaders);
        self
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind manifest hook exports into `registry` on load.
    pub fn with_hook_registry(mut self, registry: Arc<HookRegistry>) -> Self {
        self.hooks = Some(registry);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> PluginRouter {
        PluginRouter {
            manager: self.manager.unwrap_or_default(),
            loaders: self.loaders,
            catalog: RwLock::new(Arc::new(PluginCatalog::empty())),
            in_flight: DashMap::new(),
            config: self.config,
            hooks: self.hooks,
            metrics: self.metrics,
        }
    }
}
