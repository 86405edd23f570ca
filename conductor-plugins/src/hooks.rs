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

//! Plugin hook bindings
//!
//! A manifest's `exports.hooks` entries become interceptors in a
//! [`HookRegistry`]. Each binding is named `<plugin>:<function>` and invokes
//! the plugin action `function` with the event address and a snapshot of the
//! guard context properties.

use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginManifest;
use crate::plugin::Plugin;
use async_trait::async_trait;
use conductor_hooks::{EventPattern, GuardContext, Hook, HookHandler, HookRegistry};
use std::sync::{Arc, Weak};

/// Registry name of the hook bound to `function` of `plugin`.
pub fn hook_name(plugin: &str, function: &str) -> String {
    format!("{plugin}:{function}")
}

/// Forwards hook invocations to a plugin action. Holds the plugin weakly so
/// an unloaded plugin is not kept alive by stale bindings.
struct PluginHookHandler {
    plugin: Weak<dyn Plugin>,
    plugin_name: String,
    function: String,
}

#[async_trait]
impl HookHandler for PluginHookHandler {
    async fn handle(&self, ctx: Arc<GuardContext>) -> anyhow::Result<()> {
        let plugin = self
            .plugin
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("plugin '{}' is no longer loaded", self.plugin_name))?;

        let params = serde_json::json!({
            "event": ctx.event().to_string(),
            "properties": serde_json::to_value(ctx.properties())?,
        });

        let result = plugin.execute(&self.function, params).await?;
        if !result.success {
            anyhow::bail!(
                "{}",
                result.error.unwrap_or_else(|| format!(
                    "hook '{}' failed",
                    hook_name(&self.plugin_name, &self.function)
                ))
            );
        }
        Ok(())
    }
}

/// Register one hook per hook export of `plugin`. Either every export is
/// bound or none is. Returns the number of hooks registered.
pub fn bind_plugin_hooks(plugin: &Arc<dyn Plugin>, registry: &HookRegistry) -> PluginResult<usize> {
    let manifest = plugin.manifest();
    let mut hooks = Vec::with_capacity(manifest.exports.hooks.len());

    for export in &manifest.exports.hooks {
        let pattern = EventPattern::new(export.event.as_str());
        let timing = pattern.timing().ok_or_else(|| {
            PluginError::InvalidHookBinding(format!(
                "'{}' of plugin '{}' has no concrete timing segment",
                export.event, manifest.name
            ))
        })?;

        let handler = PluginHookHandler {
            plugin: Arc::downgrade(plugin),
            plugin_name: manifest.name.clone(),
            function: export.function.clone(),
        };

        hooks.push(
            Hook::new(
                hook_name(&manifest.name, &export.function),
                pattern,
                timing,
                Arc::new(handler),
            )
            .with_description(format!("Plugin hook {}.{}", manifest.name, export.function)),
        );
    }

    let count = hooks.len();
    for hook in hooks {
        registry.register(hook);
    }

    if count > 0 {
        tracing::debug!(plugin = %manifest.name, hooks = count, "Plugin hooks bound");
    }
    Ok(count)
}

/// Remove the hooks [`bind_plugin_hooks`] registered for `manifest`. Other
/// hooks whose names share the plugin prefix are left in place. Returns how
/// many were removed.
pub fn unbind_plugin_hooks(manifest: &PluginManifest, registry: &HookRegistry) -> usize {
    let removed = manifest
        .exports
        .hooks
        .iter()
        .filter(|export| registry.deregister(&hook_name(&manifest.name, &export.function)))
        .count();
    if removed > 0 {
        tracing::debug!(plugin = %manifest.name, hooks = removed, "Plugin hooks unbound");
    }
    removed
}
