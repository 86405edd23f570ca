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

//! Loaded plugin instances.

use crate::error::{PluginError, PluginResult};
use crate::manifest::{PluginKind, PluginManifest};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of one plugin action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginActionResult {
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl PluginActionResult {
    pub fn ok(output: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// A running plugin instance.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get plugin manifest
    fn manifest(&self) -> &PluginManifest;

    fn name(&self) -> &str {
        &self.manifest().name
    }

    fn kind(&self) -> PluginKind {
        self.manifest().kind
    }

    /// Run one exported action
    async fn execute(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> PluginResult<PluginActionResult>;

    /// Release plugin resources. Called once, when the plugin is unloaded.
    async fn shutdown(&self) -> PluginResult<()> {
        Ok(())
    }
}

type ActionFn =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, PluginResult<PluginActionResult>> + Send + Sync>;

type ShutdownFn = Arc<dyn Fn() -> PluginResult<()> + Send + Sync>;

/// Plugin assembled from closures, one per action.
///
/// ```rust
/// use conductor_plugins::{FnPlugin, PluginActionResult, PluginManifest};
///
/// let manifest = PluginManifest::from_json(
///     r#"{"name": "echo", "version": "1.0.0", "type": "native"}"#,
/// ).unwrap();
/// let plugin = FnPlugin::new(manifest)
///     .with_action("echo", |params| async move { Ok(PluginActionResult::ok(params)) });
/// ```
pub struct FnPlugin {
    manifest: PluginManifest,
    actions: HashMap<String, ActionFn>,
    on_shutdown: Option<ShutdownFn>,
}

impl FnPlugin {
    pub fn new(manifest: PluginManifest) -> Self {
        Self {
            manifest,
            actions: HashMap::new(),
            on_shutdown: None,
        }
    }

    pub fn with_action<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<PluginActionResult>> + Send + 'static,
    {
        self.actions
            .insert(name.into(), Arc::new(move |params| f(params).boxed()));
        self
    }

    pub fn with_shutdown<F>(mut self, f: F) -> Self
    where
        F: Fn() -> PluginResult<()> + Send + Sync + 'static,
    {
        self.on_shutdown = Some(Arc::new(f));
        self
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("name", &self.manifest.name)
            .field("actions", &self.action_names())
            .finish()
    }
}

#[async_trait]
impl Plugin for FnPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> PluginResult<PluginActionResult> {
        let handler = self
            .actions
            .get(action)
            .cloned()
            .ok_or_else(|| PluginError::ActionNotFound {
                plugin: self.manifest.name.clone(),
                action: action.to_string(),
            })?;
        handler(params).await
    }

    async fn shutdown(&self) -> PluginResult<()> {
        match &self.on_shutdown {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plugin() -> FnPlugin {
        let manifest = PluginManifest::from_json(
            r#"{"name": "math", "version": "1.0.0", "type": "native"}"#,
        )
        .unwrap();
        FnPlugin::new(manifest).with_action("double", |params| async move {
            let n = params["n"]
                .as_i64()
                .ok_or_else(|| PluginError::ExecutionError("n must be an integer".into()))?;
            Ok(PluginActionResult::ok(n * 2))
        })
    }

    #[tokio::test]
    async fn test_execute_action() {
        let result = plugin().execute("double", json!({"n": 21})).await.unwrap();
        assert_eq!(result, PluginActionResult::ok(42));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let err = plugin().execute("triple", json!({})).await.unwrap_err();
        assert!(matches!(err, PluginError::ActionNotFound { action, .. } if action == "triple"));
    }

    #[test]
    fn test_action_result_constructors() {
        let failed = PluginActionResult::fail("nope");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("nope"));
        assert!(PluginActionResult::ok("x").error.is_none());
    }
}
