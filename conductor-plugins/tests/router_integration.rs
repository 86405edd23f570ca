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

//! Discovery and routing against real plugin directories.

use async_trait::async_trait;
use conductor_hooks::{Hook, HookPipeline, HookRegistry, HookTiming};
use conductor_plugins::{
    DiscoveredPlugin, FnPlugin, NativePluginLoader, Plugin, PluginActionResult, PluginConfig,
    PluginDiscovery, PluginError, PluginKind, PluginLoader, PluginManifest, PluginResult,
    PluginRouter,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_plugin(root: &Path, dir: &str, manifest: serde_json::Value) {
    let plugin_dir = root.join(dir);
    fs::create_dir_all(&plugin_dir).unwrap();
    fs::write(
        plugin_dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

fn manifest(name: &str, kind: &str) -> serde_json::Value {
    json!({ "name": name, "version": "1.0.0", "type": kind, "entry": name })
}

/// Native loader that counts invocations and sleeps to widen race windows.
struct CountingLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl PluginLoader for CountingLoader {
    fn name(&self) -> &str {
        "counting"
    }

    fn can_load(&self, manifest: &PluginManifest) -> bool {
        manifest.kind == PluginKind::Native
    }

    async fn load(&self, plugin: &DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Arc::new(
            FnPlugin::new(plugin.manifest().clone()).with_action("ping", |_params| async {
                Ok(PluginActionResult::ok("pong"))
            }),
        ))
    }
}

struct FailingLoader;

/// Counts invocations, waits, then fails.
struct SlowFailingLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl PluginLoader for SlowFailingLoader {
    fn name(&self) -> &str {
        "slow-failing"
    }

    fn can_load(&self, manifest: &PluginManifest) -> bool {
        manifest.kind == PluginKind::Native
    }

    async fn load(&self, plugin: &DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(PluginError::LoadFailed(format!("{} is corrupt", plugin.name())))
    }
}

#[async_trait]
impl PluginLoader for FailingLoader {
    fn name(&self) -> &str {
        "failing"
    }

    fn can_load(&self, manifest: &PluginManifest) -> bool {
        manifest.kind == PluginKind::Native
    }

    async fn load(&self, plugin: &DiscoveredPlugin) -> PluginResult<Arc<dyn Plugin>> {
        Err(PluginError::LoadFailed(format!("{} is corrupt", plugin.name())))
    }
}

#[test]
fn test_discovery_scans_immediate_subdirectories() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git-tools", "native"));
    write_plugin(root.path(), "sandbox", manifest("sandbox", "wasm"));
    write_plugin(root.path(), "nested/deeper", manifest("too-deep", "native"));
    fs::create_dir_all(root.path().join("empty")).unwrap();
    fs::create_dir_all(root.path().join("broken")).unwrap();
    fs::write(root.path().join("broken/manifest.json"), "{ not json").unwrap();
    fs::write(root.path().join("README.md"), "not a plugin").unwrap();

    let missing = root.path().join("missing");
    let catalog = PluginDiscovery::new().scan(&[root.path(), missing.as_path()]);

    assert_eq!(catalog.len(), 2);
    assert!(catalog.contains("GIT-TOOLS"));
    assert_eq!(catalog.get("sandbox").unwrap().kind(), PluginKind::Wasm);
    assert!(!catalog.contains("too-deep"));
    assert_eq!(
        catalog.get("git-tools").unwrap().path(),
        root.path().join("git")
    );
}

#[test]
fn test_discovery_later_directory_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_plugin(first.path(), "git", manifest("git", "native"));
    write_plugin(
        second.path(),
        "git-v2",
        json!({ "name": "Git", "version": "2.0.0", "type": "native" }),
    );

    let catalog = PluginDiscovery::new().scan(&[first.path(), second.path()]);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.get("git").unwrap().manifest().version, "2.0.0");
}

#[test]
fn test_discovery_custom_manifest_filename() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("p");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("plugin.json"), manifest("p", "native").to_string()).unwrap();

    let config = PluginConfig {
        directories: vec![root.path().to_path_buf()],
        manifest_filename: "plugin.json".to_string(),
    };
    let router = PluginRouter::builder().with_config(config).build();
    let catalog = router.discover_configured();
    assert!(catalog.contains("p"));
    assert!(router.catalog().contains("p"));
}

#[tokio::test]
async fn test_concurrent_first_resolution_loads_once() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git", "native"));

    let loader = Arc::new(CountingLoader {
        loads: AtomicUsize::new(0),
    });
    let router = Arc::new(PluginRouter::builder().with_loader(loader.clone()).build());
    router.discover(&[root.path()]);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let router = Arc::clone(&router);
            let name = if i % 2 == 0 { "git" } else { "GIT" };
            tokio::spawn(async move { router.resolve(name).await.map(|_| ()) })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(router.manager().count(), 1);

    let git = router.resolve("git").await.unwrap();
    let result = git.execute("ping", json!({})).await.unwrap();
    assert_eq!(result.output, json!("pong"));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_failed_resolution_loads_once() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git", "native"));

    let loader = Arc::new(SlowFailingLoader {
        loads: AtomicUsize::new(0),
    });
    let router = Arc::new(PluginRouter::builder().with_loader(loader.clone()).build());
    router.discover(&[root.path()]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.resolve("git").await.map(|_| ()) })
        })
        .collect();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Plugin load failed: git is corrupt");
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

    // The failure is not remembered once the flight is over.
    assert!(router.resolve("git").await.is_err());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_wasm_plugin_without_runtime() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "sandbox", manifest("sandbox", "wasm"));

    let router = PluginRouter::builder()
        .with_loader(Arc::new(NativePluginLoader::new()))
        .build();
    router.discover(&[root.path()]);

    let err = router.resolve("sandbox").await.err().unwrap();
    assert!(err.is_wasm_runtime_missing());
    assert!(err.to_string().contains("WASM runtime is not installed"));
}

#[tokio::test]
async fn test_native_plugin_without_loader() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git", "native"));

    let router = PluginRouter::builder().build();
    router.discover(&[root.path()]);

    let err = router.resolve("git").await.err().unwrap();
    assert!(matches!(
        err,
        PluginError::LoaderUnavailable {
            kind: PluginKind::Native,
            ..
        }
    ));
    assert!(err.to_string().contains("No loader available"));
}

#[tokio::test]
async fn test_get_all_plugins_skips_missing_wasm_runtime() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git", "native"));
    write_plugin(root.path(), "sandbox", manifest("sandbox", "wasm"));
    write_plugin(root.path(), "shell", manifest("shell", "native"));

    let router = PluginRouter::builder()
        .with_loader(Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
        }))
        .build();
    router.discover(&[root.path()]);

    let plugins = router.get_all_plugins().await.unwrap();
    let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["git", "shell"]);
}

#[tokio::test]
async fn test_get_all_plugins_propagates_other_failures() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git", "native"));

    let router = PluginRouter::builder()
        .with_loader(Arc::new(FailingLoader))
        .build();
    router.discover(&[root.path()]);

    let err = router.get_all_plugins().await.err().unwrap();
    assert!(matches!(err, PluginError::LoadFailed(_)));
    assert_eq!(router.manager().count(), 0);
}

#[tokio::test]
async fn test_failed_load_can_be_retried() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "git", manifest("git", "native"));

    let native = Arc::new(NativePluginLoader::new());
    let router = PluginRouter::builder().with_loader(native.clone()).build();
    router.discover(&[root.path()]);

    assert!(router.resolve("git").await.is_err());

    native.register_factory("git", |d: &DiscoveredPlugin| {
        Ok(Arc::new(FnPlugin::new(d.manifest().clone())) as Arc<dyn Plugin>)
    });
    assert_eq!(router.resolve("git").await.unwrap().name(), "git");
}

#[tokio::test]
async fn test_router_binds_and_unbinds_plugin_hooks() {
    let root = TempDir::new().unwrap();
    write_plugin(
        root.path(),
        "audit",
        json!({
            "name": "audit",
            "version": "1.0.0",
            "type": "native",
            "entry": "audit",
            "exports": { "hooks": [{ "event": "workflow:*:*:before", "function": "deny" }] }
        }),
    );

    let native = Arc::new(NativePluginLoader::new());
    native.register_factory("audit", |d: &DiscoveredPlugin| {
        let plugin = FnPlugin::new(d.manifest().clone()).with_action("deny", |_params| async {
            Ok(PluginActionResult::fail("denied by audit"))
        });
        Ok(Arc::new(plugin) as Arc<dyn Plugin>)
    });

    let hooks = Arc::new(HookRegistry::new());
    let router = PluginRouter::builder()
        .with_loader(native)
        .with_hook_registry(Arc::clone(&hooks))
        .build();
    router.discover(&[root.path()]);
    router.resolve("audit").await.unwrap();
    assert!(hooks.contains("audit:deny"));

    hooks.register(Hook::from_fn(
        "audit:manual",
        "agent:*:*:*",
        HookTiming::Before,
        |_ctx| async { anyhow::Ok(()) },
    ));

    let pipeline = HookPipeline::new(Arc::clone(&hooks));
    let err = pipeline
        .execute("workflow:agent:step1:before", |_ctx| async { Ok(()) })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "denied by audit");

    assert!(router.unload("audit").await.unwrap());
    assert!(!hooks.contains("audit:deny"));
    assert!(hooks.contains("audit:manual"));
    assert_eq!(hooks.hook_count(), 1);
    assert!(pipeline
        .execute("workflow:agent:step1:before", |_ctx| async { Ok(()) })
        .await
        .is_ok());
}
