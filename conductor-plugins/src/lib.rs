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

//! Conductor plugin system
//!
//! Plugins live in directories containing a `manifest.json`. The pieces:
//!
//! - [`PluginDiscovery`] scans directories into an immutable [`PluginCatalog`]
//! - [`PluginLoader`] strategies turn a discovered plugin into a [`Plugin`]
//! - [`PluginManager`] holds loaded instances, one per name
//! - [`PluginRouter`] resolves names on demand with single-flight loading
//!   and answers capability queries
//!
//! # Example
//!
//! ```rust,no_run
//! use conductor_plugins::{FnPlugin, NativePluginLoader, Plugin, PluginRouter};
//! use std::sync::Arc;
//!
//! # async fn example() -> conductor_plugins::PluginResult<()> {
//! let native = Arc::new(NativePluginLoader::new());
//! native.register_factory("git_tools", |d| {
//!     Ok(Arc::new(FnPlugin::new(d.manifest().clone())) as Arc<dyn Plugin>)
//! });
//!
//! let router = PluginRouter::builder().with_loader(native).build();
//! router.discover(&["./plugins"]);
//! let git = router.resolve("git-tools").await?;
//! git.execute("status", serde_json::json!({})).await?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod plugin;
pub mod router;

pub use capabilities::{Capability, CapabilitySet};
pub use config::{PluginConfig, MANIFEST_FILENAME};
pub use discovery::{DiscoveredPlugin, PluginCatalog, PluginDiscovery};
pub use error::{PluginError, PluginResult};
pub use hooks::{bind_plugin_hooks, unbind_plugin_hooks};
pub use loader::{NativePluginLoader, PluginFactory, PluginLoader};
pub use manager::PluginManager;
pub use manifest::{
    ActionExport, CapabilityDeclaration, HookExport, PluginExports, PluginKind, PluginManifest,
};
pub use plugin::{FnPlugin, Plugin, PluginActionResult};
pub use router::{PluginRouter, PluginRouterBuilder};
