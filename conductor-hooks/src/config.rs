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

//! Hook pipeline configuration.

use crate::error::HookResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the hook pipeline.
///
/// # Example JSON Configuration
///
/// ```json
/// {
///     "enable_metrics": true,
///     "hook_timeout_ms": 5000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Emit OpenTelemetry measurements for non-fast-path invocations.
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,

    /// Upper bound for a single before/after/on-error hook. Around hooks
    /// enclose the operation and are never timed out.
    #[serde(default)]
    pub hook_timeout_ms: Option<u64>,
}

fn default_enable_metrics() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_enable_metrics(),
            hook_timeout_ms: None,
        }
    }
}

impl PipelineConfig {
    /// Create a pipeline configuration from a JSON string.
    pub fn from_json(json: &str) -> HookResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Create a pipeline configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> HookResult<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }
}
