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

//! Telemetry configuration
//!
//! Reads the standard OTEL environment variables plus Conductor's own log
//! settings.

use serde::{Deserialize, Serialize};
use std::env;

/// Log output format for the `fmt` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// OTLP gRPC endpoint. Nothing is exported when unset.
    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),

            log_format: match env::var("CONDUCTOR_LOG_FORMAT")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "pretty" | "text" => LogFormat::Pretty,
                _ => LogFormat::Json,
            },

            log_filter: env::var("CONDUCTOR_LOG").unwrap_or(defaults.log_filter),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "conductor".to_string(),
            otlp_endpoint: None,
            log_format: LogFormat::Json,
            log_filter: "info".to_string(),
        }
    }
}
