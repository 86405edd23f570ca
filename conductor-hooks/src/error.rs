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

//! Hook error types

use std::sync::Arc;
use thiserror::Error;

/// Result type for hook operations
pub type HookResult<T> = Result<T, HookError>;

/// A guarded-operation failure shared between the error slot and the caller.
pub type SharedError = Arc<anyhow::Error>;

/// Errors that can occur in the hook system
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Invalid event address '{input}': {reason} (expected 'domain:component:action:timing')")]
    InvalidEventAddress { input: String, reason: String },

    #[error("Unknown hook timing '{0}' (expected one of: before, after, onerror, around)")]
    UnknownTiming(String),

    #[error("Hook '{hook}' timed out after {timeout_ms}ms")]
    Timeout { hook: String, timeout_ms: u64 },

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Property '{key}' has an unexpected type: {reason}")]
    PropertyType { key: String, reason: String },

    #[error("Hook configuration error: {0}")]
    Config(String),

    /// The guarded operation (or a hook around it) failed and no on-error
    /// hook cleared the failure. Carries the original error.
    #[error("{0:#}")]
    Guarded(SharedError),
}

impl HookError {
    /// The original failure when this is a propagated guarded-operation error.
    pub fn guarded(&self) -> Option<&anyhow::Error> {
        match self {
            HookError::Guarded(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HookError {
    fn from(e: serde_json::Error) -> Self {
        HookError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for HookError {
    fn from(e: toml::de::Error) -> Self {
        HookError::Config(e.to_string())
    }
}
