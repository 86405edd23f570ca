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

//! Workflow error types

use thiserror::Error;

/// Result type for workflow configuration operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors raised while building workflow definitions.
///
/// Step execution never returns these; a failing step yields
/// [`StepResult::fail`](crate::StepResult::fail).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid step definition: {0}")]
    InvalidDefinition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for WorkflowError {
    fn from(e: serde_json::Error) -> Self {
        WorkflowError::Serialization(e.to_string())
    }
}
