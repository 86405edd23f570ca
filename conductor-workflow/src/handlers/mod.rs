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

//! Step handlers, one per step kind.

mod agent;
mod approval;
mod condition;
mod parallel;
mod plugin;

pub use agent::AgentStepHandler;
pub use approval::ApprovalStepHandler;
pub use condition::{is_truthy, ConditionStepHandler};
pub use parallel::{DispatcherProvider, ParallelStepHandler};
pub use plugin::PluginStepHandler;

use crate::context::WorkflowContext;
use crate::step::{StepKind, StepResult, WorkflowStepDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Executes steps of one kind.
///
/// Handlers never return errors: every failure becomes a
/// [`StepResult::fail`] naming what failed.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// The step kind this handler is registered for
    fn kind(&self) -> StepKind;

    async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult;
}

/// Runs a step of any kind. Implemented by
/// [`StepExecutor`](crate::StepExecutor); handlers that run nested steps
/// depend on this instead of the executor itself.
#[async_trait]
pub trait StepDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult;
}

fn missing_field(step: &WorkflowStepDefinition, field: &str) -> StepResult {
    StepResult::fail(format!(
        "step '{}' of type '{}' requires '{}'",
        step.id, step.kind, field
    ))
}
