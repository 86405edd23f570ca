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

//! Conductor workflow step orchestration.
//!
//! A [`StepExecutor`] dispatches each [`WorkflowStepDefinition`] to the
//! [`StepHandler`] registered for its kind. Five kinds are built in:
//!
//! - `agent`: send one message to a named agent
//! - `plugin`: invoke a plugin action through the [`PluginRouter`](conductor_plugins::PluginRouter)
//! - `condition`: evaluate a template to a boolean
//! - `parallel`: run child steps concurrently and aggregate their results
//! - `approval`: pause the workflow until an external resume
//!
//! Steps never return errors. Every failure is a [`StepResult`] carrying a
//! message that names what failed.
//!
//! # Example
//!
//! ```rust,no_run
//! use conductor_workflow::{StepExecutor, StepKind, VariableContext, WorkflowStepDefinition};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let executor = StepExecutor::builder().build();
//! let step = WorkflowStepDefinition::new("fan", StepKind::Parallel).with_steps([
//!     WorkflowStepDefinition::new("tests", StepKind::Condition).with_condition("{{tests_passed}}"),
//!     WorkflowStepDefinition::new("review", StepKind::Approval),
//! ]);
//!
//! let ctx = Arc::new(VariableContext::new());
//! ctx.set_variable("tests_passed", "true");
//! let result = executor.execute(&step, ctx, CancellationToken::new()).await;
//! assert!(result.is_success());
//! # }
//! ```

pub mod agent;
pub mod context;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod step;

pub use agent::{AgentOrchestrator, AgentSession};
pub use context::{VariableContext, WorkflowContext};
pub use error::{WorkflowError, WorkflowResult};
pub use executor::{step_event, StepExecutor, StepExecutorBuilder};
pub use handlers::{
    is_truthy, AgentStepHandler, ApprovalStepHandler, ConditionStepHandler, DispatcherProvider,
    ParallelStepHandler, PluginStepHandler, StepDispatcher, StepHandler,
};
pub use step::{ApprovalPending, StepKind, StepResult, WorkflowStepDefinition, APPROVAL_PENDING_KEY};
