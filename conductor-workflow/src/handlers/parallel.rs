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

use super::{StepDispatcher, StepHandler};
use crate::context::WorkflowContext;
use crate::step::{StepKind, StepResult, WorkflowStepDefinition};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lazily supplies the dispatcher that runs child steps. The dispatcher
/// owns this handler, so it cannot be handed over at construction time.
pub type DispatcherProvider = Arc<dyn Fn() -> Option<Arc<dyn StepDispatcher>> + Send + Sync>;

/// Runs every child step concurrently and waits for all of them.
///
/// A failing child does not cancel its siblings. The step fails when any
/// child failed, with every child error in the message.
pub struct ParallelStepHandler {
    dispatcher: DispatcherProvider,
}

impl ParallelStepHandler {
    pub fn new(dispatcher: DispatcherProvider) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl StepHandler for ParallelStepHandler {
    fn kind(&self) -> StepKind {
        StepKind::Parallel
    }

    async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult {
        if step.steps.is_empty() {
            return StepResult::fail(format!("parallel step '{}' has no child steps", step.id));
        }
        let Some(dispatcher) = (self.dispatcher)() else {
            return StepResult::fail(format!(
                "parallel step '{}' has no step dispatcher available",
                step.id
            ));
        };

        let total = step.steps.len();
        let results = join_all(
            step.steps
                .iter()
                .map(|child| dispatcher.dispatch(child, Arc::clone(&ctx), cancel.clone())),
        )
        .await;

        let errors: Vec<String> = step
            .steps
            .iter()
            .zip(&results)
            .filter(|(_, result)| !result.is_success())
            .map(|(child, result)| {
                result
                    .error()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("step '{}' failed", child.id))
            })
            .collect();

        if errors.is_empty() {
            tracing::debug!(step_id = %step.id, children = total, "Parallel step completed");
            StepResult::ok(format!("{total} parallel steps completed"))
        } else {
            tracing::debug!(
                step_id = %step.id,
                children = total,
                failed = errors.len(),
                "Parallel step failed"
            );
            StepResult::fail(format!(
                "{} of {} parallel steps failed: {}",
                errors.len(),
                total,
                errors.join("; ")
            ))
        }
    }
}
