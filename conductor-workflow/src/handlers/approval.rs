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

use super::StepHandler;
use crate::context::WorkflowContext;
use crate::step::{ApprovalPending, StepKind, StepResult, WorkflowStepDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Pauses the workflow until an external approval resumes it.
///
/// The step succeeds immediately with an [`ApprovalPending`] payload; the
/// workflow runner is expected to checkpoint on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApprovalStepHandler;

impl ApprovalStepHandler {
    pub fn new() -> Self {
        Self
    }

    fn message(step: &WorkflowStepDefinition, ctx: &dyn WorkflowContext) -> String {
        let template = step
            .parameters
            .get("message")
            .and_then(|v| v.as_str())
            .or(step.input.as_deref())
            .filter(|m| !m.trim().is_empty());

        match template {
            Some(template) => ctx.resolve_template(template),
            None => format!("Approval required for step '{}'", step.id),
        }
    }
}

#[async_trait]
impl StepHandler for ApprovalStepHandler {
    fn kind(&self) -> StepKind {
        StepKind::Approval
    }

    async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        _cancel: CancellationToken,
    ) -> StepResult {
        let pending = ApprovalPending {
            step_id: step.id.clone(),
            message: Self::message(step, ctx.as_ref()),
            execution_id: ctx.execution_id().to_string(),
        };

        tracing::info!(
            step_id = %pending.step_id,
            execution_id = %pending.execution_id,
            "Workflow awaiting approval"
        );

        StepResult::awaiting_approval(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VariableContext;
    use serde_json::json;

    async fn run(step: WorkflowStepDefinition) -> StepResult {
        let ctx = VariableContext::with_execution_id("exec-42");
        ctx.set_variable("branch", "release/2.1");
        ApprovalStepHandler
            .execute(&step, Arc::new(ctx), CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_message_parameter_wins() {
        let step = WorkflowStepDefinition::new("gate", StepKind::Approval)
            .with_parameter("message", "Merge {{branch}}?")
            .with_input("ignored");

        let result = run(step).await;
        assert!(result.is_success());
        assert_eq!(
            result.approval_pending(),
            Some(ApprovalPending {
                step_id: "gate".into(),
                message: "Merge release/2.1?".into(),
                execution_id: "exec-42".into(),
            })
        );
        assert_eq!(
            result.output()["approval_pending"]["executionId"],
            json!("exec-42")
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_input_then_default() {
        let step = WorkflowStepDefinition::new("gate", StepKind::Approval)
            .with_input("Deploy {{branch}}");
        assert_eq!(run(step).await.approval_pending().unwrap().message, "Deploy release/2.1");

        let step = WorkflowStepDefinition::new("gate", StepKind::Approval);
        assert_eq!(
            run(step).await.approval_pending().unwrap().message,
            "Approval required for step 'gate'"
        );
    }
}
