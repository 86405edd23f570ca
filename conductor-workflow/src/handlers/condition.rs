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

use super::{missing_field, StepHandler};
use crate::context::WorkflowContext;
use crate::step::{StepKind, StepResult, WorkflowStepDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Truthiness of a resolved condition: false for empty or whitespace-only
/// text, `false` in any case, and exactly `0`. Everything else is true.
pub fn is_truthy(value: &str) -> bool {
    !(value.trim().is_empty() || value.eq_ignore_ascii_case("false") || value == "0")
}

/// Evaluates `condition` to a boolean output.
#[derive(Debug, Default)]
pub struct ConditionStepHandler;

#[async_trait]
impl StepHandler for ConditionStepHandler {
    fn kind(&self) -> StepKind {
        StepKind::Condition
    }

    async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        _cancel: CancellationToken,
    ) -> StepResult {
        let Some(expression) = step.condition.as_deref() else {
            return missing_field(step, "condition");
        };

        let resolved = ctx.resolve_template(expression);
        StepResult::ok(is_truthy(&resolved))
    }
}
