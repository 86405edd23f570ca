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
use conductor_plugins::PluginRouter;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Invokes a plugin action resolved through the [`PluginRouter`].
pub struct PluginStepHandler {
    router: Arc<PluginRouter>,
}

impl PluginStepHandler {
    pub fn new(router: Arc<PluginRouter>) -> Self {
        Self { router }
    }
}

/// Resolve templates in top-level string parameters. Nested values are
/// passed through untouched.
fn resolve_parameters(parameters: &Map<String, Value>, ctx: &dyn WorkflowContext) -> Value {
    Value::Object(
        parameters
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => Value::String(ctx.resolve_template(s)),
                    other => other.clone(),
                };
                (key.clone(), value)
            })
            .collect(),
    )
}

#[async_trait]
impl StepHandler for PluginStepHandler {
    fn kind(&self) -> StepKind {
        StepKind::Plugin
    }

    async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult {
        let Some(plugin_name) = step.plugin.as_deref() else {
            return missing_field(step, "plugin");
        };
        let action = step.action.as_deref().unwrap_or(&step.id);
        let params = resolve_parameters(&step.parameters, ctx.as_ref());

        let call = async {
            let plugin = self.router.resolve(plugin_name).await?;
            plugin.execute(action, params).await
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return StepResult::fail(format!("{plugin_name}:{action} cancelled"));
            }
            outcome = call => outcome,
        };

        match outcome {
            Ok(result) if result.success => StepResult::ok(result.output),
            Ok(result) => {
                StepResult::fail(result.error.unwrap_or_else(|| "plugin action failed".to_string()))
            }
            Err(e) => StepResult::fail(format!("{plugin_name}:{action} failed: {e}")),
        }
    }
}
