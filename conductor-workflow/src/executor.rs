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

//! Step executor: dispatches a step definition to the handler for its kind.

use crate::agent::AgentOrchestrator;
use crate::context::WorkflowContext;
use crate::handlers::{
    AgentStepHandler, ApprovalStepHandler, ConditionStepHandler, DispatcherProvider,
    ParallelStepHandler, PluginStepHandler, StepDispatcher, StepHandler,
};
use crate::step::{StepKind, StepResult, WorkflowStepDefinition};
use async_trait::async_trait;
use conductor_hooks::HookPipeline;
use conductor_plugins::PluginRouter;
use conductor_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Hook address a guarded step runs under: `workflow:<kind>:<step-id>:before`.
/// `:` inside the kind or id is replaced by `_`.
pub fn step_event(step: &WorkflowStepDefinition) -> String {
    format!(
        "workflow:{}:{}:before",
        step.kind.as_str().replace(':', "_"),
        step.id.replace(':', "_")
    )
}

/// Dispatch table from step kind to handler.
///
/// Built through [`StepExecutor::builder`], which registers the condition,
/// approval and parallel handlers, plus the agent and plugin handlers when
/// their collaborators are supplied. Handlers for other kinds can be added
/// with [`register`](Self::register).
pub struct StepExecutor {
    handlers: RwLock<HashMap<StepKind, Arc<dyn StepHandler>>>,
    pipeline: Option<Arc<HookPipeline>>,
    metrics: Option<Arc<Metrics>>,
}

impl StepExecutor {
    pub fn builder() -> StepExecutorBuilder {
        StepExecutorBuilder::new()
    }

    /// Register `handler` for its kind, returning the handler it replaced.
    pub fn register(&self, handler: Arc<dyn StepHandler>) -> Option<Arc<dyn StepHandler>> {
        let kind = handler.kind();
        tracing::debug!(kind = %kind, "Step handler registered");
        self.handlers.write().insert(kind, handler)
    }

    pub fn has_handler(&self, kind: &StepKind) -> bool {
        self.handlers.read().contains_key(kind)
    }

    /// Registered kinds, sorted by token.
    pub fn handler_kinds(&self) -> Vec<StepKind> {
        let mut kinds: Vec<StepKind> = self.handlers.read().keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    pub fn pipeline(&self) -> Option<&Arc<HookPipeline>> {
        self.pipeline.as_ref()
    }

    /// Execute one step. Never fails: every problem is reported as a
    /// failed [`StepResult`].
    pub async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult {
        if cancel.is_cancelled() {
            return StepResult::fail(format!("step '{}' cancelled", step.id));
        }

        let handler = self.handlers.read().get(&step.kind).cloned();
        let Some(handler) = handler else {
            tracing::warn!(step_id = %step.id, kind = %step.kind, "No handler registered for step");
            return StepResult::fail(format!(
                "no handler registered for step type '{}'",
                step.kind
            ));
        };

        let start = Instant::now();
        let result = match &self.pipeline {
            Some(pipeline) => {
                Self::execute_guarded(pipeline, handler, step, Arc::clone(&ctx), cancel).await
            }
            None => handler.execute(step, Arc::clone(&ctx), cancel).await,
        };
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        if result.is_success() {
            ctx.record_output(&step.id, &result);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_step(step.kind.as_str(), result.is_success(), duration_ms);
        }

        tracing::debug!(
            step_id = %step.id,
            kind = %step.kind,
            success = result.is_success(),
            duration_ms,
            "Step executed"
        );

        result
    }

    /// Run the handler as the operation guarded by the step's hooks. A
    /// failed step result is surfaced to the pipeline as an error so
    /// on-error hooks observe it.
    async fn execute_guarded(
        pipeline: &HookPipeline,
        handler: Arc<dyn StepHandler>,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult {
        let slot: Arc<Mutex<Option<StepResult>>> = Arc::default();
        let op_slot = Arc::clone(&slot);
        let owned = step.clone();

        let outcome = pipeline
            .execute_with_token(&step_event(step), &cancel, move |guard| async move {
                let result = handler
                    .execute(&owned, ctx, guard.cancellation_token().clone())
                    .await;
                if let Some(error) = result.error() {
                    anyhow::bail!("{error}");
                }
                *op_slot.lock() = Some(result);
                Ok(())
            })
            .await;

        let guard = match outcome {
            Ok(guard) => guard,
            Err(e) => return StepResult::fail(format!("step '{}' failed: {e}", step.id)),
        };

        let stored = slot.lock().take();
        if let Some(result) = stored {
            return result;
        }
        if guard.is_cancelled() {
            return StepResult::fail(format!(
                "step '{}' cancelled: {}",
                step.id,
                guard.cancellation_reason().unwrap_or_default()
            ));
        }

        // An around hook skipped the handler or an on-error hook recovered.
        StepResult::ok(guard.result().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl StepDispatcher for StepExecutor {
    async fn dispatch(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult {
        self.execute(step, ctx, cancel).await
    }
}

/// Builder for [`StepExecutor`].
#[derive(Default)]
pub struct StepExecutorBuilder {
    agents: Option<Arc<dyn AgentOrchestrator>>,
    router: Option<Arc<PluginRouter>>,
    pipeline: Option<Arc<HookPipeline>>,
    metrics: Option<Arc<Metrics>>,
    handlers: Vec<Arc<dyn StepHandler>>,
}

impl StepExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable `agent` steps.
    pub fn with_agents(mut self, agents: Arc<dyn AgentOrchestrator>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Enable `plugin` steps.
    pub fn with_router(mut self, router: Arc<PluginRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Run every step inside `pipeline`.
    pub fn with_pipeline(mut self, pipeline: Arc<HookPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add a handler, replacing the built-in one for the same kind.
    pub fn with_handler(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> Arc<StepExecutor> {
        Arc::new_cyclic(|executor: &Weak<StepExecutor>| {
            let executor = executor.clone();
            let dispatcher: DispatcherProvider = Arc::new(move || {
                executor
                    .upgrade()
                    .map(|executor| executor as Arc<dyn StepDispatcher>)
            });

            let mut handlers: Vec<Arc<dyn StepHandler>> = vec![
                Arc::new(ConditionStepHandler),
                Arc::new(ApprovalStepHandler),
                Arc::new(ParallelStepHandler::new(dispatcher)),
            ];
            if let Some(agents) = self.agents {
                handlers.push(Arc::new(AgentStepHandler::new(agents)));
            }
            if let Some(router) = self.router {
                handlers.push(Arc::new(PluginStepHandler::new(router)));
            }
            handlers.extend(self.handlers);

            let table = handlers
                .into_iter()
                .map(|handler| (handler.kind(), handler))
                .collect();

            StepExecutor {
                handlers: RwLock::new(table),
                pipeline: self.pipeline,
                metrics: self.metrics,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VariableContext;

    struct Echo;

    #[async_trait]
    impl StepHandler for Echo {
        fn kind(&self) -> StepKind {
            StepKind::Custom("echo".into())
        }

        async fn execute(
            &self,
            step: &WorkflowStepDefinition,
            ctx: Arc<dyn WorkflowContext>,
            _cancel: CancellationToken,
        ) -> StepResult {
            StepResult::ok(ctx.resolve_template(step.input.as_deref().unwrap_or_default()))
        }
    }

    #[test]
    fn test_step_event_sanitizes_ids() {
        let step = WorkflowStepDefinition::new("build:release", StepKind::Plugin);
        assert_eq!(step_event(&step), "workflow:plugin:build_release:before");
    }

    #[test]
    fn test_default_handlers() {
        let executor = StepExecutor::builder().build();
        assert_eq!(
            executor.handler_kinds(),
            vec![StepKind::Approval, StepKind::Condition, StepKind::Parallel]
        );
        assert!(!executor.has_handler(&StepKind::Agent));
    }

    #[tokio::test]
    async fn test_register_custom_kind() {
        let executor = StepExecutor::builder().build();
        let step = WorkflowStepDefinition::new("say", "echo").with_input("hello");
        let ctx: Arc<dyn WorkflowContext> = Arc::new(VariableContext::new());

        let result = executor
            .execute(&step, Arc::clone(&ctx), CancellationToken::new())
            .await;
        assert_eq!(result.error(), Some("no handler registered for step type 'echo'"));

        assert!(executor.register(Arc::new(Echo)).is_none());
        let result = executor.execute(&step, ctx, CancellationToken::new()).await;
        assert_eq!(result.output(), "hello");
    }

    #[tokio::test]
    async fn test_cancelled_on_entry() {
        let executor = StepExecutor::builder().build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let step = WorkflowStepDefinition::new("gate", StepKind::Approval);
        let result = executor
            .execute(&step, Arc::new(VariableContext::new()), cancel)
            .await;
        assert_eq!(result.error(), Some("step 'gate' cancelled"));
    }
}
