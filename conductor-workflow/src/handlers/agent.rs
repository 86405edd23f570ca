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
use crate::agent::AgentOrchestrator;
use crate::context::WorkflowContext;
use crate::step::{StepKind, StepResult, WorkflowStepDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sends the step input to an agent in a fresh session and returns the reply.
pub struct AgentStepHandler {
    orchestrator: Arc<dyn AgentOrchestrator>,
}

impl AgentStepHandler {
    pub fn new(orchestrator: Arc<dyn AgentOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl StepHandler for AgentStepHandler {
    fn kind(&self) -> StepKind {
        StepKind::Agent
    }

    async fn execute(
        &self,
        step: &WorkflowStepDefinition,
        ctx: Arc<dyn WorkflowContext>,
        cancel: CancellationToken,
    ) -> StepResult {
        let Some(agent) = step.agent.as_deref() else {
            return missing_field(step, "agent");
        };
        let input = ctx.resolve_template(step.input.as_deref().unwrap_or_default());

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StepResult::fail(format!("{agent}: cancelled")),
            opened = self.orchestrator.open_session(agent) => opened,
        };
        let mut session = match opened {
            Ok(session) => session,
            Err(e) => return StepResult::fail(format!("{agent}: {e:#}")),
        };

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            reply = session.send(&input) => Some(reply),
        };

        // The session is closed on every path once opened.
        if let Err(e) = session.close().await {
            tracing::warn!(step_id = %step.id, agent = %agent, error = %e, "Failed to close agent session");
        }

        match reply {
            Some(Ok(text)) => StepResult::ok(text),
            Some(Err(e)) => StepResult::fail(format!("{agent}: {e:#}")),
            None => StepResult::fail(format!("{agent}: cancelled")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentSession;
    use crate::context::VariableContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeAgents {
        closed: Arc<AtomicUsize>,
    }

    struct FakeSession {
        agent: String,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AgentOrchestrator for FakeAgents {
        async fn open_session(&self, agent: &str) -> anyhow::Result<Box<dyn AgentSession>> {
            anyhow::ensure!(agent != "ghost", "unknown agent");
            Ok(Box::new(FakeSession {
                agent: agent.to_string(),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl AgentSession for FakeSession {
        async fn send(&mut self, message: &str) -> anyhow::Result<String> {
            match self.agent.as_str() {
                "broken" => anyhow::bail!("model overloaded"),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(String::new())
                }
                _ => Ok(format!("{} says: {message}", self.agent)),
            }
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handler() -> (AgentStepHandler, Arc<AtomicUsize>) {
        let agents = FakeAgents::default();
        let closed = Arc::clone(&agents.closed);
        (AgentStepHandler::new(Arc::new(agents)), closed)
    }

    fn context() -> Arc<dyn WorkflowContext> {
        let ctx = VariableContext::new();
        ctx.set_variable("topic", "release notes");
        Arc::new(ctx)
    }

    #[tokio::test]
    async fn test_agent_reply() {
        let (handler, closed) = handler();
        let step = WorkflowStepDefinition::new("ask", StepKind::Agent)
            .with_agent("writer")
            .with_input("Draft {{topic}}");

        let result = handler.execute(&step, context(), CancellationToken::new()).await;
        assert_eq!(result.output(), "writer says: Draft release notes");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_failure_still_closes_session() {
        let (handler, closed) = handler();
        let step = WorkflowStepDefinition::new("ask", StepKind::Agent).with_agent("broken");

        let result = handler.execute(&step, context(), CancellationToken::new()).await;
        assert_eq!(result.error(), Some("broken: model overloaded"));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let (handler, closed) = handler();
        let step = WorkflowStepDefinition::new("ask", StepKind::Agent).with_agent("ghost");

        let result = handler.execute(&step, context(), CancellationToken::new()).await;
        assert_eq!(result.error(), Some("ghost: unknown agent"));
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_while_waiting() {
        let (handler, closed) = handler();
        let step = WorkflowStepDefinition::new("ask", StepKind::Agent).with_agent("slow");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = handler.execute(&step, context(), cancel).await;
        assert_eq!(result.error(), Some("slow: cancelled"));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_agent() {
        let (handler, _) = handler();
        let step = WorkflowStepDefinition::new("ask", StepKind::Agent);
        let result = handler.execute(&step, context(), CancellationToken::new()).await;
        assert!(result.error().unwrap().contains("requires 'agent'"));
    }
}
