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

//! Hook executor: runs ordered hook lists against a shared context.
//!
//! Hooks of one invocation always run sequentially on the caller's flow.

use crate::config::PipelineConfig;
use crate::context::GuardContext;
use crate::error::HookError;
use crate::handler::Next;
use crate::registry::Hook;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct HookExecutor {
    timeout: Option<Duration>,
}

impl HookExecutor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            timeout: config.hook_timeout(),
        }
    }

    /// Run before hooks in order. Stops (without error) as soon as a hook
    /// leaves the context cancelled; a failing hook aborts the loop.
    pub async fn execute_before(&self, hooks: &[Hook], ctx: &Arc<GuardContext>) -> anyhow::Result<()> {
        for hook in hooks {
            self.invoke(hook, ctx).await?;

            if ctx.is_cancelled() {
                tracing::debug!(
                    hook = %hook.name,
                    event = %ctx.event(),
                    "Before hook cancelled the invocation"
                );
                break;
            }
        }
        Ok(())
    }

    /// Run after hooks in order. A failing hook aborts the loop.
    pub async fn execute_after(&self, hooks: &[Hook], ctx: &Arc<GuardContext>) -> anyhow::Result<()> {
        for hook in hooks {
            self.invoke(hook, ctx).await?;
        }
        Ok(())
    }

    /// Run every on-error hook. Failures are logged and swallowed so one
    /// broken recovery hook cannot hide the others.
    pub async fn execute_on_error(&self, hooks: &[Hook], ctx: &Arc<GuardContext>) {
        for hook in hooks {
            if let Err(e) = self.invoke(hook, ctx).await {
                tracing::error!(
                    hook = %hook.name,
                    event = %ctx.event(),
                    error = %format!("{e:#}"),
                    "On-error hook failed"
                );
            }
        }
    }

    /// Run one around hook with the supplied continuation.
    pub async fn execute_around(
        &self,
        hook: &Hook,
        ctx: Arc<GuardContext>,
        next: Next,
    ) -> anyhow::Result<()> {
        hook.handler.around(ctx, next).await
    }

    async fn invoke(&self, hook: &Hook, ctx: &Arc<GuardContext>) -> anyhow::Result<()> {
        let fut = hook.handler.handle(Arc::clone(ctx));

        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(HookError::Timeout {
                    hook: hook.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into()),
            },
            None => fut.await,
        }
    }
}
