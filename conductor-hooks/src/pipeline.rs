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

//! Hook pipeline: drives the before/around/after/on-error protocol around a
//! guarded operation.
//!
//! # Protocol
//!
//! 1. Parse the event address and build (or reuse) the [`GuardContext`].
//! 2. Query the registry once per timing bucket.
//! 3. Fast path: with no matching hooks at all the operation runs directly,
//!    with no instrumentation.
//! 4. Before hooks run; a cancelled context returns immediately.
//! 5. Around hooks wrap the operation, first priority outermost.
//! 6. After hooks run on success.
//! 7. Any failure in 5-6 lands in the error slot, on-error hooks run, and the
//!    original error is returned unless a hook cleared the slot.

use crate::config::PipelineConfig;
use crate::context::GuardContext;
use crate::error::{HookError, HookResult, SharedError};
use crate::event::{EventAddress, HookTiming};
use crate::executor::HookExecutor;
use crate::handler::{HookFuture, Next};
use crate::registry::{Hook, HookRegistry};
use conductor_telemetry::Metrics;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Point-in-time pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Invocations that went through the instrumented (non-fast) path.
    pub invocations: u64,
    /// Invocations short-circuited by a before hook.
    pub cancellations: u64,
    /// Invocations with no matching hooks.
    pub fast_path: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    invocations: AtomicU64,
    cancellations: AtomicU64,
    fast_path: AtomicU64,
}

struct Buckets {
    before: Vec<Hook>,
    after: Vec<Hook>,
    on_error: Vec<Hook>,
    around: Vec<Hook>,
}

impl Buckets {
    fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.after.is_empty()
            && self.on_error.is_empty()
            && self.around.is_empty()
    }
}

/// Facade that guards operations with the hooks registered in a [`HookRegistry`].
pub struct HookPipeline {
    registry: Arc<HookRegistry>,
    executor: HookExecutor,
    config: PipelineConfig,
    metrics: Option<Arc<Metrics>>,
    stats: StatCounters,
}

impl HookPipeline {
    /// Create a pipeline with default configuration and no metrics.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        HookPipelineBuilder::new().with_registry(registry).build()
    }

    pub fn builder() -> HookPipelineBuilder {
        HookPipelineBuilder::new()
    }

    /// Run `operation` guarded by the hooks matching `event`.
    pub async fn execute<F, Fut>(&self, event: &str, operation: F) -> HookResult<Arc<GuardContext>>
    where
        F: FnOnce(Arc<GuardContext>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let address = EventAddress::parse(event)?;
        self.execute_in(Arc::new(GuardContext::new(address)), operation)
            .await
    }

    /// Like [`execute`](Self::execute), with the context's external
    /// cancellation token derived from `token`.
    pub async fn execute_with_token<F, Fut>(
        &self,
        event: &str,
        token: &CancellationToken,
        operation: F,
    ) -> HookResult<Arc<GuardContext>>
    where
        F: FnOnce(Arc<GuardContext>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let address = EventAddress::parse(event)?;
        self.execute_in(
            Arc::new(GuardContext::with_parent_token(address, token)),
            operation,
        )
        .await
    }

    /// Run `operation` with a caller-supplied context.
    pub async fn execute_in<F, Fut>(
        &self,
        ctx: Arc<GuardContext>,
        operation: F,
    ) -> HookResult<Arc<GuardContext>>
    where
        F: FnOnce(Arc<GuardContext>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let buckets = self.buckets(ctx.event());

        if buckets.is_empty() {
            tracing::trace!(event = %ctx.event(), "No hooks matched, running operation directly");
            self.stats.fast_path.fetch_add(1, Ordering::Relaxed);
            operation(Arc::clone(&ctx))
                .await
                .map_err(|e| HookError::Guarded(Arc::new(e)))?;
            return Ok(ctx);
        }

        let start = Instant::now();
        self.stats.invocations.fetch_add(1, Ordering::Relaxed);

        let result = self.run_guarded(buckets, Arc::clone(&ctx), operation).await;

        if self.config.enable_metrics {
            if let Some(metrics) = &self.metrics {
                metrics.record_pipeline(
                    ctx.event().domain(),
                    start.elapsed().as_secs_f64() * 1000.0,
                );
            }
        }

        result.map(|()| ctx)
    }

    async fn run_guarded<F, Fut>(
        &self,
        buckets: Buckets,
        ctx: Arc<GuardContext>,
        operation: F,
    ) -> HookResult<()>
    where
        F: FnOnce(Arc<GuardContext>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let Buckets {
            before,
            after,
            on_error,
            around,
        } = buckets;

        // A failing before hook fills the error slot but skips on-error hooks.
        if let Err(e) = self.executor.execute_before(&before, &ctx).await {
            let error: SharedError = Arc::new(e);
            ctx.record_error(Arc::clone(&error));
            return Err(HookError::Guarded(error));
        }

        if ctx.is_cancelled() {
            tracing::info!(
                event = %ctx.event(),
                reason = %ctx.cancellation_reason().unwrap_or_default(),
                "Guarded operation cancelled"
            );
            self.stats.cancellations.fetch_add(1, Ordering::Relaxed);
            if self.config.enable_metrics {
                if let Some(metrics) = &self.metrics {
                    metrics.record_pipeline_cancelled(ctx.event().domain());
                }
            }
            return Ok(());
        }

        let chain = self.compose(around, &ctx, operation);

        let outcome = match chain.run().await {
            Ok(()) => self.executor.execute_after(&after, &ctx).await,
            Err(e) => Err(e),
        };

        let Err(error) = outcome else {
            return Ok(());
        };

        let original: SharedError = Arc::new(error);
        ctx.record_error(Arc::clone(&original));

        if !on_error.is_empty() {
            self.executor.execute_on_error(&on_error, &ctx).await;
        }

        if ctx.has_error() {
            tracing::debug!(
                event = %ctx.event(),
                error = %format!("{original:#}"),
                "Guarded operation failed"
            );
            return Err(HookError::Guarded(original));
        }

        tracing::debug!(event = %ctx.event(), "Guarded operation failure recovered by on-error hook");
        ctx.mark_recovered();
        Ok(())
    }

    /// Wrap `operation` in the around hooks. Hooks arrive in ascending
    /// priority order and are applied in reverse so the first one ends up
    /// outermost.
    fn compose<F, Fut>(&self, around: Vec<Hook>, ctx: &Arc<GuardContext>, operation: F) -> Next
    where
        F: FnOnce(Arc<GuardContext>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let op_ctx = Arc::clone(ctx);
        let mut next = Next::new(move || -> HookFuture { operation(op_ctx).boxed() });

        for hook in around.into_iter().rev() {
            let executor = self.executor.clone();
            let ctx = Arc::clone(ctx);
            let inner = next;
            next = Next::new(move || -> HookFuture {
                async move { executor.execute_around(&hook, ctx, inner).await }.boxed()
            });
        }

        next
    }

    fn buckets(&self, address: &EventAddress) -> Buckets {
        Buckets {
            before: self.registry.get_matching_hooks(address, Some(HookTiming::Before)),
            after: self.registry.get_matching_hooks(address, Some(HookTiming::After)),
            on_error: self.registry.get_matching_hooks(address, Some(HookTiming::OnError)),
            around: self.registry.get_matching_hooks(address, Some(HookTiming::Around)),
        }
    }

    /// Get the registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Get the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            invocations: self.stats.invocations.load(Ordering::Relaxed),
            cancellations: self.stats.cancellations.load(Ordering::Relaxed),
            fast_path: self.stats.fast_path.load(Ordering::Relaxed),
        }
    }
}

/// Builder for creating a HookPipeline with custom settings.
pub struct HookPipelineBuilder {
    registry: Option<Arc<HookRegistry>>,
    config: PipelineConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Default for HookPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HookPipelineBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            config: PipelineConfig::default(),
            metrics: None,
        }
    }

    /// Set the hook registry.
    pub fn with_registry(mut self, registry: Arc<HookRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the per-hook timeout.
    pub fn with_hook_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.hook_timeout_ms = Some(timeout_ms);
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> HookPipeline {
        let registry = self.registry.unwrap_or_else(|| Arc::new(HookRegistry::new()));
        HookPipeline {
            registry,
            executor: HookExecutor::new(&self.config),
            config: self.config,
            metrics: self.metrics,
            stats: StatCounters::default(),
        }
    }
}
