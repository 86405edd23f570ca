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

//! Hook handler traits and closure adapters.

use crate::context::GuardContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Boxed future produced by a continuation.
pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Routine executed by a hook.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Flat routine used for before, after and on-error timings.
    async fn handle(&self, ctx: Arc<GuardContext>) -> anyhow::Result<()>;

    /// Around routine. The default runs [`handle`](Self::handle) and then
    /// continues down the chain.
    async fn around(&self, ctx: Arc<GuardContext>, next: Next) -> anyhow::Result<()> {
        self.handle(ctx).await?;
        next.run().await
    }
}

/// Continuation handed to an around hook. Consumed by [`run`](Self::run), so
/// the rest of the chain executes at most once.
pub struct Next {
    inner: Box<dyn FnOnce() -> HookFuture + Send>,
}

impl Next {
    pub fn new(f: impl FnOnce() -> HookFuture + Send + 'static) -> Self {
        Self { inner: Box::new(f) }
    }

    /// Continuation that does nothing.
    pub fn noop() -> Self {
        Self::new(|| async { Ok(()) }.boxed())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        (self.inner)().await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Flat hook backed by a closure.
pub struct FnHandler<F> {
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Arc<GuardContext>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> HookHandler for FnHandler<F>
where
    F: Fn(Arc<GuardContext>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<GuardContext>) -> anyhow::Result<()> {
        (self.f)(ctx).await
    }
}

/// Around hook backed by a closure receiving the continuation.
pub struct AroundFnHandler<F> {
    f: F,
}

impl<F, Fut> AroundFnHandler<F>
where
    F: Fn(Arc<GuardContext>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> HookHandler for AroundFnHandler<F>
where
    F: Fn(Arc<GuardContext>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<GuardContext>) -> anyhow::Result<()> {
        (self.f)(ctx, Next::noop()).await
    }

    async fn around(&self, ctx: Arc<GuardContext>, next: Next) -> anyhow::Result<()> {
        (self.f)(ctx, next).await
    }
}
