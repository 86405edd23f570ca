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

//! Conductor hook pipeline.
//!
//! Hooks intercept guarded operations addressed by a four-segment event
//! string `domain:component:action:timing`. A [`HookPipeline`] runs the
//! matching hooks around an operation:
//!
//! - **before** hooks run first and may cancel the invocation
//! - **around** hooks wrap the operation and decide whether to continue
//! - **after** hooks run once the operation succeeds
//! - **on-error** hooks observe failures and may clear them
//!
//! # Example
//!
//! ```rust,no_run
//! use conductor_hooks::{Hook, HookPipeline, HookRegistry, HookTiming};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(HookRegistry::new());
//! registry.register(Hook::from_fn(
//!     "audit",
//!     "agent:*:*:before",
//!     HookTiming::Before,
//!     |ctx| async move {
//!         tracing::info!(event = %ctx.event(), "audit");
//!         Ok(())
//!     },
//! ));
//!
//! let pipeline = HookPipeline::new(registry);
//! pipeline
//!     .execute("agent:chat:send:before", |_ctx| async { Ok(()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod executor;
pub mod handler;
pub mod pipeline;
pub mod registry;

pub use config::PipelineConfig;
pub use context::{GuardContext, GuardOutcome};
pub use error::{HookError, HookResult, SharedError};
pub use event::{EventAddress, EventPattern, HookTiming};
pub use executor::HookExecutor;
pub use handler::{AroundFnHandler, FnHandler, HookFuture, HookHandler, Next};
pub use pipeline::{HookPipeline, HookPipelineBuilder, PipelineStats};
pub use registry::{Hook, HookPriority, HookRegistry};
