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

//! Hook registry for managing registered interceptors.

use crate::context::GuardContext;
use crate::event::{EventAddress, EventPattern, HookTiming};
use crate::handler::{AroundFnHandler, FnHandler, HookHandler, Next};
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Priority level for hook execution.
/// Lower values execute first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookPriority(pub i32);

impl Default for HookPriority {
    fn default() -> Self {
        HookPriority(100)
    }
}

impl HookPriority {
    /// Highest priority (executes first).
    pub const HIGHEST: HookPriority = HookPriority(0);
    /// High priority.
    pub const HIGH: HookPriority = HookPriority(50);
    /// Normal priority.
    pub const NORMAL: HookPriority = HookPriority(100);
    /// Low priority.
    pub const LOW: HookPriority = HookPriority(500);
    /// Lowest priority (executes last).
    pub const LOWEST: HookPriority = HookPriority(1000);
}

impl From<i32> for HookPriority {
    fn from(value: i32) -> Self {
        HookPriority(value)
    }
}

/// A named interceptor bound to an event pattern and timing.
#[derive(Clone)]
pub struct Hook {
    /// Unique name. Registering another hook with the same name replaces it.
    pub name: String,
    pub pattern: EventPattern,
    pub timing: HookTiming,
    pub priority: HookPriority,
    pub handler: Arc<dyn HookHandler>,
    pub description: Option<String>,
}

impl Hook {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<EventPattern>,
        timing: HookTiming,
        handler: Arc<dyn HookHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            timing,
            priority: HookPriority::default(),
            handler,
            description: None,
        }
    }

    /// Flat hook (before, after or on-error) from a closure.
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        pattern: impl Into<EventPattern>,
        timing: HookTiming,
        f: F,
    ) -> Self
    where
        F: Fn(Arc<GuardContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(name, pattern, timing, Arc::new(FnHandler::new(f)))
    }

    /// Around hook from a closure that receives the continuation.
    pub fn around_fn<F, Fut>(name: impl Into<String>, pattern: impl Into<EventPattern>, f: F) -> Self
    where
        F: Fn(Arc<GuardContext>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(
            name,
            pattern,
            HookTiming::Around,
            Arc::new(AroundFnHandler::new(f)),
        )
    }

    /// Set the priority for this hook.
    pub fn with_priority(mut self, priority: impl Into<HookPriority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Set the description for this hook.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("timing", &self.timing)
            .field("priority", &self.priority)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

struct Entry {
    hook: Hook,
    seq: u64,
}

/// Registry of interceptors keyed by name.
///
/// Backed by a sharded-lock map so registrations and lookups from concurrent
/// flows never lose an update. Lookups return owned, sorted snapshots.
pub struct HookRegistry {
    hooks: DashMap<String, Entry>,
    next_seq: AtomicU64,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Create a new empty hook registry.
    pub fn new() -> Self {
        Self {
            hooks: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a hook, replacing any hook with the same name.
    /// Returns the replaced hook.
    pub fn register(&self, hook: Hook) -> Option<Hook> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let name = hook.name.clone();

        tracing::info!(
            hook = %name,
            pattern = %hook.pattern,
            timing = %hook.timing,
            priority = hook.priority.0,
            "Hook registered"
        );

        self.hooks
            .insert(name, Entry { hook, seq })
            .map(|previous| previous.hook)
    }

    /// Remove a hook by name. Returns whether a hook was removed.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.hooks.remove(name).is_some();
        if removed {
            tracing::info!(hook = %name, "Hook deregistered");
        }
        removed
    }

    /// Hooks whose pattern matches `address`, restricted to `timing` when
    /// given, in ascending priority order. Equal priorities keep
    /// registration order.
    pub fn get_matching_hooks(
        &self,
        address: &EventAddress,
        timing: Option<HookTiming>,
    ) -> Vec<Hook> {
        let address = address.to_string();

        let mut matched: Vec<(HookPriority, u64, Hook)> = self
            .hooks
            .iter()
            .filter(|entry| timing.map_or(true, |t| entry.hook.timing == t))
            .filter(|entry| entry.hook.pattern.matches_str(&address))
            .map(|entry| (entry.hook.priority, entry.seq, entry.hook.clone()))
            .collect();

        matched.sort_by_key(|(priority, seq, _)| (*priority, *seq));
        matched.into_iter().map(|(_, _, hook)| hook).collect()
    }

    /// Get a hook by name.
    pub fn get(&self, name: &str) -> Option<Hook> {
        self.hooks.get(name).map(|entry| entry.hook.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// List all registered hooks.
    pub fn list_hooks(&self) -> Vec<Hook> {
        self.hooks.iter().map(|entry| entry.hook.clone()).collect()
    }

    /// Get the number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Remove every hook matching `predicate`. Returns how many
    /// were removed.
    pub fn deregister_where(&self, predicate: impl Fn(&Hook) -> bool) -> usize {
        let before = self.hooks.len();
        self.hooks.retain(|_, entry| !predicate(&entry.hook));
        before.saturating_sub(self.hooks.len())
    }

    /// Clear all hooks.
    pub fn clear(&self) {
        self.hooks.clear();
    }
}
