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

//! Guard context shared by every hook of one pipeline invocation.

use crate::error::{HookError, HookResult, SharedError};
use crate::event::EventAddress;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a pipeline invocation ended without raising an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The operation ran (or is still running) without an unrecovered failure.
    Completed,
    /// A before hook cancelled the invocation; the operation never ran.
    Cancelled { reason: String },
    /// The operation failed and an on-error hook cleared the failure.
    Recovered,
}

/// State carried through one guarded-operation invocation.
///
/// Shared as `Arc<GuardContext>` between the pipeline, every hook and the
/// operation itself. All mutation goes through interior locks, so hooks only
/// ever need a shared reference.
#[derive(Debug)]
pub struct GuardContext {
    event: EventAddress,
    token: CancellationToken,
    cancelled: AtomicBool,
    cancellation_reason: RwLock<Option<String>>,
    error: RwLock<Option<SharedError>>,
    recovered: AtomicBool,
    result: RwLock<Option<serde_json::Value>>,
    properties: DashMap<String, serde_json::Value>,
}

impl GuardContext {
    pub fn new(event: EventAddress) -> Self {
        Self::with_token(event, CancellationToken::new())
    }

    /// Create a context whose external cancellation signal is a child of `parent`.
    pub fn with_parent_token(event: EventAddress, parent: &CancellationToken) -> Self {
        Self::with_token(event, parent.child_token())
    }

    fn with_token(event: EventAddress, token: CancellationToken) -> Self {
        Self {
            event,
            token,
            cancelled: AtomicBool::new(false),
            cancellation_reason: RwLock::new(None),
            error: RwLock::new(None),
            recovered: AtomicBool::new(false),
            result: RwLock::new(None),
            properties: DashMap::new(),
        }
    }

    pub fn event(&self) -> &EventAddress {
        &self.event
    }

    /// External cancellation signal ("stop waiting"). Independent of [`cancel`](Self::cancel).
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    // Cancellation

    /// Cancel the invocation in-band. Once cancelled the context stays
    /// cancelled and the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        let mut slot = self.cancellation_reason.write();
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            *slot = Some(reason.into());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancellation_reason(&self) -> Option<String> {
        self.cancellation_reason.read().clone()
    }

    // Error slot

    pub fn error(&self) -> Option<SharedError> {
        self.error.read().clone()
    }

    pub fn has_error(&self) -> bool {
        self.error.read().is_some()
    }

    pub fn set_error(&self, error: anyhow::Error) {
        *self.error.write() = Some(Arc::new(error));
    }

    /// Clear the error slot. An on-error hook calling this recovers the invocation.
    pub fn clear_error(&self) {
        *self.error.write() = None;
    }

    pub(crate) fn record_error(&self, error: SharedError) {
        *self.error.write() = Some(error);
    }

    pub(crate) fn mark_recovered(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }

    // Result slot

    pub fn result(&self) -> Option<serde_json::Value> {
        self.result.read().clone()
    }

    pub fn set_result(&self, value: impl Serialize) -> HookResult<()> {
        let value = serde_json::to_value(value).map_err(|e| HookError::PropertyType {
            key: "result".to_string(),
            reason: e.to_string(),
        })?;
        *self.result.write() = Some(value);
        Ok(())
    }

    /// Typed view of the result slot.
    pub fn result_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.result()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    // Property bag

    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: T) -> HookResult<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| HookError::PropertyType {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.properties.insert(key, value);
        Ok(())
    }

    /// Returns `None` when the key is missing or holds a value of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.try_get(key).ok()
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> HookResult<T> {
        let value = self
            .properties
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HookError::PropertyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| HookError::PropertyType {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.properties.remove(key).map(|(_, value)| value)
    }

    /// Point-in-time copy of every property.
    pub fn properties(&self) -> HashMap<String, serde_json::Value> {
        self.properties
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn outcome(&self) -> GuardOutcome {
        if let Some(reason) = self.cancellation_reason() {
            return GuardOutcome::Cancelled { reason };
        }
        if self.recovered.load(Ordering::SeqCst) {
            return GuardOutcome::Recovered;
        }
        GuardOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> GuardContext {
        GuardContext::new("agent:test:action:before".parse().unwrap())
    }

    #[test]
    fn test_cancel_is_sticky_and_keeps_first_reason() {
        let ctx = context();
        assert!(!ctx.is_cancelled());

        ctx.cancel("blocked");
        ctx.cancel("second");

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.cancellation_reason().as_deref(), Some("blocked"));
        assert_eq!(
            ctx.outcome(),
            GuardOutcome::Cancelled {
                reason: "blocked".to_string()
            }
        );
    }

    #[test]
    fn test_typed_properties() {
        let ctx = context();
        ctx.set("count", 3u32).unwrap();
        ctx.set("name", "alpha").unwrap();

        assert!(ctx.has("count"));
        assert_eq!(ctx.get::<u32>("count"), Some(3));
        assert_eq!(ctx.get::<String>("name").as_deref(), Some("alpha"));
        assert_eq!(ctx.get::<u32>("name"), None);
        assert!(matches!(
            ctx.try_get::<u32>("missing"),
            Err(HookError::PropertyNotFound(_))
        ));
        assert!(matches!(
            ctx.try_get::<u32>("name"),
            Err(HookError::PropertyType { .. })
        ));
    }

    #[test]
    fn test_properties_snapshot_is_detached() {
        let ctx = context();
        ctx.set("a", 1).unwrap();
        let snapshot = ctx.properties();
        ctx.set("b", 2).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(ctx.properties().len(), 2);
    }

    #[test]
    fn test_error_slot() {
        let ctx = context();
        assert!(!ctx.has_error());

        ctx.set_error(anyhow::anyhow!("boom"));
        assert_eq!(ctx.error().unwrap().to_string(), "boom");

        ctx.clear_error();
        assert!(ctx.error().is_none());
    }

    #[test]
    fn test_result_slot() {
        let ctx = context();
        ctx.set_result(vec!["a", "b"]).unwrap();
        assert_eq!(
            ctx.result_as::<Vec<String>>(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancellationToken::new();
        let ctx = GuardContext::with_parent_token(
            "agent:test:action:before".parse().unwrap(),
            &parent,
        );
        parent.cancel();
        assert!(ctx.cancellation_token().is_cancelled());
        assert!(!ctx.is_cancelled());
    }
}
