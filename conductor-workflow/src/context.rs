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

//! Workflow context: the per-execution state step handlers read from.

use crate::step::StepResult;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

/// State shared by every step of one workflow execution.
pub trait WorkflowContext: Send + Sync {
    /// Identifier used to resume a paused execution
    fn execution_id(&self) -> &str;

    /// Substitute variables into a free-text template.
    fn resolve_template(&self, template: &str) -> String;

    /// Called by the step executor after each successful step.
    fn record_output(&self, _step_id: &str, _result: &StepResult) {}
}

const STEPS_PREFIX: &str = "steps.";
const OUTPUT_SUFFIX: &str = ".output";

/// `{{ key }}` with no braces inside the key.
static PLACEHOLDER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").ok());

/// In-memory [`WorkflowContext`] with `{{name}}` variables and
/// `{{steps.<id>.output}}` references. Unknown placeholders are left as-is.
#[derive(Debug)]
pub struct VariableContext {
    execution_id: String,
    variables: RwLock<HashMap<String, String>>,
    step_outputs: RwLock<HashMap<String, Value>>,
}

impl Default for VariableContext {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableContext {
    /// New context with a generated execution id.
    pub fn new() -> Self {
        Self::with_execution_id(uuid::Uuid::new_v4().to_string())
    }

    /// New context resuming `execution_id`.
    pub fn with_execution_id(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            variables: RwLock::new(HashMap::new()),
            step_outputs: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.write().insert(name.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.read().get(name).cloned()
    }

    pub fn record_step_output(&self, step_id: impl Into<String>, output: Value) {
        self.step_outputs.write().insert(step_id.into(), output);
    }

    pub fn step_output(&self, step_id: &str) -> Option<Value> {
        self.step_outputs.read().get(step_id).cloned()
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(step_id) = key
            .strip_prefix(STEPS_PREFIX)
            .and_then(|rest| rest.strip_suffix(OUTPUT_SUFFIX))
        {
            return self.step_output(step_id).map(|output| match output {
                Value::String(s) => s,
                other => other.to_string(),
            });
        }
        self.variable(key)
    }
}

impl WorkflowContext for VariableContext {
    fn execution_id(&self) -> &str {
        &self.execution_id
    }

    fn resolve_template(&self, template: &str) -> String {
        let Some(placeholder) = PLACEHOLDER.as_ref() else {
            return template.to_string();
        };
        placeholder
            .replace_all(template, |caps: &Captures| {
                self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn record_output(&self, step_id: &str, result: &StepResult) {
        self.record_step_output(step_id, result.output().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_execution_ids_are_unique() {
        assert_ne!(
            VariableContext::new().execution_id(),
            VariableContext::new().execution_id()
        );
        assert_eq!(
            VariableContext::with_execution_id("exec-7").execution_id(),
            "exec-7"
        );
    }

    #[test]
    fn test_resolve_variables_and_step_outputs() {
        let ctx = VariableContext::new();
        ctx.set_variable("branch", "main");
        ctx.record_step_output("count", json!(3));
        ctx.record_step_output("summary", json!("all green"));

        assert_eq!(
            ctx.resolve_template("{{ branch }}: {{steps.summary.output}} ({{steps.count.output}})"),
            "main: all green (3)"
        );
    }

    #[test]
    fn test_unknown_and_unterminated_placeholders_are_kept() {
        let ctx = VariableContext::new();
        assert_eq!(ctx.resolve_template("hi {{who}}"), "hi {{who}}");
        assert_eq!(ctx.resolve_template("open {{brace"), "open {{brace");
        assert_eq!(ctx.resolve_template("plain"), "plain");
    }

    #[test]
    fn test_stray_braces_do_not_swallow_later_placeholders() {
        let ctx = VariableContext::new();
        ctx.set_variable("name", "ada");

        assert_eq!(
            ctx.resolve_template("literal {{ then {{name}}"),
            "literal {{ then ada"
        );
        assert_eq!(ctx.resolve_template("{{{name}}}"), "{ada}");
        assert_eq!(ctx.resolve_template("a }} b {{ name }}"), "a }} b ada");
    }

    #[test]
    fn test_record_output_from_result() {
        let ctx = VariableContext::new();
        ctx.record_output("check", &StepResult::ok(true));
        assert_eq!(ctx.resolve_template("{{steps.check.output}}"), "true");
    }
}
