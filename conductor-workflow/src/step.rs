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

//! Step definitions and results.

use crate::error::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Step kind token. The five built-in kinds have dedicated variants; any
/// other token is carried as [`StepKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Agent,
    Plugin,
    Condition,
    Parallel,
    Approval,
    Custom(String),
}

impl StepKind {
    pub fn as_str(&self) -> &str {
        match self {
            StepKind::Agent => "agent",
            StepKind::Plugin => "plugin",
            StepKind::Condition => "condition",
            StepKind::Parallel => "parallel",
            StepKind::Approval => "approval",
            StepKind::Custom(kind) => kind,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StepKind {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "agent" => StepKind::Agent,
            "plugin" => StepKind::Plugin,
            "condition" => StepKind::Condition,
            "parallel" => StepKind::Parallel,
            "approval" => StepKind::Approval,
            _ => StepKind::Custom(s.to_string()),
        }
    }
}

impl From<String> for StepKind {
    fn from(s: String) -> Self {
        StepKind::from(s.as_str())
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One step of a workflow.
///
/// ```json
/// { "id": "fanout", "type": "parallel", "steps": [
///     { "id": "lint", "type": "plugin", "plugin": "shell", "parameters": { "cmd": "make lint" } },
///     { "id": "review", "type": "agent", "agent": "reviewer", "input": "Review {{branch}}" }
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepDefinition {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: StepKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    /// Plugin action; defaults to the step id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Child steps, used by parallel steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<WorkflowStepDefinition>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl WorkflowStepDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<StepKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            agent: None,
            plugin: None,
            action: None,
            input: None,
            condition: None,
            steps: Vec::new(),
            parameters: Map::new(),
        }
    }

    /// Parse and validate a step definition (and its children) from JSON.
    pub fn from_json(json: &str) -> WorkflowResult<Self> {
        let step: Self = serde_json::from_str(json)?;
        step.validate()?;
        Ok(step)
    }

    /// Every id must be non-empty and unique within the tree.
    pub fn validate(&self) -> WorkflowResult<()> {
        let mut seen = HashSet::new();
        self.validate_into(&mut seen)
    }

    fn validate_into<'a>(&'a self, seen: &mut HashSet<&'a str>) -> WorkflowResult<()> {
        if self.id.trim().is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "step of type '{}' has an empty id",
                self.kind
            )));
        }
        if !seen.insert(self.id.as_str()) {
            return Err(WorkflowError::InvalidDefinition(format!(
                "duplicate step id '{}'",
                self.id
            )));
        }
        for child in &self.steps {
            child.validate_into(seen)?;
        }
        Ok(())
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = WorkflowStepDefinition>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Key of the approval-pending payload inside a step output.
pub const APPROVAL_PENDING_KEY: &str = "approval_pending";

/// Signal that a workflow must checkpoint and wait for an external resume
/// carrying the same execution id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPending {
    pub step_id: String,
    pub message: String,
    pub execution_id: String,
}

/// Outcome of one step. Built only through [`StepResult::ok`] and
/// [`StepResult::fail`], so a successful result never carries an error and
/// a failed one always does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    success: bool,
    output: Value,
    error: Option<String>,
}

impl StepResult {
    pub fn ok(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Successful result carrying an approval checkpoint.
    pub fn awaiting_approval(pending: ApprovalPending) -> Self {
        let mut payload = Map::new();
        // ApprovalPending only holds strings, so this cannot fail.
        payload.insert(
            APPROVAL_PENDING_KEY.to_string(),
            serde_json::to_value(pending).unwrap_or_default(),
        );
        Self::ok(Value::Object(payload))
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> &Value {
        &self.output
    }

    pub fn into_output(self) -> Value {
        self.output
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The approval checkpoint, when this result is one.
    pub fn approval_pending(&self) -> Option<ApprovalPending> {
        if !self.success {
            return None;
        }
        self.output
            .get(APPROVAL_PENDING_KEY)
            .and_then(|payload| serde_json::from_value(payload.clone()).ok())
    }
}
