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

//! Agent orchestration collaborator.
//!
//! Model invocation lives outside this crate. Agent steps only need to open
//! a session, send one message and close the session again.

use async_trait::async_trait;

/// Opens conversations with named agents.
#[async_trait]
pub trait AgentOrchestrator: Send + Sync {
    /// Start an ephemeral session with `agent`. Fails for unknown agents.
    async fn open_session(&self, agent: &str) -> anyhow::Result<Box<dyn AgentSession>>;
}

/// One open agent conversation.
#[async_trait]
pub trait AgentSession: Send {
    /// Send a message and wait for the agent's reply.
    async fn send(&mut self, message: &str) -> anyhow::Result<String>;

    /// Release the session.
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}
