//! The local agent interface
//!
//! [`Agent`] is the minimal contract the A2A bridge builds on: a named,
//! persona-carrying unit that turns an input string into an output string,
//! optionally streaming. Anything can implement it: a single chat-model
//! call, a tool-using loop, or a remote A2A endpoint wrapped by
//! [`RemoteAgent`](crate::RemoteAgent).

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::scope::RequestScope;
use crate::types::ToolDefinition;
use crate::Result;

/// Who the agent presents as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Short role description, e.g. "research assistant".
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
}

impl Persona {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
        }
    }
}

/// One item in a streamed agent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A chunk of response text.
    Text(String),
    /// The response is complete; no further events follow.
    Done,
}

/// Lazy sequence of agent events.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// A runnable agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier for this agent.
    fn id(&self) -> &str;

    /// The agent's presented persona.
    fn persona(&self) -> Persona;

    /// Tools the agent exposes to callers (advertised in its agent card).
    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    /// Runs the agent to completion on one input.
    async fn invoke(&self, scope: &RequestScope, input: &str) -> Result<String>;

    /// Runs the agent, yielding incremental events.
    ///
    /// The default implementation invokes to completion and yields the full
    /// result as one `Text` event followed by `Done`.
    async fn stream(&self, scope: &RequestScope, input: &str) -> Result<AgentEventStream> {
        let result = self.invoke(scope, input).await?;
        let events = vec![Ok(AgentEvent::Text(result)), Ok(AgentEvent::Done)];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
