//! Client side of the A2A bridge: transports and the remote agent adapter
//!
//! [`A2aTransport`] abstracts the wire so the adapter logic is testable
//! without a server; [`HttpTransport`] is the JSON-RPC-over-HTTP
//! implementation. [`RemoteAgent`] wraps a transport as a local
//! [`Agent`], so delegating to a remote peer looks exactly like calling any
//! other agent in process.
//!
//! # Examples
//!
//! ```rust,no_run
//! use durable_agent::{Agent, HttpTransport, RemoteAgent, RequestScope};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> durable_agent::Result<()> {
//! let transport = HttpTransport::new("http://localhost:7420", Duration::from_secs(30))?;
//! let remote = RemoteAgent::connect(&RequestScope::new(), Arc::new(transport)).await?;
//!
//! let answer = remote.invoke(&RequestScope::new(), "hello").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::a2a::{
    A2aMessage, AGENT_CARD_PATH, AgentCard, CancelTaskParams, JsonRpcRequest, JsonRpcResponse,
    METHOD_MESSAGE_SEND, METHOD_TASKS_CANCEL, SendMessageParams, TaskState, TaskStatusUpdate,
};
use crate::agent::{Agent, AgentEvent, AgentEventStream, Persona};
use crate::scope::RequestScope;
use crate::{Error, Result};

/// Wire abstraction for talking to a remote A2A endpoint.
#[async_trait]
pub trait A2aTransport: Send + Sync {
    /// Fetches the remote agent card from the well-known discovery path.
    async fn fetch_card(&self, scope: &RequestScope) -> Result<AgentCard>;

    /// Submits a task and blocks until its terminal status update.
    async fn send_task(
        &self,
        scope: &RequestScope,
        message: A2aMessage,
    ) -> Result<TaskStatusUpdate>;

    /// Cancels a running task by ID.
    async fn cancel_task(&self, scope: &RequestScope, task_id: &str) -> Result<()>;
}

/// JSON-RPC 2.0 over HTTP.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Creates a transport for the given endpoint.
    ///
    /// A zero timeout disables the per-request deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::invalid_input(
                "base_url must start with http:// or https://",
            ));
        }

        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(Error::from)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, scope: &RequestScope, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        scope.check()?;
        let request = JsonRpcRequest::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        );

        let send = self.client.post(&self.base_url).json(&request).send();
        let response = tokio::select! {
            r = send => r.map_err(Error::from)?,
            _ = scope.cancelled() => {
                return Err(scope.check().expect_err("scope tripped"));
            }
        };

        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "JSON-RPC endpoint returned {}",
                response.status()
            )));
        }

        let decoded: JsonRpcResponse = response.json().await.map_err(Error::from)?;
        if let Some(rpc_err) = decoded.error {
            return Err(Error::transport(format!(
                "JSON-RPC error {}: {}",
                rpc_err.code, rpc_err.message
            )));
        }
        decoded
            .result
            .ok_or_else(|| Error::transport("JSON-RPC response had neither result nor error"))
    }
}

#[async_trait]
impl A2aTransport for HttpTransport {
    async fn fetch_card(&self, scope: &RequestScope) -> Result<AgentCard> {
        scope.check()?;
        let url = format!("{}{}", self.base_url, AGENT_CARD_PATH);
        let response = self.client.get(&url).send().await.map_err(Error::from)?;
        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "agent card fetch returned {}",
                response.status()
            )));
        }
        response.json().await.map_err(Error::from)
    }

    async fn send_task(
        &self,
        scope: &RequestScope,
        message: A2aMessage,
    ) -> Result<TaskStatusUpdate> {
        let params = serde_json::to_value(SendMessageParams { message })?;
        let result = self.call(scope, METHOD_MESSAGE_SEND, params).await?;
        serde_json::from_value(result).map_err(Error::from)
    }

    async fn cancel_task(&self, scope: &RequestScope, task_id: &str) -> Result<()> {
        let params = serde_json::to_value(CancelTaskParams {
            task_id: task_id.to_string(),
        })?;
        self.call(scope, METHOD_TASKS_CANCEL, params).await?;
        Ok(())
    }
}

/// A remote A2A endpoint wrapped as a local [`Agent`].
///
/// Identity comes from the remote card: `id` is the card name and the
/// persona pairs the card name with its description.
pub struct RemoteAgent {
    card: AgentCard,
    transport: Arc<dyn A2aTransport>,
}

impl RemoteAgent {
    /// Connects by fetching the remote agent card.
    pub async fn connect(
        scope: &RequestScope,
        transport: Arc<dyn A2aTransport>,
    ) -> Result<Self> {
        let card = transport.fetch_card(scope).await?;
        Ok(Self { card, transport })
    }

    /// Builds a remote agent from an already-fetched card.
    pub fn with_card(card: AgentCard, transport: Arc<dyn A2aTransport>) -> Self {
        Self { card, transport }
    }

    /// The remote agent card.
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Extracts the result text from a terminal update: the status message
    /// first, then the first text artifact, then empty.
    fn extract_text(update: &TaskStatusUpdate) -> String {
        if let Some(text) = update.message.as_ref().and_then(A2aMessage::first_text) {
            return text.to_string();
        }
        update
            .artifacts
            .iter()
            .flat_map(|a| a.parts.iter())
            .find_map(|p| p.as_text())
            .unwrap_or("")
            .to_string()
    }
}

#[async_trait]
impl Agent for RemoteAgent {
    fn id(&self) -> &str {
        &self.card.name
    }

    fn persona(&self) -> Persona {
        Persona::new(self.card.name.clone(), self.card.description.clone())
    }

    async fn invoke(&self, scope: &RequestScope, input: &str) -> Result<String> {
        let update = self
            .transport
            .send_task(scope, A2aMessage::user_text(input))
            .await?;

        match update.state {
            TaskState::Completed => Ok(Self::extract_text(&update)),
            TaskState::Failed => {
                let text = Self::extract_text(&update);
                let message = if text.is_empty() {
                    format!("remote agent {:?} failed", self.card.name)
                } else {
                    text
                };
                Err(Error::provider(message))
            }
            TaskState::Canceled => Err(Error::Canceled),
            state => Err(Error::transport(format!(
                "terminal update with non-terminal state {state:?}"
            ))),
        }
    }

    async fn stream(&self, scope: &RequestScope, input: &str) -> Result<AgentEventStream> {
        let result = self.invoke(scope, input).await?;
        let scope = scope.clone();

        // Exactly two events: the full text, then done. Consumer drop or a
        // tripped scope between yields ends the emission promptly.
        let stream = futures::stream::unfold(
            (0u8, result, scope),
            |(step, result, scope)| async move {
                match step {
                    0 => {
                        let text = result.clone();
                        Some((Ok(AgentEvent::Text(text)), (1, result, scope)))
                    }
                    1 if !scope.is_canceled() => {
                        Some((Ok(AgentEvent::Done), (2, result, scope)))
                    }
                    _ => None,
                }
            },
        );
        Ok(Box::pin(stream))
    }
}
