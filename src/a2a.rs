//! A2A (agent-to-agent) protocol: task types and the server-side executor
//!
//! This module exposes a local [`Agent`] as a remote, task-based service.
//! Each inbound request becomes a task that moves through the state machine
//!
//! ```text
//! submitted ──► working ──► completed (final)
//!                  │
//!                  ├───────► failed    (final)
//!                  └───────► canceled  (final)
//! ```
//!
//! Exactly one final event is emitted per task; after it, the task's queue
//! accepts nothing further. Events flow through a bounded [`EventQueue`]
//! written by the executor (single producer) and drained by the transport
//! serializer (single consumer), in emission order.
//!
//! The wire protocol is JSON-RPC 2.0; [`A2aRequestHandler`] dispatches
//! decoded requests to the executor and is transport-agnostic, so any HTTP
//! server (or a test) can sit in front of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::agent::Agent;
use crate::scope::RequestScope;
use crate::{Error, Result};

// ============================================================================
// PROTOCOL TYPES
// ============================================================================

/// Lifecycle state of one task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// Whether this state ends the task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }
}

/// Message sender on the A2A wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum A2aRole {
    User,
    Agent,
}

/// One content part of an A2A message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum A2aPart {
    /// Plain text content.
    Text { text: String },
    /// Structured data content.
    Data { data: Value },
}

impl A2aPart {
    pub fn text(text: impl Into<String>) -> Self {
        A2aPart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            A2aPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A message exchanged over the A2A wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct A2aMessage {
    pub role: A2aRole,
    pub parts: Vec<A2aPart>,
}

impl A2aMessage {
    /// A user message with one text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: A2aRole::User,
            parts: vec![A2aPart::text(text)],
        }
    }

    /// An agent message with one text part.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self {
            role: A2aRole::Agent,
            parts: vec![A2aPart::text(text)],
        }
    }

    /// Text of the first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(A2aPart::as_text)
    }
}

/// Output attached to a task beyond the status message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parts: Vec<A2aPart>,
}

/// One status event emitted for a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusUpdate {
    pub task_id: String,
    pub context_id: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<A2aMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(rename = "final")]
    pub is_final: bool,
}

// ============================================================================
// AGENT CARD
// ============================================================================

/// One advertised capability on an agent card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Static descriptor advertised at the well-known discovery path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    pub name: String,
    pub version: String,
    pub description: String,
    pub url: String,
    pub skills: Vec<AgentSkill>,
}

/// Derives the card for an agent: one `agent`-tagged skill for the agent
/// itself plus one `tool`-tagged skill per tool the agent exposes.
pub fn card_for_agent(agent: &dyn Agent, version: &str, url: &str) -> AgentCard {
    let persona = agent.persona();
    let mut skills = vec![AgentSkill {
        id: agent.id().to_string(),
        name: agent.id().to_string(),
        description: persona.goal.clone(),
        tags: vec!["agent".to_string()],
    }];
    for tool in agent.tools() {
        skills.push(AgentSkill {
            id: tool.name.clone(),
            name: tool.name,
            description: tool.description,
            tags: vec!["tool".to_string()],
        });
    }
    AgentCard {
        name: agent.id().to_string(),
        version: version.to_string(),
        description: persona.goal,
        url: url.to_string(),
        skills,
    }
}

// ============================================================================
// EVENT QUEUE
// ============================================================================

/// Default bound for a task's event queue.
const EVENT_QUEUE_CAPACITY: usize = 16;

/// Bounded per-task event channel: single producer (the executor), single
/// consumer (the transport serializer). Events arrive in emission order.
///
/// Once a final event has been enqueued the queue locks: further enqueues
/// fail and callers treat terminal-state rechecks as no-ops.
pub struct EventQueue {
    tx: mpsc::Sender<TaskStatusUpdate>,
    finalized: AtomicBool,
}

impl EventQueue {
    /// Creates a queue and the receiving half the transport drains.
    pub fn new() -> (Self, mpsc::Receiver<TaskStatusUpdate>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        (
            Self {
                tx,
                finalized: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Whether a final event has already been emitted.
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Enqueues one event.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] when a final event was already emitted;
    /// [`Error::Transport`] when the consumer has gone away.
    pub async fn enqueue(&self, event: TaskStatusUpdate) -> Result<()> {
        if self.finalized.load(Ordering::Acquire) {
            return Err(Error::internal(format!(
                "task {:?}: event after final",
                event.task_id
            )));
        }
        let is_final = event.is_final;
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::transport("event queue closed"))?;
        if is_final {
            self.finalized.store(true, Ordering::Release);
        }
        Ok(())
    }
}

// ============================================================================
// REQUEST CONTEXT AND EXECUTOR
// ============================================================================

/// Context of one inbound task request.
#[derive(Debug, Clone)]
pub struct A2aRequestContext {
    pub task_id: String,
    pub context_id: String,
    /// The triggering message. `None` for cancel requests.
    pub message: Option<A2aMessage>,
}

impl A2aRequestContext {
    /// Creates a context for a new task with fresh IDs.
    pub fn new(message: A2aMessage) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            context_id: Uuid::new_v4().to_string(),
            message: Some(message),
        }
    }

    /// Text of the first text part of the request message, or empty.
    pub fn user_input(&self) -> &str {
        self.message
            .as_ref()
            .and_then(A2aMessage::first_text)
            .unwrap_or("")
    }

    fn update(&self, state: TaskState, message: Option<A2aMessage>) -> TaskStatusUpdate {
        TaskStatusUpdate {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            state,
            message,
            artifacts: Vec::new(),
            is_final: state.is_terminal(),
        }
    }
}

/// Bridges a local [`Agent`] onto the A2A task protocol.
pub struct AgentTaskExecutor {
    agent: Arc<dyn Agent>,
}

impl AgentTaskExecutor {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    /// Runs one task: emits `working`, invokes the agent, then emits the
    /// single terminal event.
    ///
    /// An agent failure is reported through the queue as a final `failed`
    /// event and is NOT a transport error; only failures to emit are.
    pub async fn execute(
        &self,
        scope: &RequestScope,
        ctx: &A2aRequestContext,
        queue: &EventQueue,
    ) -> Result<()> {
        let input = ctx.user_input().to_string();

        queue
            .enqueue(ctx.update(TaskState::Working, None))
            .await
            .map_err(|e| Error::transport(format!("emit working: {e}")))?;

        match self.agent.invoke(scope, &input).await {
            Ok(result) => {
                queue
                    .enqueue(ctx.update(
                        TaskState::Completed,
                        Some(A2aMessage::agent_text(result)),
                    ))
                    .await
            }
            Err(Error::Canceled) | Err(Error::Timeout) if scope.is_canceled() => {
                queue.enqueue(ctx.update(TaskState::Canceled, None)).await
            }
            Err(err) => {
                queue
                    .enqueue(ctx.update(
                        TaskState::Failed,
                        Some(A2aMessage::agent_text(err.to_string())),
                    ))
                    .await
            }
        }
    }

    /// Cancels a task: emits a single final `canceled` event. A no-op when
    /// the task already reached a terminal state.
    pub async fn cancel(&self, ctx: &A2aRequestContext, queue: &EventQueue) -> Result<()> {
        if queue.is_finalized() {
            return Ok(());
        }
        queue.enqueue(ctx.update(TaskState::Canceled, None)).await
    }
}

// ============================================================================
// JSON-RPC ENVELOPE
// ============================================================================

/// JSON-RPC method submitting a task and blocking for the terminal result.
pub const METHOD_MESSAGE_SEND: &str = "message/send";
/// JSON-RPC method submitting a task and streaming incremental events.
pub const METHOD_MESSAGE_STREAM: &str = "message/stream";
/// JSON-RPC method canceling a running task by ID.
pub const METHOD_TASKS_CANCEL: &str = "tasks/cancel";
/// HTTP GET path serving the static agent card (not JSON-RPC).
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Standard JSON-RPC error codes used by the handler.
pub mod rpc_codes {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Parameters of `message/send` and `message/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageParams {
    pub message: A2aMessage,
}

/// Parameters of `tasks/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskParams {
    pub task_id: String,
}

// ============================================================================
// REQUEST HANDLER
// ============================================================================

/// Transport-agnostic JSON-RPC dispatcher for one served agent.
///
/// An HTTP server decodes the request body into [`JsonRpcRequest`], calls
/// [`A2aRequestHandler::handle`], and writes the response back. The handler
/// owns the task registry; remote clients hold only task-ID references.
pub struct A2aRequestHandler {
    executor: Arc<AgentTaskExecutor>,
    card: AgentCard,
    /// Scopes of in-flight tasks, for `tasks/cancel`. Shared with spawned
    /// task bodies so completed tasks deregister themselves.
    tasks: Arc<Mutex<HashMap<String, RequestScope>>>,
}

impl A2aRequestHandler {
    pub fn new(agent: Arc<dyn Agent>, version: &str, url: &str) -> Self {
        let card = card_for_agent(agent.as_ref(), version, url);
        Self {
            executor: Arc::new(AgentTaskExecutor::new(agent)),
            card,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The static agent card served at [`AGENT_CARD_PATH`].
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Dispatches one JSON-RPC request.
    pub async fn handle(&self, scope: &RequestScope, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            METHOD_MESSAGE_SEND => self.handle_send(scope, request).await,
            METHOD_TASKS_CANCEL => self.handle_cancel(request).await,
            // Streaming needs transport support; streaming servers call
            // `open_task` and forward events themselves.
            METHOD_MESSAGE_STREAM => JsonRpcResponse::failure(
                request.id,
                rpc_codes::METHOD_NOT_FOUND,
                "message/stream requires a streaming transport",
            ),
            _ => JsonRpcResponse::failure(
                request.id,
                rpc_codes::METHOD_NOT_FOUND,
                format!("unknown method {:?}", request.method),
            ),
        }
    }

    /// `message/send`: run the task to completion and return the terminal
    /// status update as the result.
    async fn handle_send(&self, scope: &RequestScope, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: SendMessageParams = match serde_json::from_value(request.params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::failure(
                    request.id,
                    rpc_codes::INVALID_PARAMS,
                    e.to_string(),
                );
            }
        };

        let ctx = A2aRequestContext::new(params.message);
        let mut rx = match self.open_task(scope, ctx).await {
            Ok(rx) => rx,
            Err(e) => {
                return JsonRpcResponse::failure(
                    request.id,
                    rpc_codes::INTERNAL_ERROR,
                    e.to_string(),
                );
            }
        };

        // Drain to the terminal event; intermediate events are dropped for
        // the blocking method.
        let mut terminal = None;
        while let Some(event) = rx.recv().await {
            let is_final = event.is_final;
            terminal = Some(event);
            if is_final {
                break;
            }
        }

        match terminal {
            Some(event) => match serde_json::to_value(&event) {
                Ok(value) => JsonRpcResponse::success(request.id, value),
                Err(e) => JsonRpcResponse::failure(
                    request.id,
                    rpc_codes::INTERNAL_ERROR,
                    e.to_string(),
                ),
            },
            None => JsonRpcResponse::failure(
                request.id,
                rpc_codes::INTERNAL_ERROR,
                "task produced no terminal event",
            ),
        }
    }

    /// `tasks/cancel`: trip the task's scope. Unknown or already-terminal
    /// tasks are a no-op success.
    async fn handle_cancel(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: CancelTaskParams = match serde_json::from_value(request.params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::failure(
                    request.id,
                    rpc_codes::INVALID_PARAMS,
                    e.to_string(),
                );
            }
        };

        if let Some(task_scope) = self.tasks.lock().await.get(&params.task_id) {
            task_scope.cancel();
        }
        JsonRpcResponse::success(request.id, serde_json::json!({"task_id": params.task_id}))
    }

    /// Starts a task and returns the event receiver. Used by `message/send`
    /// (drained to the terminal event) and by streaming transports (events
    /// forwarded incrementally).
    pub async fn open_task(
        &self,
        scope: &RequestScope,
        ctx: A2aRequestContext,
    ) -> Result<mpsc::Receiver<TaskStatusUpdate>> {
        scope.check()?;
        let (queue, rx) = EventQueue::new();
        let task_scope = scope.child();
        let task_id = ctx.task_id.clone();

        self.tasks
            .lock()
            .await
            .insert(task_id.clone(), task_scope.clone());

        let executor = Arc::clone(&self.executor);
        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            if let Err(e) = executor.execute(&task_scope, &ctx, &queue).await {
                log::warn!("a2a task {:?}: {e}", ctx.task_id);
            }
            tasks.lock().await.remove(&task_id);
        });

        Ok(rx)
    }
}
