//! # Durable Agent SDK
//!
//! A pluggable runtime substrate for building AI agents in Rust: provider
//! registries, a typed chat-model capability with middleware hooks,
//! cache-aware prompt assembly, a durable workflow engine, and an A2A
//! (agent-to-agent) bridge.
//!
//! ## Overview
//!
//! The SDK is the machinery that makes providers interchangeable and
//! composable, and that lets long-running agent work survive process death:
//!
//! - **Registries**: every extensible subsystem maps provider names to
//!   factories behind the same [`Registry`] type. Bootstrap is explicit:
//!   the application registers exactly the providers it wants at startup.
//! - **Capabilities**: providers implement [`ChatModel`]; callers never see
//!   provider-specific types. Middleware wraps any capability with
//!   lifecycle [`Hooks`] (auditing, policy gates, error translation).
//! - **Prompt assembly**: [`PromptBuilder`] arranges prompts in
//!   cache-optimal slot order so downstream provider prompt caches hit.
//! - **Durable workflows**: [`WorkflowExecutor`] records every step of a
//!   run in a [`WorkflowStore`]-backed history log; crashed runs resume
//!   deterministically and zombie runs are swept on startup.
//! - **A2A bridge**: [`A2aRequestHandler`] exposes any local [`Agent`] as a
//!   JSON-RPC task service; [`RemoteAgent`] wraps a remote endpoint as a
//!   local agent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use durable_agent::{
//!     ChatModel, GenerateOption, Message, PromptBuilder, ProviderConfig, Registry,
//!     RequestScope,
//! };
//! use std::sync::Arc;
//!
//! # fn bootstrap(_: &Registry<Arc<dyn ChatModel>>) {}
//! #[tokio::main]
//! async fn main() -> durable_agent::Result<()> {
//!     // Process init: compose the provider set.
//!     let models: Registry<Arc<dyn ChatModel>> = Registry::new("chat_models");
//!     bootstrap(&models);
//!
//!     // Obtain a capability and build a cache-friendly prompt.
//!     let model = models.new_instance("acme", &ProviderConfig::new().with_model("acme-large"))?;
//!     let messages = PromptBuilder::new()
//!         .system_prompt("You are a helpful assistant")
//!         .cache_breakpoint()
//!         .user_input("What's the capital of France?")
//!         .build();
//!
//!     let scope = RequestScope::new();
//!     let reply = model
//!         .generate(&scope, &messages, &[GenerateOption::Temperature(0.2)])
//!         .await?;
//!     println!("{}", reply.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Durable Execution
//!
//! ```rust,no_run
//! use durable_agent::{InMemoryWorkflowStore, RequestScope, WorkflowExecutor};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> durable_agent::Result<()> {
//! let executor = WorkflowExecutor::new(Arc::new(InMemoryWorkflowStore::new()));
//! let scope = RequestScope::new();
//! executor.start(&scope).await?;
//!
//! let output = executor
//!     .execute(&scope, "order-123", json!({"sku": "x"}), |ctx, input| async move {
//!         ctx.activity("reserve", input, |i| async move { Ok(i) }).await
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The SDK is organized into focused modules:
//!
//! - **registry**: name-keyed provider factories and configuration records
//! - **model**: the `ChatModel` capability contract and stream types
//! - **hooks**: middleware composition and lifecycle hooks
//! - **prompt**: templates and the cache-ordered prompt builder
//! - **workflow / store / executor**: durable workflow state, pluggable
//!   persistence, and the resumable execution engine
//! - **agent / a2a / remote**: the local agent interface and both sides of
//!   the A2A bridge
//! - **scope**: cancellation, deadlines, and tenant/trace propagation
//! - **error**: the error taxonomy with retryability classification
//! - **retry**: exponential backoff driven by that taxonomy

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// A2A protocol types, the per-task event queue, the server-side task
/// executor, and the JSON-RPC request handler.
mod a2a;

/// The local agent interface the A2A bridge exposes and consumes.
mod agent;

/// Error types and conversions used across all public APIs.
mod error;

/// The generic capability-wrapping middleware layer and lifecycle hooks.
mod hooks;

/// The chat-model capability contract and streaming types.
mod model;

/// Prompt templates and the cache-optimal prompt builder.
mod prompt;

/// Name-keyed provider registries and the shared configuration record.
mod registry;

/// Client side of the A2A bridge: transports and the remote agent adapter.
mod remote;

/// Request scopes: cancellation, deadlines, tenant and trace propagation.
mod scope;

/// The pluggable workflow persistence contract and in-memory backend.
mod store;

/// Core data shapes: messages, content parts, tool definitions, generation
/// options, and stream chunks.
mod types;

/// Durable workflow state, status lifecycle, and history events.
mod workflow;

/// The resumable workflow execution engine.
mod executor;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff.
/// Public as a module so callers can reuse the configuration and entry point
/// for their own operations.
pub mod retry;

// --- Errors ---

pub use error::{Error, Result};

// --- Request Scopes ---

pub use scope::RequestScope;

// --- Core Types ---

pub use types::{
    ContentPart, FinishReason, GenerateOption, GenerateOptions, Message, Role, StreamChunk,
    TokenUsage, ToolCall, ToolChoice, ToolDefinition,
};

// --- Capability Contract ---

pub use model::{ChatModel, ChunkStream, stream_from_message, validate_generate_input};

// --- Registry ---

pub use registry::{Factory, ProviderConfig, Registry};

// --- Middleware & Hooks ---

pub use hooks::{
    AfterCallHook, BeforeCallHook, CallEvent, CallOutcome, ErrorHook, Hooks, Middleware,
    StreamChunkHook, ToolCallHook, apply_middleware, with_hooks,
};

// --- Prompt ---

pub use prompt::{CACHE_BREAKPOINT_KEY, PromptBuilder, PromptTemplate};

// --- Workflow Engine ---

pub use executor::{ExecutorConfig, WorkflowContext, WorkflowExecutor};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
pub use workflow::{
    HistoryEvent, HistoryEventType, WorkflowError, WorkflowFilter, WorkflowState, WorkflowStatus,
};

// --- Agents & A2A ---

pub use a2a::{
    A2aMessage, A2aPart, A2aRequestContext, A2aRequestHandler, A2aRole, AGENT_CARD_PATH,
    AgentCard, AgentSkill, AgentTaskExecutor, Artifact, CancelTaskParams, EventQueue,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM,
    METHOD_TASKS_CANCEL, SendMessageParams, TaskState, TaskStatusUpdate, card_for_agent,
    rpc_codes,
};
pub use agent::{Agent, AgentEvent, AgentEventStream, Persona};
pub use remote::{A2aTransport, HttpTransport, RemoteAgent};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and functions.
/// Import with `use durable_agent::prelude::*;` for typical usage.
pub mod prelude {
    pub use crate::{
        Agent, AgentEvent, ChatModel, ChunkStream, ContentPart, Error, GenerateOption, Hooks,
        InMemoryWorkflowStore, Message, Middleware, PromptBuilder, PromptTemplate,
        ProviderConfig, Registry, RemoteAgent, RequestScope, Result, Role, StreamChunk,
        ToolCall, ToolDefinition, WorkflowExecutor, WorkflowState, WorkflowStatus,
        WorkflowStore, apply_middleware, with_hooks,
    };
}
