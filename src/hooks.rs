//! Middleware and lifecycle hooks for capability calls
//!
//! A [`Middleware`] is a transform from one chat model to another; stacks
//! compose with [`apply_middleware`], where the first element of the slice is
//! the outermost wrapper (runs first on entry, last on return). [`Hooks`] is
//! a record of optional lifecycle callbacks; [`with_hooks`] turns a record
//! into a middleware whose wrapper fires the callbacks around every call.
//!
//! Hooks that are not set cost nothing: the wrapper checks an `Option` and
//! moves on without cloning the event payload.
//!
//! # Examples
//!
//! ```rust,no_run
//! use durable_agent::{apply_middleware, with_hooks, ChatModel, Error, Hooks};
//! use std::sync::Arc;
//!
//! # fn base_model() -> Arc<dyn ChatModel> { unimplemented!() }
//! let audit = Hooks::new().on_before_call(|event| async move {
//!     if event.messages.is_empty() {
//!         return Err(Error::invalid_input("refusing empty call"));
//!     }
//!     Ok(())
//! });
//!
//! let model = apply_middleware(base_model(), &[with_hooks(audit)]);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use crate::model::{ChatModel, ChunkStream};
use crate::scope::RequestScope;
use crate::types::{GenerateOption, Message, StreamChunk, ToolCall, ToolDefinition};
use crate::{Error, Result};

// ============================================================================
// EVENTS
// ============================================================================

/// Event fired before a call is delegated to the wrapped model.
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Identifier of the model about to be called.
    pub model_id: String,
    /// The messages being sent (read-only snapshot).
    pub messages: Vec<Message>,
}

/// Event fired after delegation returns, success or failure.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// Identifier of the model that was called.
    pub model_id: String,
    /// The AI response when the call succeeded.
    pub response: Option<Message>,
    /// The error text when the call failed.
    pub error: Option<String>,
}

// ============================================================================
// HANDLER TYPE ALIASES
// ============================================================================

/// Fallible pre-call handler; an error aborts the call.
pub type BeforeCallHook = Arc<
    dyn Fn(CallEvent) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync,
>;

/// Observational post-call handler; fires on success and failure.
pub type AfterCallHook =
    Arc<dyn Fn(CallOutcome) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Observational per-chunk handler for streamed calls.
pub type StreamChunkHook =
    Arc<dyn Fn(StreamChunk) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Observational handler fired once per tool call discovered in a response.
pub type ToolCallHook =
    Arc<dyn Fn(ToolCall) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Error interceptor: return `Some(err)` to transform, `None` to suppress.
pub type ErrorHook =
    Arc<dyn Fn(Error) -> Pin<Box<dyn Future<Output = Option<Error>> + Send>> + Send + Sync>;

// ============================================================================
// HOOKS RECORD
// ============================================================================

/// Record of optional lifecycle callbacks.
///
/// | Hook | Fired | Control flow |
/// |---|---|---|
/// | `before_call` | before delegation | error aborts the call |
/// | `after_call` | after delegation, success or failure | none |
/// | `on_stream_chunk` | per streamed item | none |
/// | `on_tool_call` | per tool call in a response | none |
/// | `on_error` | on any error | transform or suppress |
///
/// When `on_error` suppresses (returns `None`), the hooked call resolves to
/// an empty AI message instead of the error.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_call: Option<BeforeCallHook>,
    pub after_call: Option<AfterCallHook>,
    pub on_stream_chunk: Option<StreamChunkHook>,
    pub on_tool_call: Option<ToolCallHook>,
    pub on_error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the before-call hook.
    pub fn on_before_call<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(CallEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.before_call = Some(Arc::new(move |event| Box::pin(handler(event))));
        self
    }

    /// Sets the after-call hook.
    pub fn on_after_call<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(CallOutcome) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after_call = Some(Arc::new(move |outcome| Box::pin(handler(outcome))));
        self
    }

    /// Sets the per-chunk stream hook.
    pub fn on_stream_chunk<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(StreamChunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_stream_chunk = Some(Arc::new(move |chunk| Box::pin(handler(chunk))));
        self
    }

    /// Sets the tool-call hook.
    pub fn on_tool_call<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ToolCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_tool_call = Some(Arc::new(move |call| Box::pin(handler(call))));
        self
    }

    /// Sets the error interceptor.
    pub fn on_error<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Error>> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |err| Box::pin(handler(err))));
        self
    }

    /// Merges several hook records into one.
    ///
    /// Each field runs its handlers in declaration order. For the fallible
    /// fields (`before_call`, `on_error`), the first non-null error
    /// short-circuits the chain; an `on_error` chain where every handler
    /// declines (returns `None`) suppresses the error.
    pub fn compose(records: Vec<Hooks>) -> Hooks {
        let mut composed = Hooks::new();

        let before: Vec<BeforeCallHook> =
            records.iter().filter_map(|h| h.before_call.clone()).collect();
        if !before.is_empty() {
            composed.before_call = Some(Arc::new(move |event: CallEvent| {
                let before = before.clone();
                Box::pin(async move {
                    for handler in &before {
                        handler(event.clone()).await?;
                    }
                    Ok(())
                })
            }));
        }

        let after: Vec<AfterCallHook> =
            records.iter().filter_map(|h| h.after_call.clone()).collect();
        if !after.is_empty() {
            composed.after_call = Some(Arc::new(move |outcome: CallOutcome| {
                let after = after.clone();
                Box::pin(async move {
                    for handler in &after {
                        handler(outcome.clone()).await;
                    }
                })
            }));
        }

        let chunks: Vec<StreamChunkHook> = records
            .iter()
            .filter_map(|h| h.on_stream_chunk.clone())
            .collect();
        if !chunks.is_empty() {
            composed.on_stream_chunk = Some(Arc::new(move |chunk: StreamChunk| {
                let chunks = chunks.clone();
                Box::pin(async move {
                    for handler in &chunks {
                        handler(chunk.clone()).await;
                    }
                })
            }));
        }

        let tool_calls: Vec<ToolCallHook> = records
            .iter()
            .filter_map(|h| h.on_tool_call.clone())
            .collect();
        if !tool_calls.is_empty() {
            composed.on_tool_call = Some(Arc::new(move |call: ToolCall| {
                let tool_calls = tool_calls.clone();
                Box::pin(async move {
                    for handler in &tool_calls {
                        handler(call.clone()).await;
                    }
                })
            }));
        }

        let errors: Vec<ErrorHook> =
            records.iter().filter_map(|h| h.on_error.clone()).collect();
        if !errors.is_empty() {
            composed.on_error = Some(Arc::new(move |err: Error| {
                let errors = errors.clone();
                Box::pin(async move {
                    let mut verdict = Some(err);
                    for handler in &errors {
                        // A suppressing handler leaves nothing to intercept.
                        let Some(current) = verdict.take() else { break };
                        verdict = handler(current).await;
                        if verdict.is_some() {
                            // First non-null error short-circuits the chain
                            break;
                        }
                    }
                    verdict
                })
            }));
        }

        composed
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_call", &self.before_call.is_some())
            .field("after_call", &self.after_call.is_some())
            .field("on_stream_chunk", &self.on_stream_chunk.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// A transform wrapping one chat model into another.
pub type Middleware = Arc<dyn Fn(Arc<dyn ChatModel>) -> Arc<dyn ChatModel> + Send + Sync>;

/// Applies a middleware stack to a model.
///
/// The first element of `middleware` becomes the outermost wrapper: its
/// `before_call` runs first on entry and its `after_call` runs last on
/// return, so the innermost wrapper observes events closest to the wrapped
/// capability.
pub fn apply_middleware(model: Arc<dyn ChatModel>, middleware: &[Middleware]) -> Arc<dyn ChatModel> {
    middleware
        .iter()
        .rev()
        .fold(model, |inner, mw| mw(inner))
}

/// Builds a middleware that fires the given hooks around every call.
pub fn with_hooks(hooks: Hooks) -> Middleware {
    Arc::new(move |inner| {
        Arc::new(HookedModel {
            inner,
            hooks: hooks.clone(),
        }) as Arc<dyn ChatModel>
    })
}

/// A chat model wrapped with lifecycle hooks. Owns its inner capability
/// exclusively (one-hop ownership chain).
struct HookedModel {
    inner: Arc<dyn ChatModel>,
    hooks: Hooks,
}

impl HookedModel {
    async fn run_before(&self, messages: &[Message]) -> Result<()> {
        if let Some(before) = &self.hooks.before_call {
            before(CallEvent {
                model_id: self.inner.model_id().to_string(),
                messages: messages.to_vec(),
            })
            .await?;
        }
        Ok(())
    }

    /// Routes an error through `on_error`. `Ok(None)` means suppressed.
    async fn route_error(&self, err: Error) -> Result<Option<Error>> {
        match &self.hooks.on_error {
            Some(on_error) => Ok(on_error(err).await),
            None => Ok(Some(err)),
        }
    }
}

#[async_trait]
impl ChatModel for HookedModel {
    async fn generate(
        &self,
        scope: &RequestScope,
        messages: &[Message],
        options: &[GenerateOption],
    ) -> Result<Message> {
        if let Err(err) = self.run_before(messages).await {
            return match self.route_error(err).await? {
                Some(err) => Err(err),
                None => Ok(Message::ai("")),
            };
        }

        let result = self.inner.generate(scope, messages, options).await;

        if let Some(after) = &self.hooks.after_call {
            after(CallOutcome {
                model_id: self.inner.model_id().to_string(),
                response: result.as_ref().ok().cloned(),
                error: result.as_ref().err().map(|e| e.to_string()),
            })
            .await;
        }

        match result {
            Ok(message) => {
                if let Some(on_tool_call) = &self.hooks.on_tool_call {
                    for call in &message.tool_calls {
                        on_tool_call(call.clone()).await;
                    }
                }
                Ok(message)
            }
            Err(err) => match self.route_error(err).await? {
                Some(err) => Err(err),
                None => Ok(Message::ai("")),
            },
        }
    }

    async fn stream(
        &self,
        scope: &RequestScope,
        messages: &[Message],
        options: &[GenerateOption],
    ) -> Result<ChunkStream> {
        if let Err(err) = self.run_before(messages).await {
            return match self.route_error(err).await? {
                Some(err) => Err(err),
                None => Ok(crate::model::stream_from_message(Message::ai(""))),
            };
        }

        let inner_stream = match self.inner.stream(scope, messages, options).await {
            Ok(stream) => stream,
            Err(err) => {
                return match self.route_error(err).await? {
                    Some(err) => Err(err),
                    None => Ok(crate::model::stream_from_message(Message::ai(""))),
                };
            }
        };

        let chunk_hook = self.hooks.on_stream_chunk.clone();
        let tool_hook = self.hooks.on_tool_call.clone();
        if chunk_hook.is_none() && tool_hook.is_none() {
            return Ok(inner_stream);
        }

        let observed = inner_stream.then(move |item| {
            let chunk_hook = chunk_hook.clone();
            let tool_hook = tool_hook.clone();
            async move {
                if let Ok(chunk) = &item {
                    if let Some(hook) = &chunk_hook {
                        hook(chunk.clone()).await;
                    }
                    if let (Some(hook), Some(delta)) = (&tool_hook, &chunk.tool_call_delta) {
                        hook(delta.clone()).await;
                    }
                }
                item
            }
        });
        Ok(Box::pin(observed))
    }

    fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Arc<dyn ChatModel> {
        Arc::new(HookedModel {
            inner: self.inner.bind_tools(tools),
            hooks: self.hooks.clone(),
        })
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn bound_tools(&self) -> &[ToolDefinition] {
        self.inner.bound_tools()
    }
}
