//! The chat-model capability contract.
//!
//! [`ChatModel`] is the typed interface every LLM provider implements and the
//! canonical example of a capability: registries produce it, middleware wraps
//! it, workflow activities and the A2A bridge consume it. Other capability
//! families (embedders, rerankers) follow the same shape.
//!
//! # Contract
//!
//! - `generate` is a single request/response call; an empty message list is
//!   rejected with an invalid-input error before the provider is reached.
//! - `stream` returns a finite, non-restartable sequence of
//!   [`StreamChunk`](crate::StreamChunk)s. Errors are delivered in-band, one
//!   per sequence position; dropping the stream must promptly release the
//!   producer's underlying resources.
//! - `bind_tools` returns a new instance with tools attached; the original is
//!   unchanged and safe for concurrent reuse with a different tool set.
//! - `model_id` is a stable identifier and never fails.
//!
//! # Implementing a provider
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use durable_agent::{
//!     ChatModel, ChunkStream, GenerateOption, Message, RequestScope, Result, ToolDefinition,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct EchoModel {
//!     tools: Vec<ToolDefinition>,
//! }
//!
//! #[async_trait]
//! impl ChatModel for EchoModel {
//!     async fn generate(
//!         &self,
//!         scope: &RequestScope,
//!         messages: &[Message],
//!         options: &[GenerateOption],
//!     ) -> Result<Message> {
//!         durable_agent::validate_generate_input(scope, messages, options)?;
//!         let last = messages.last().unwrap();
//!         Ok(Message::ai(last.text()).with_model_id(self.model_id()))
//!     }
//!
//!     async fn stream(
//!         &self,
//!         scope: &RequestScope,
//!         messages: &[Message],
//!         options: &[GenerateOption],
//!     ) -> Result<ChunkStream> {
//!         let reply = self.generate(scope, messages, options).await?;
//!         Ok(durable_agent::stream_from_message(reply))
//!     }
//!
//!     fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Arc<dyn ChatModel> {
//!         Arc::new(EchoModel { tools })
//!     }
//!
//!     fn model_id(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn bound_tools(&self) -> &[ToolDefinition] {
//!         &self.tools
//!     }
//! }
//! ```

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::scope::RequestScope;
use crate::types::{FinishReason, GenerateOption, GenerateOptions, Message, StreamChunk, ToolDefinition};
use crate::{Error, Result};

/// Lazy sequence of stream chunks; each item is independently a value or an
/// in-band error. Finite and non-restartable.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// A chat-capable language model.
///
/// Instances must be safe for concurrent `generate`/`stream` calls. See the
/// module docs for the full contract.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Runs one generation and returns the complete AI message.
    async fn generate(
        &self,
        scope: &RequestScope,
        messages: &[Message],
        options: &[GenerateOption],
    ) -> Result<Message>;

    /// Runs one generation, yielding incremental chunks.
    async fn stream(
        &self,
        scope: &RequestScope,
        messages: &[Message],
        options: &[GenerateOption],
    ) -> Result<ChunkStream>;

    /// Returns a new model with the given tools attached. The receiver is
    /// unchanged; implementations share inner state copy-on-write.
    fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Arc<dyn ChatModel>;

    /// Stable identifier for this model.
    fn model_id(&self) -> &str;

    /// Tools currently bound to this instance.
    fn bound_tools(&self) -> &[ToolDefinition] {
        &[]
    }
}

/// Shared entry validation for `generate`/`stream` implementations.
///
/// Checks the scope, rejects empty input, and resolves option modifiers so
/// range violations fail before any network round trip.
pub fn validate_generate_input(
    scope: &RequestScope,
    messages: &[Message],
    options: &[GenerateOption],
) -> Result<GenerateOptions> {
    scope.check()?;
    if messages.is_empty() {
        return Err(Error::invalid_input("message list cannot be empty"));
    }
    GenerateOptions::resolve(options)
}

/// Adapts a complete AI message into a two-chunk stream: the full text as a
/// single delta, then a terminal chunk with the finish reason.
///
/// Providers without native streaming use this to satisfy the `stream` side
/// of the contract.
pub fn stream_from_message(message: Message) -> ChunkStream {
    let finish = if message.tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    };
    let mut terminal = StreamChunk::finished(finish);
    terminal.usage = message.usage;
    let chunks = vec![Ok(StreamChunk::delta(message.text())), Ok(terminal)];
    Box::pin(futures::stream::iter(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[derive(Clone, Default)]
    struct EchoModel {
        tools: Vec<ToolDefinition>,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn generate(
            &self,
            scope: &RequestScope,
            messages: &[Message],
            options: &[GenerateOption],
        ) -> Result<Message> {
            validate_generate_input(scope, messages, options)?;
            let last = messages.last().expect("validated non-empty");
            Ok(Message::ai(last.text()).with_model_id(self.model_id()))
        }

        async fn stream(
            &self,
            scope: &RequestScope,
            messages: &[Message],
            options: &[GenerateOption],
        ) -> Result<ChunkStream> {
            let reply = self.generate(scope, messages, options).await?;
            Ok(stream_from_message(reply))
        }

        fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Arc<dyn ChatModel> {
            Arc::new(EchoModel { tools })
        }

        fn model_id(&self) -> &str {
            "echo"
        }

        fn bound_tools(&self) -> &[ToolDefinition] {
            &self.tools
        }
    }

    #[tokio::test]
    async fn test_generate_echoes_last_message() {
        let model = EchoModel::default();
        let scope = RequestScope::new();
        let reply = model
            .generate(
                &scope,
                &[Message::system("S"), Message::human("hello")],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(reply.text(), "hello");
        assert_eq!(reply.model_id.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn test_generate_empty_messages_fails() {
        let model = EchoModel::default();
        let scope = RequestScope::new();
        let err = model.generate(&scope, &[], &[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_options() {
        let model = EchoModel::default();
        let scope = RequestScope::new();
        let err = model
            .generate(
                &scope,
                &[Message::human("x")],
                &[GenerateOption::Temperature(9.0)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_generate_canceled_scope_fails() {
        let model = EchoModel::default();
        let scope = RequestScope::new();
        scope.cancel();
        let err = model
            .generate(&scope, &[Message::human("x")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }

    #[tokio::test]
    async fn test_bind_tools_leaves_original_unchanged() {
        let model = Arc::new(EchoModel::default());
        let bound = model.bind_tools(vec![ToolDefinition::new("t", "d", json!({}))]);

        assert_eq!(model.bound_tools().len(), 0);
        assert_eq!(bound.bound_tools().len(), 1);
        assert_eq!(model.model_id(), bound.model_id());
    }

    #[tokio::test]
    async fn test_stream_from_message_shape() {
        let mut stream = stream_from_message(Message::ai("hi"));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta, "hi");
        let last = stream.next().await.unwrap().unwrap();
        assert_eq!(last.finish_reason, Some(FinishReason::Stop));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_tool_calls_finish_reason() {
        let msg = Message::ai("").with_tool_calls(vec![crate::types::ToolCall::new(
            "c1", "calc", "{}",
        )]);
        let chunks: Vec<_> = stream_from_message(msg).collect().await;
        let last = chunks.last().unwrap().as_ref().unwrap();
        assert_eq!(last.finish_reason, Some(FinishReason::ToolCalls));
    }
}
