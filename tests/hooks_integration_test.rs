//! Integration tests for middleware stacks and hook composition around a
//! working chat model.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use durable_agent::{
    ChatModel, ChunkStream, Error, GenerateOption, Hooks, Message, RequestScope, Result,
    ToolCall, ToolDefinition, apply_middleware, validate_generate_input, with_hooks,
};
use futures::StreamExt;

/// Model that always answers with one tool call, for tool-hook tests.
#[derive(Clone, Default)]
struct ToolCallingModel {
    tools: Vec<ToolDefinition>,
}

#[async_trait]
impl ChatModel for ToolCallingModel {
    async fn generate(
        &self,
        scope: &RequestScope,
        messages: &[Message],
        options: &[GenerateOption],
    ) -> Result<Message> {
        validate_generate_input(scope, messages, options)?;
        Ok(Message::ai("let me check")
            .with_tool_calls(vec![ToolCall::new("call_1", "lookup", r#"{"q":"x"}"#)])
            .with_model_id(self.model_id()))
    }

    async fn stream(
        &self,
        scope: &RequestScope,
        messages: &[Message],
        options: &[GenerateOption],
    ) -> Result<ChunkStream> {
        validate_generate_input(scope, messages, options)?;
        let chunks = vec![
            Ok(durable_agent::StreamChunk::delta("let me check")),
            Ok(durable_agent::StreamChunk {
                tool_call_delta: Some(ToolCall::new("call_1", "lookup", r#"{"q":"x"}"#)),
                ..Default::default()
            }),
            Ok(durable_agent::StreamChunk::finished(
                durable_agent::FinishReason::ToolCalls,
            )),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Arc<dyn ChatModel> {
        Arc::new(ToolCallingModel { tools })
    }

    fn model_id(&self) -> &str {
        "tool-caller"
    }

    fn bound_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }
}

#[tokio::test]
async fn test_on_tool_call_fires_per_call() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);

    let hooks = Hooks::new().on_tool_call(move |call| {
        let seen = Arc::clone(&seen_clone);
        async move {
            seen.lock().unwrap().push(call.name);
        }
    });

    let model = apply_middleware(
        Arc::new(ToolCallingModel::default()),
        &[with_hooks(hooks)],
    );
    let reply = model
        .generate(&RequestScope::new(), &[Message::human("find x")], &[])
        .await
        .unwrap();

    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(seen.lock().unwrap().as_slice(), ["lookup"]);
}

#[tokio::test]
async fn test_full_stack_ordering_across_three_layers() {
    let trace: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let layer = |label: &'static str, trace: &Arc<Mutex<Vec<String>>>| {
        let before_trace = Arc::clone(trace);
        let after_trace = Arc::clone(trace);
        with_hooks(
            Hooks::new()
                .on_before_call(move |_| {
                    let trace = Arc::clone(&before_trace);
                    async move {
                        trace.lock().unwrap().push(format!("before:{label}"));
                        Ok(())
                    }
                })
                .on_after_call(move |_| {
                    let trace = Arc::clone(&after_trace);
                    async move {
                        trace.lock().unwrap().push(format!("after:{label}"));
                    }
                }),
        )
    };

    let model = apply_middleware(
        Arc::new(ToolCallingModel::default()),
        &[
            layer("auth", &trace),
            layer("audit", &trace),
            layer("metrics", &trace),
        ],
    );
    model
        .generate(&RequestScope::new(), &[Message::human("x")], &[])
        .await
        .unwrap();

    assert_eq!(
        trace.lock().unwrap().as_slice(),
        [
            "before:auth",
            "before:audit",
            "before:metrics",
            "after:metrics",
            "after:audit",
            "after:auth",
        ]
    );
}

#[tokio::test]
async fn test_composed_hooks_behave_like_stack() {
    let trace: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let t1 = Arc::clone(&trace);
    let t2 = Arc::clone(&trace);

    let composed = Hooks::compose(vec![
        Hooks::new().on_before_call(move |_| {
            let trace = Arc::clone(&t1);
            async move {
                trace.lock().unwrap().push("first".to_string());
                Ok(())
            }
        }),
        Hooks::new().on_before_call(move |_| {
            let trace = Arc::clone(&t2);
            async move {
                trace.lock().unwrap().push("second".to_string());
                Ok(())
            }
        }),
    ]);

    let model = apply_middleware(
        Arc::new(ToolCallingModel::default()),
        &[with_hooks(composed)],
    );
    model
        .generate(&RequestScope::new(), &[Message::human("x")], &[])
        .await
        .unwrap();

    assert_eq!(trace.lock().unwrap().as_slice(), ["first", "second"]);
}

#[tokio::test]
async fn test_stream_hooks_observe_tool_call_delta() {
    let tool_calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let chunk_count = Arc::new(Mutex::new(0usize));

    let tc = Arc::clone(&tool_calls);
    let cc = Arc::clone(&chunk_count);
    let hooks = Hooks::new()
        .on_stream_chunk(move |_| {
            let count = Arc::clone(&cc);
            async move {
                *count.lock().unwrap() += 1;
            }
        })
        .on_tool_call(move |call| {
            let seen = Arc::clone(&tc);
            async move {
                seen.lock().unwrap().push(call.id);
            }
        });

    let model = apply_middleware(
        Arc::new(ToolCallingModel::default()),
        &[with_hooks(hooks)],
    );
    let stream = model
        .stream(&RequestScope::new(), &[Message::human("x")], &[])
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(*chunk_count.lock().unwrap(), 3);
    assert_eq!(tool_calls.lock().unwrap().as_slice(), ["call_1"]);
}

#[tokio::test]
async fn test_error_suppression_yields_empty_ai_message() {
    struct AlwaysFails;

    #[async_trait]
    impl ChatModel for AlwaysFails {
        async fn generate(
            &self,
            _scope: &RequestScope,
            _messages: &[Message],
            _options: &[GenerateOption],
        ) -> Result<Message> {
            Err(Error::provider("down"))
        }

        async fn stream(
            &self,
            _scope: &RequestScope,
            _messages: &[Message],
            _options: &[GenerateOption],
        ) -> Result<ChunkStream> {
            Err(Error::provider("down"))
        }

        fn bind_tools(&self, _tools: Vec<ToolDefinition>) -> Arc<dyn ChatModel> {
            Arc::new(AlwaysFails)
        }

        fn model_id(&self) -> &str {
            "always-fails"
        }
    }

    let hooks = Hooks::new().on_error(|_| async move { None });
    let model = apply_middleware(Arc::new(AlwaysFails), &[with_hooks(hooks)]);

    let reply = model
        .generate(&RequestScope::new(), &[Message::human("x")], &[])
        .await
        .unwrap();
    assert_eq!(reply.text(), "");
}
