//! Core type definitions for the Durable Agent SDK.
//!
//! This module contains the fundamental data structures used throughout the SDK
//! for talking to chat-model capabilities. The type system is organized into
//! three main categories:
//!
//! # Message System
//!
//! The SDK uses a flexible message system that supports multi-modal content:
//!
//! - [`Message`]: Container for conversation messages with role, parts, and metadata
//! - [`Role`]: Enum defining who sent the message (System, Human, Ai, Tool)
//! - [`ContentPart`]: Tagged variant for different content modalities (text, image, audio)
//!
//! # Tool Calling
//!
//! - [`ToolDefinition`]: Declares a callable function (name, description, JSON schema)
//! - [`ToolCall`]: A model's request to invoke a tool, correlated by ID with a
//!   subsequent tool-role message
//!
//! # Generation Options & Streaming
//!
//! - [`GenerateOption`]: Composable per-call modifiers (temperature, max tokens, ...)
//! - [`GenerateOptions`]: The validated, resolved form consumed by providers
//! - [`StreamChunk`] / [`FinishReason`] / [`TokenUsage`]: Incremental output shapes
//!
//! # Design Notes
//!
//! Internal SDK types are distinct from any provider wire format. Providers map
//! these shapes onto their own APIs; nothing in this module knows about HTTP.
//! Messages are treated as immutable once constructed: builders return new
//! values rather than mutating in place.
//!
//! # Example
//!
//! ```rust
//! use durable_agent::{Message, GenerateOption};
//!
//! let messages = vec![
//!     Message::system("You are a helpful assistant"),
//!     Message::human("What's the capital of France?"),
//! ];
//!
//! let opts = [
//!     GenerateOption::Temperature(0.2),
//!     GenerateOption::MaxTokens(512),
//! ];
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

// ============================================================================
// ROLES AND CONTENT PARTS
// ============================================================================

/// Identifies the sender/role of a message in the conversation.
///
/// Serializes to lowercase strings (`"system"`, `"human"`, `"ai"`, `"tool"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message that establishes behavior and context.
    System,
    /// Input from the human or the calling application.
    Human,
    /// Response from the model; may carry tool calls.
    Ai,
    /// Result of a tool execution, correlated by `tool_call_id`.
    Tool,
}

/// Serde helper: binary part payloads travel as base64 strings in JSON.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// One modality of content inside a [`Message`].
///
/// Uses serde's internally tagged format with a `"type"` field:
///
/// ```json
/// {"type": "text", "text": "Hello"}
/// {"type": "image", "data": "aGk=", "mime_type": "image/png"}
/// ```
///
/// The enum is non-exhaustive: new modalities can be added without breaking
/// downstream matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ContentPart {
    /// Plain text content.
    Text { text: String },

    /// Binary image content with its MIME type.
    Image {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        mime_type: String,
    },

    /// Binary audio content with its MIME type.
    Audio {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        mime_type: String,
    },
}

impl ContentPart {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Creates an image part from raw bytes.
    pub fn image(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ContentPart::Image {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Creates an audio part from raw bytes.
    pub fn audio(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ContentPart::Audio {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Returns the text if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

// ============================================================================
// TOOL DEFINITIONS AND CALLS
// ============================================================================

/// Declares a function the model may call.
///
/// The schema is a JSON-Schema-shaped value; the SDK passes it through to
/// providers without interpreting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Tool name, unique within one bound tool set.
    pub name: String,
    /// Human/model readable description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Creates a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A model's request to invoke one tool.
///
/// The `id` is unique within the AI message that carries the call; the
/// caller answers with a tool-role message referencing the same ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this call within its message.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw argument payload as produced by the model (usually JSON text).
    pub arguments: String,
}

impl ToolCall {
    /// Creates a new tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parses the argument payload as JSON.
    pub fn arguments_json(&self) -> Result<Value> {
        serde_json::from_str(&self.arguments)
            .map_err(|e| Error::serialization(format!("tool call arguments: {e}")))
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// A complete message in a conversation.
///
/// Messages are the primary unit of communication. Each message has a role,
/// an ordered sequence of [`ContentPart`]s, and a free-form metadata map that
/// carries cache markers, tenant IDs, and trace IDs across layers.
///
/// Role-specific fields agree with the role by construction: the
/// [`Message::tool`] constructor requires a tool-call ID, and only
/// [`Message::ai`] messages carry tool calls or a model ID.
///
/// # Message Patterns
///
/// ```rust
/// use durable_agent::{Message, ToolCall};
///
/// let question = Message::human("What's the weather?");
///
/// let answer = Message::ai("Let me check.")
///     .with_tool_calls(vec![ToolCall::new("call_1", "get_weather", "{}")])
///     .with_model_id("fake-model");
///
/// let result = Message::tool("call_1", r#"{"temp": 21}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The role/sender of this message.
    pub role: Role,

    /// Ordered content parts making up the message body.
    pub parts: Vec<ContentPart>,

    /// Free-form metadata (cache markers, tenant IDs, trace IDs).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,

    /// On tool messages: the ID of the tool call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// On AI messages: the identifier of the model that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// On AI messages: tool invocations requested by the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// On AI messages: token accounting reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Message {
    fn with_role(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            parts,
            metadata: serde_json::Map::new(),
            tool_call_id: None,
            model_id: None,
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    /// Creates a system message with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, vec![ContentPart::text(text)])
    }

    /// Creates a human message with a single text part.
    pub fn human(text: impl Into<String>) -> Self {
        Self::with_role(Role::Human, vec![ContentPart::text(text)])
    }

    /// Creates a human message from explicit content parts.
    pub fn human_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::with_role(Role::Human, parts)
    }

    /// Creates an AI message with a single text part.
    pub fn ai(text: impl Into<String>) -> Self {
        Self::with_role(Role::Ai, vec![ContentPart::text(text)])
    }

    /// Creates a tool result message answering the given tool call ID.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, vec![ContentPart::text(content)]);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attaches tool calls. Only meaningful on AI messages.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Records the producing model's identifier.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Records token usage reported by the provider.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Sets one metadata entry, returning the updated message.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Concatenates all text parts into one string.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Text of the first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(ContentPart::as_text)
    }
}

// ============================================================================
// STREAMING AND USAGE
// ============================================================================

/// Token accounting for one generation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Why a stream finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation.
    Stop,
    /// Token limit reached.
    Length,
    /// The model requested tool execution.
    ToolCalls,
    /// Output was filtered by the provider.
    ContentFilter,
    /// The request scope was canceled mid-stream.
    Canceled,
}

/// One incremental item in a streamed generation.
///
/// Chunks carry a text delta and/or a partial tool call. The final chunk of
/// a normally finishing stream carries a [`FinishReason`] and, when the
/// provider reports it, usage counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Incremental text since the previous chunk.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delta: String,

    /// Incremental tool call data, if the model is building a call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_delta: Option<ToolCall>,

    /// Present on the final chunk of a normal finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Usage counters, when the provider reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    /// A chunk carrying only a text delta.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            ..Default::default()
        }
    }

    /// A terminal chunk carrying a finish reason.
    pub fn finished(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Default::default()
        }
    }
}

// ============================================================================
// GENERATION OPTIONS
// ============================================================================

/// How the model should select tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    #[default]
    Auto,
    /// Never call a tool.
    None,
    /// A tool call is required.
    Required,
    /// Call the named tool specifically.
    Named(String),
}

/// One composable per-call modifier.
///
/// Callers pass a slice of modifiers to `generate`/`stream`; later entries
/// override earlier ones for the same field. [`GenerateOptions::resolve`]
/// validates ranges before any provider sees the request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOption {
    /// Sampling temperature, 0.0 to 2.0 inclusive.
    Temperature(f32),
    /// Maximum tokens to generate; must be positive.
    MaxTokens(u32),
    /// Nucleus sampling cutoff, 0.0 to 1.0 inclusive.
    TopP(f32),
    /// Sequences that terminate generation.
    StopSequences(Vec<String>),
    /// Free-form JSON or JSON-Schema response shaping.
    ResponseFormat(Value),
    /// Tool selection policy.
    ToolChoice(ToolChoice),
}

/// Resolved, validated generation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub response_format: Option<Value>,
    pub tool_choice: Option<ToolChoice>,
}

impl GenerateOptions {
    /// Applies a slice of modifiers, validating each.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for out-of-range temperature or
    /// top_p, or a zero max_tokens.
    pub fn resolve(options: &[GenerateOption]) -> Result<Self> {
        let mut resolved = GenerateOptions::default();
        for opt in options {
            match opt {
                GenerateOption::Temperature(t) => {
                    if !(0.0..=2.0).contains(t) {
                        return Err(Error::invalid_input(
                            "temperature must be between 0.0 and 2.0",
                        ));
                    }
                    resolved.temperature = Some(*t);
                }
                GenerateOption::MaxTokens(n) => {
                    if *n == 0 {
                        return Err(Error::invalid_input("max_tokens must be greater than 0"));
                    }
                    resolved.max_tokens = Some(*n);
                }
                GenerateOption::TopP(p) => {
                    if !(0.0..=1.0).contains(p) {
                        return Err(Error::invalid_input("top_p must be between 0.0 and 1.0"));
                    }
                    resolved.top_p = Some(*p);
                }
                GenerateOption::StopSequences(seqs) => {
                    resolved.stop_sequences = seqs.clone();
                }
                GenerateOption::ResponseFormat(v) => {
                    resolved.response_format = Some(v.clone());
                }
                GenerateOption::ToolChoice(c) => {
                    resolved.tool_choice = Some(c.clone());
                }
            }
        }
        Ok(resolved)
    }
}
