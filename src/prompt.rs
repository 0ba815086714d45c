//! Prompt templates and cache-optimal prompt assembly
//!
//! Two pieces live here. [`PromptTemplate`] is a named, versioned template
//! rendered with variable defaults that callers can override.
//! [`PromptBuilder`] arranges a full prompt across six ordered slots so the
//! most static content comes first and the most dynamic content last.
//!
//! Provider prompt caches key on the longest unchanging prefix, so the slot
//! order directly determines cache hit rates across consecutive calls:
//!
//! 1. System prompt (most static)
//! 2. Tool definitions block (semi-static)
//! 3. Static context documents
//! 4. Cache breakpoint marker (optional)
//! 5. Dynamic conversation history
//! 6. User input (always changes, always last)
//!
//! Empty slots are omitted. The builder produces a message list; it never
//! calls a model.
//!
//! # Examples
//!
//! ```rust
//! use durable_agent::{PromptBuilder, Role, ToolDefinition};
//! use serde_json::json;
//!
//! let messages = PromptBuilder::new()
//!     .system_prompt("You are X")
//!     .tool(ToolDefinition::new("t", "d", json!({})))
//!     .cache_breakpoint()
//!     .user_input("hi")
//!     .build();
//!
//! assert_eq!(messages.len(), 4);
//! assert_eq!(messages.last().unwrap().role, Role::Human);
//! ```

use serde_json::{Map, Value};

use crate::types::{Message, ToolDefinition};
use crate::{Error, Result};

/// Metadata key marking the cache breakpoint message produced by
/// [`PromptBuilder::cache_breakpoint`].
pub const CACHE_BREAKPOINT_KEY: &str = "cache_breakpoint";

// ============================================================================
// PROMPT TEMPLATE
// ============================================================================

/// A named template with default variable values.
///
/// Templates are immutable once constructed. Rendering merges the template's
/// defaults under caller-supplied variables (caller wins) and executes the
/// source with minijinja syntax (`{{ variable }}`).
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    version: String,
    content: String,
    variables: Map<String, Value>,
    metadata: Map<String, Value>,
}

impl PromptTemplate {
    /// Creates a template. Name and content are mandatory; validation
    /// happens in [`PromptTemplate::validate`] or on first render.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1".to_string(),
            content: content.into(),
            variables: Map::new(),
            metadata: Map::new(),
        }
    }

    /// Sets the template version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets a default value for one variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Sets one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the template version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the raw template source.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the default variable values.
    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Rejects empty name or content and unparseable template source.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("template name cannot be empty"));
        }
        if self.content.trim().is_empty() {
            return Err(Error::invalid_input("template content cannot be empty"));
        }
        let env = minijinja::Environment::new();
        env.template_from_str(&self.content)
            .map_err(|e| Error::invalid_input(format!("template {:?}: {e}", self.name)))?;
        Ok(())
    }

    /// Renders the template with the given variables merged over defaults.
    ///
    /// # Errors
    ///
    /// Validation failures surface as [`Error::InvalidInput`]; runtime render
    /// failures (e.g. an undefined strict lookup) do as well.
    pub fn render(&self, vars: &Map<String, Value>) -> Result<String> {
        self.validate()?;

        // Defaults first, caller values override.
        let mut context = self.variables.clone();
        for (key, value) in vars {
            context.insert(key.clone(), value.clone());
        }

        let env = minijinja::Environment::new();
        let template = env
            .template_from_str(&self.content)
            .map_err(|e| Error::invalid_input(format!("template {:?}: {e}", self.name)))?;
        template
            .render(&context)
            .map_err(|e| Error::invalid_input(format!("template {:?}: {e}", self.name)))
    }
}

// ============================================================================
// PROMPT BUILDER
// ============================================================================

/// Assembles a prompt across the six cache-ordered slots.
///
/// See the module docs for the ordering rationale. `build` never fails; a
/// builder with every slot empty produces an empty message list.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
    static_context: Vec<String>,
    cache_breakpoint: bool,
    history: Vec<Message>,
    user_input: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot 1: the system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Slot 2: adds one tool definition to the tools block.
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Slot 2: adds several tool definitions.
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Slot 3: adds one static context document.
    pub fn context_document(mut self, document: impl Into<String>) -> Self {
        self.static_context.push(document.into());
        self
    }

    /// Slot 4: inserts the cache breakpoint marker after the static slots.
    ///
    /// The marker is a zero-content system message whose metadata carries
    /// [`CACHE_BREAKPOINT_KEY`] = `true`. Consumers that honor provider
    /// cache boundaries use it to demarcate the cached prefix.
    pub fn cache_breakpoint(mut self) -> Self {
        self.cache_breakpoint = true;
        self
    }

    /// Slot 5: appends one dynamic history message.
    pub fn history_message(mut self, message: Message) -> Self {
        self.history.push(message);
        self
    }

    /// Slot 5: appends several dynamic history messages.
    pub fn history(mut self, messages: Vec<Message>) -> Self {
        self.history.extend(messages);
        self
    }

    /// Slot 6: the user input, always last.
    pub fn user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    /// Produces the ordered message list. Empty slots are omitted.
    pub fn build(self) -> Vec<Message> {
        let mut messages = Vec::new();

        if let Some(system) = self.system_prompt {
            if !system.is_empty() {
                messages.push(Message::system(system));
            }
        }

        if !self.tools.is_empty() {
            let mut block = String::from("Available tools:");
            for tool in &self.tools {
                block.push_str(&format!("\n- {}: {}", tool.name, tool.description));
            }
            messages.push(Message::system(block));
        }

        for document in self.static_context {
            messages.push(Message::system(document));
        }

        if self.cache_breakpoint {
            messages.push(
                Message::system("").with_metadata(CACHE_BREAKPOINT_KEY, Value::Bool(true)),
            );
        }

        messages.extend(self.history);

        if let Some(input) = self.user_input {
            if !input.is_empty() {
                messages.push(Message::human(input));
            }
        }

        messages
    }
}
