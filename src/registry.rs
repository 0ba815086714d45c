//! # Provider Registries
//!
//! Every extensible subsystem (chat models, embedders, stores, ...) uses the
//! same plugin mechanism: a [`Registry`] maps a provider name to a factory
//! that, given a [`ProviderConfig`], returns an instance of the capability.
//!
//! Registration is an explicit bootstrap step: each provider module exports a
//! `register(&Registry<..>)` function, and the application composes the exact
//! set it wants at process start, before any caller invokes
//! [`Registry::new_instance`]. Re-registering a name replaces the factory
//! (last wins) and logs a warning.
//!
//! # Examples
//!
//! ```rust,no_run
//! use durable_agent::{ChatModel, ProviderConfig, Registry};
//! use std::sync::Arc;
//!
//! # fn make_model(_: &ProviderConfig) -> durable_agent::Result<Arc<dyn ChatModel>> { unimplemented!() }
//! let registry: Registry<Arc<dyn ChatModel>> = Registry::new("chat_models");
//!
//! // Bootstrap (process init, single-threaded):
//! registry.register("acme", |config| make_model(config));
//!
//! // Later, from any thread:
//! let config = ProviderConfig::new().with_model("acme-large");
//! let model = registry.new_instance("acme", &config)?;
//! # Ok::<(), durable_agent::Error>(())
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;

use crate::{Error, Result};

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

/// Configuration record handed to provider factories.
///
/// Carries the common subset every provider understands plus a free-form
/// `options` map for provider-specific values. The recognized generic option
/// keys for chat-model providers are `temperature`, `max_tokens`, `top_p`,
/// `response_format`, and `tool_choice`.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API authentication key, if the provider needs one.
    pub api_key: Option<String>,

    /// Model identifier to instantiate.
    pub model: Option<String>,

    /// Endpoint override. Providers fall back to their default endpoint.
    pub base_url: Option<String>,

    /// Per-call timeout; zero means no timeout.
    pub timeout: Duration,

    /// Provider-specific values (scalars, lists, or nested maps).
    pub options: serde_json::Map<String, Value>,
}

impl ProviderConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the endpoint override.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-call timeout. Zero disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets one provider-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Reads an option as a float.
    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.options.get(key).and_then(Value::as_f64)
    }

    /// Reads an option as an unsigned integer.
    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(Value::as_u64)
    }

    /// Reads an option as a string slice.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Factory signature: configuration in, capability instance or error out.
pub type Factory<T> = Arc<dyn Fn(&ProviderConfig) -> Result<T> + Send + Sync>;

/// Name-keyed factory map for one capability family.
///
/// `register` runs during single-threaded initialization; `new_instance` and
/// `list` are safe for concurrent callers afterwards (a read-write lock
/// protects the map either way). The registry owns factory functions only,
/// never instances.
pub struct Registry<T> {
    /// Family label used in log output (e.g. "chat_models").
    family: &'static str,
    factories: RwLock<HashMap<String, Factory<T>>>,
}

impl<T> Registry<T> {
    /// Creates an empty registry for the named capability family.
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Adds or replaces the factory for `name`.
    ///
    /// Last registration wins; replacing an existing name logs a warning so
    /// accidental double-bootstrap shows up in the logs.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ProviderConfig) -> Result<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if factories.insert(name.clone(), Arc::new(factory)).is_some() {
            log::warn!(
                "{}: provider {:?} registered twice; last registration wins",
                self.family,
                name
            );
        }
    }

    /// Instantiates the named provider with the given configuration.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProvider`] when the name is unregistered; factory
    /// errors propagate unchanged. No retries happen at this layer.
    pub fn new_instance(&self, name: &str, config: &ProviderConfig) -> Result<T> {
        let factory = {
            let factories = self
                .factories
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            factories
                .get(name)
                .cloned()
                .ok_or_else(|| Error::unknown_provider(name))?
        };
        // Factory runs outside the lock: it may be slow or re-enter the registry.
        factory(config)
    }

    /// Returns all registered provider names, sorted.
    pub fn list(&self) -> Vec<String> {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether the name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(name)
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("family", &self.family)
            .field("providers", &self.list())
            .finish()
    }
}
