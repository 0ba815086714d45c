//! Error types for the Durable Agent SDK

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK
///
/// Each variant corresponds to one failure kind with its own retry policy
/// (see [`Error::retryable`]). Variants that wrap upstream failures carry
/// an optional boxed cause so the original error is preserved through the
/// middleware and executor layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed template, empty workflow ID, missing required config
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Registry lookup miss
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Upstream LLM/service failure other than rate limiting
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// Upstream rate-limit signal
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// Deadline exceeded
    #[error("Request timeout")]
    Timeout,

    /// Request scope was canceled
    #[error("Operation canceled")]
    Canceled,

    /// Workflow store I/O failure
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// A2A transport failure
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// State cannot be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unreachable state or logic bug
    #[error("Internal error: {0}")]
    Internal(String),

    /// Retryability override wrapping any other kind
    #[error("{inner}")]
    RetryableOverride {
        #[source]
        inner: Box<Error>,
        retryable: bool,
    },
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new unknown provider error
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Error::UnknownProvider(name.into())
    }

    /// Create a new provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider {
            message: msg.into(),
            cause: None,
        }
    }

    /// Create a provider error wrapping an underlying cause
    pub fn provider_with_cause(msg: impl Into<String>, cause: Error) -> Self {
        Error::Provider {
            message: msg.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Create a new rate limit error
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Error::RateLimit(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create a canceled error
    pub fn canceled() -> Self {
        Error::Canceled
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage {
            message: msg.into(),
            cause: None,
        }
    }

    /// Create a storage error wrapping an underlying cause
    pub fn storage_with_cause(msg: impl Into<String>, cause: Error) -> Self {
        Error::Storage {
            message: msg.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport {
            message: msg.into(),
            cause: None,
        }
    }

    /// Create a new serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Error::Serialization(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Wrap this error with an explicit retryability override.
    ///
    /// Useful when a caller knows better than the default classification,
    /// e.g. a provider 500 that is known to be transient.
    pub fn with_retryable(self, retryable: bool) -> Self {
        Error::RetryableOverride {
            inner: Box::new(self),
            retryable,
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// Rate limits, timeouts, storage and transport failures are transient;
    /// everything else surfaces immediately. Provider errors are
    /// conditionally retryable and default to no retry unless overridden
    /// via [`Error::with_retryable`].
    pub fn retryable(&self) -> bool {
        match self {
            Error::RetryableOverride { retryable, .. } => *retryable,
            Error::RateLimit(_) | Error::Timeout => true,
            Error::Storage { .. } | Error::Transport { .. } => true,
            Error::InvalidInput(_)
            | Error::UnknownProvider(_)
            | Error::Provider { .. }
            | Error::Canceled
            | Error::Serialization(_)
            | Error::Internal(_) => false,
        }
    }

    /// Short machine-readable name for the error kind (used when
    /// serializing failures into workflow history and A2A messages).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::UnknownProvider(_) => "unknown_provider",
            Error::Provider { .. } => "provider",
            Error::RateLimit(_) => "rate_limit",
            Error::Timeout => "timeout",
            Error::Canceled => "canceled",
            Error::Storage { .. } => "storage",
            Error::Transport { .. } => "transport",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
            Error::RetryableOverride { inner, .. } => inner.kind(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport {
                message: e.to_string(),
                cause: None,
            }
        }
    }
}
