//! Request scopes: cancellation, deadlines, and tenant propagation
//!
//! Every public async operation in the SDK takes a [`RequestScope`]. The
//! scope bundles the cancellation signal, an optional deadline, and the
//! identifiers (tenant, trace) that must flow through to every
//! sub-operation a call spawns.
//!
//! # Examples
//!
//! ```rust,no_run
//! use durable_agent::RequestScope;
//! use std::time::Duration;
//!
//! # async fn example() -> durable_agent::Result<()> {
//! // A scope with a 30 second deadline
//! let scope = RequestScope::new().with_timeout(Duration::from_secs(30));
//!
//! // Pass a child scope into a sub-operation; canceling the parent
//! // cancels the child, but not vice versa.
//! let child = scope.child();
//!
//! scope.cancel();
//! assert!(child.is_canceled());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Cancellation signal plus ambient request identity.
///
/// Scopes form a tree: [`RequestScope::child`] creates a scope whose
/// token is canceled whenever the parent's is. Deadlines are implemented
/// as a cancellation scheduled at a relative offset, so a timed-out scope
/// and an explicitly canceled one behave identically at suspension points.
///
/// Cloning a scope shares the same underlying token.
#[derive(Debug, Clone)]
pub struct RequestScope {
    token: CancellationToken,
    /// When set and in the past, a tripped token reports `Timeout` rather
    /// than `Canceled`.
    deadline: Option<std::time::Instant>,
    tenant_id: Option<String>,
    trace_id: Option<String>,
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestScope {
    /// Creates a root scope with no deadline and no identity.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            tenant_id: None,
            trace_id: None,
        }
    }

    /// Schedules cancellation after `timeout`. Zero means no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            return self;
        }
        let deadline = std::time::Instant::now() + timeout;
        self.deadline = Some(deadline);
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
        self
    }

    /// Sets the tenant identifier carried to sub-operations.
    pub fn with_tenant_id(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant.into());
        self
    }

    /// Sets the trace identifier carried to sub-operations.
    pub fn with_trace_id(mut self, trace: impl Into<String>) -> Self {
        self.trace_id = Some(trace.into());
        self
    }

    /// Returns the tenant identifier, if set.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Returns the trace identifier, if set.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Creates a child scope. Canceling the parent cancels the child;
    /// canceling the child leaves the parent running. Identity fields
    /// are inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            tenant_id: self.tenant_id.clone(),
            trace_id: self.trace_id.clone(),
        }
    }

    /// Cancels the scope and all children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the scope has been canceled (explicitly or by deadline).
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the scope is canceled. Intended for `tokio::select!`
    /// against suspendable work.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Returns an error if the scope has been tripped.
    ///
    /// A deadline that has passed reports [`Error::Timeout`]; an explicit
    /// cancellation reports [`Error::Canceled`]. CPU-only code calls this
    /// at loop boundaries to honor cancellation without suspension points.
    pub fn check(&self) -> Result<()> {
        if !self.token.is_cancelled() {
            return Ok(());
        }
        match self.deadline {
            Some(deadline) if std::time::Instant::now() >= deadline => Err(Error::Timeout),
            _ => Err(Error::Canceled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_scope_not_canceled() {
        let scope = RequestScope::new();
        assert!(!scope.is_canceled());
        assert!(scope.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_child() {
        let scope = RequestScope::new();
        let child = scope.child();
        scope.cancel();
        assert!(child.is_canceled());
        assert!(matches!(child.check(), Err(Error::Canceled)));
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_affect_parent() {
        let scope = RequestScope::new();
        let child = scope.child();
        child.cancel();
        assert!(!scope.is_canceled());
    }

    #[tokio::test]
    async fn test_zero_timeout_means_no_deadline() {
        let scope = RequestScope::new().with_timeout(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!scope.is_canceled());
    }

    #[tokio::test]
    async fn test_deadline_reports_timeout() {
        let scope = RequestScope::new().with_timeout(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(scope.is_canceled());
        assert!(matches!(scope.check(), Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_identity_inherited_by_child() {
        let scope = RequestScope::new()
            .with_tenant_id("tenant-1")
            .with_trace_id("trace-9");
        let child = scope.child();
        assert_eq!(child.tenant_id(), Some("tenant-1"));
        assert_eq!(child.trace_id(), Some("trace-9"));
    }
}
