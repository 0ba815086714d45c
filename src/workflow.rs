//! Durable workflow state: status lifecycle and the history event log
//!
//! A [`WorkflowState`] is the single persisted unit of the workflow engine.
//! It carries the caller-supplied `workflow_id` (primary key), a per-attempt
//! `run_id`, the status lifecycle, opaque input/output, and an append-only
//! history of [`HistoryEvent`]s whose IDs are strictly monotonic within the
//! state (generated from a per-state counter, never a global one, so replay
//! from persisted state is deterministic).
//!
//! States serialize as self-describing JSON. Unknown fields are preserved
//! round-trip through the `extra` maps so mixed-version deployments do not
//! corrupt each other's rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ============================================================================
// STATUS
// ============================================================================

/// Execution status of one workflow run.
///
/// Transitions are monotonic: `pending → running → {completed | failed |
/// canceled}`, enforced by [`WorkflowState::transition_to`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl WorkflowStatus {
    /// Whether this status ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Canceled
        )
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        match self {
            WorkflowStatus::Pending => matches!(
                next,
                WorkflowStatus::Running
                    | WorkflowStatus::Failed
                    | WorkflowStatus::Canceled
            ),
            WorkflowStatus::Running => next.is_terminal(),
            // Terminal states accept nothing further
            _ => false,
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// HISTORY EVENTS
// ============================================================================

/// Type tag of one history event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    WorkflowStarted,
    ActivityStarted,
    ActivityCompleted,
    ActivityFailed,
    TimerStarted,
    TimerFired,
    SignalReceived,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCanceled,
}

impl HistoryEventType {
    /// Whether the event closes a run's history log.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HistoryEventType::WorkflowCompleted
                | HistoryEventType::WorkflowFailed
                | HistoryEventType::WorkflowCanceled
        )
    }
}

/// One immutable entry in a workflow run's durable log.
///
/// IDs are assigned by [`WorkflowState::append_event`]; constructing an
/// event leaves the ID at zero until it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEvent {
    /// Monotonic position within the owning state, starting at 1.
    pub id: u64,

    #[serde(rename = "type")]
    pub event_type: HistoryEventType,

    pub timestamp: DateTime<Utc>,

    /// Name of the activity, for activity events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_name: Option<String>,

    /// Input captured when work started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    /// Result captured on completion events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error captured on failure events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkflowError>,

    /// Unknown fields from newer writers, preserved round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryEvent {
    /// Creates an event of the given type stamped with the current time.
    pub fn new(event_type: HistoryEventType) -> Self {
        Self {
            id: 0,
            event_type,
            timestamp: Utc::now(),
            activity_name: None,
            input: None,
            result: None,
            error: None,
            extra: Map::new(),
        }
    }

    pub fn with_activity_name(mut self, name: impl Into<String>) -> Self {
        self.activity_name = Some(name.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: WorkflowError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Serializable failure record stored in states and history events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowError {
    /// Machine-readable kind name, matching [`Error::kind`].
    pub kind: String,
    pub message: String,
}

impl WorkflowError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&Error> for WorkflowError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// WORKFLOW STATE
// ============================================================================

/// The persisted record of one workflow.
///
/// Owned by the [`WorkflowStore`](crate::WorkflowStore); in-memory handles
/// are working copies that become durable only on `save`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    /// Caller-supplied unique identifier; primary key in the store.
    pub workflow_id: String,

    /// Unique per execution attempt of the same workflow ID.
    pub run_id: String,

    pub status: WorkflowStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkflowError>,

    #[serde(default)]
    pub history: Vec<HistoryEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Touched periodically while a host is executing the run; a `running`
    /// state with a stale heartbeat is treated as crashed on the next
    /// executor startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<DateTime<Utc>>,

    /// Unknown fields from newer writers, preserved round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowState {
    /// Creates a pending state for a new run.
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>, input: Value) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            status: WorkflowStatus::Pending,
            input: Some(input),
            output: None,
            error: None,
            history: Vec::new(),
            started_at: None,
            completed_at: None,
            heartbeat_at: None,
            extra: Map::new(),
        }
    }

    /// Next history event ID from the per-state counter.
    pub fn next_event_id(&self) -> u64 {
        self.history.last().map(|e| e.id).unwrap_or(0) + 1
    }

    /// Appends an event, stamping its monotonic ID. Returns the ID used.
    pub fn append_event(&mut self, mut event: HistoryEvent) -> u64 {
        let id = self.next_event_id();
        event.id = id;
        self.history.push(event);
        id
    }

    /// Moves to `next`, enforcing the monotonic lifecycle.
    ///
    /// Sets `started_at` when entering `running` and `completed_at` exactly
    /// when entering a terminal status.
    pub fn transition_to(&mut self, next: WorkflowStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::internal(format!(
                "workflow {:?}: illegal status transition {} -> {}",
                self.workflow_id, self.status, next
            )));
        }
        self.status = next;
        match next {
            WorkflowStatus::Running => {
                self.started_at = Some(Utc::now());
                self.heartbeat_at = Some(Utc::now());
            }
            s if s.is_terminal() => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    /// Refreshes the liveness marker.
    pub fn touch_heartbeat(&mut self) {
        self.heartbeat_at = Some(Utc::now());
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Filter for [`WorkflowStore::list`](crate::WorkflowStore::list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowFilter {
    /// Only states with this status.
    pub status: Option<WorkflowStatus>,
    /// At most this many results; zero means unbounded.
    pub limit: usize,
}

impl WorkflowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether the state passes the status predicate.
    pub fn matches(&self, state: &WorkflowState) -> bool {
        self.status.is_none_or(|s| s == state.status)
    }
}
