//! The durable workflow executor
//!
//! [`WorkflowExecutor`] runs user-supplied workflow functions against a
//! [`WorkflowStore`], recording every step in the state's history log so a
//! run can be inspected, resumed after process death, or swept up as crashed.
//!
//! # Execution model
//!
//! `execute` persists a pending state, transitions it to running, and hands
//! the workflow function a [`WorkflowContext`]. Each
//! [`WorkflowContext::activity`] call appends `activity_started`, runs the
//! activity, and appends `activity_completed` or `activity_failed`; the
//! state is saved after every append, so acknowledged progress survives a
//! crash. On return the executor appends exactly one terminal event and
//! saves the final state.
//!
//! # Resumability
//!
//! Re-running `execute` with the workflow ID of a non-terminal state loads
//! the persisted history and replays it: activities whose results were
//! captured return those results without executing again, and live execution
//! resumes from the first unpersisted step. Activities must therefore be
//! idempotent or have their results fully captured in the history event.
//!
//! # Zombies
//!
//! A `running` state whose host died keeps its status forever. On
//! [`WorkflowExecutor::start`], states whose heartbeat is older than the
//! configured staleness threshold are transitioned to `failed` with a
//! synthetic "workflow host lost" error.
//!
//! # Examples
//!
//! ```rust,no_run
//! use durable_agent::{InMemoryWorkflowStore, RequestScope, WorkflowExecutor};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # async fn example() -> durable_agent::Result<()> {
//! let executor = WorkflowExecutor::new(Arc::new(InMemoryWorkflowStore::new()));
//! let scope = RequestScope::new();
//! executor.start(&scope).await?;
//!
//! let output = executor
//!     .execute(&scope, "wf-1", json!("input"), |ctx, input| async move {
//!         let step = ctx
//!             .activity("normalize", input, |raw| async move {
//!                 Ok(Value::String(raw.as_str().unwrap_or("").to_uppercase()))
//!             })
//!             .await?;
//!         Ok(step)
//!     })
//!     .await?;
//! assert_eq!(output, json!("INPUT"));
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::scope::RequestScope;
use crate::store::WorkflowStore;
use crate::workflow::{
    HistoryEvent, HistoryEventType, WorkflowError, WorkflowFilter, WorkflowState, WorkflowStatus,
};
use crate::{Error, Result};

/// Tuning knobs for the executor runtime.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// A `running` state whose heartbeat is older than this is treated as
    /// crashed by [`WorkflowExecutor::start`].
    pub staleness_threshold: Duration,

    /// How often an in-flight run refreshes its heartbeat.
    pub heartbeat_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Replayed steps reconstructed from persisted history.
#[derive(Debug, Clone)]
enum ReplayEntry {
    Activity { name: String, result: Value },
    Timer,
    Signal { name: String },
}

/// Shared run state between the executor, the workflow context, and the
/// heartbeat task.
struct RunInner {
    state: Mutex<WorkflowState>,
    replay: Mutex<VecDeque<ReplayEntry>>,
    store: Arc<dyn WorkflowStore>,
    scope: RequestScope,
}

impl RunInner {
    /// Appends an event and immediately persists the state.
    async fn append_and_save(&self, event: HistoryEvent) -> Result<()> {
        let mut state = self.state.lock().await;
        state.append_event(event);
        state.touch_heartbeat();
        self.store.save(&self.scope, &state).await
    }
}

/// Handle the workflow function uses to run recorded steps.
///
/// Cloneable; all clones share the same run.
#[derive(Clone)]
pub struct WorkflowContext {
    inner: Arc<RunInner>,
}

impl WorkflowContext {
    /// Returns the run's cancellation/tenant scope.
    pub fn scope(&self) -> &RequestScope {
        &self.inner.scope
    }

    /// Runs one activity, recording start and outcome in the history.
    ///
    /// When the loaded history already carries this step's captured result,
    /// the result is returned without executing the activity again.
    /// Activity errors are recorded as `activity_failed` and surfaced to the
    /// workflow function, which decides whether to re-raise them.
    pub async fn activity<F, Fut>(&self, name: &str, input: Value, f: F) -> Result<Value>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        self.inner.scope.check()?;

        {
            let mut replay = self.inner.replay.lock().await;
            if let Some(entry) = replay.front() {
                match entry {
                    ReplayEntry::Activity { name: recorded, .. } if recorded == name => {
                        let Some(ReplayEntry::Activity { result, .. }) = replay.pop_front()
                        else {
                            unreachable!("front was an activity entry");
                        };
                        return Ok(result);
                    }
                    _ => {
                        return Err(Error::internal(format!(
                            "non-deterministic replay: expected {entry:?}, got activity {name:?}"
                        )));
                    }
                }
            }
        }

        self.inner
            .append_and_save(
                HistoryEvent::new(HistoryEventType::ActivityStarted)
                    .with_activity_name(name)
                    .with_input(input.clone()),
            )
            .await?;

        match f(input).await {
            Ok(result) => {
                self.inner
                    .append_and_save(
                        HistoryEvent::new(HistoryEventType::ActivityCompleted)
                            .with_activity_name(name)
                            .with_result(result.clone()),
                    )
                    .await?;
                Ok(result)
            }
            Err(err) => {
                self.inner
                    .append_and_save(
                        HistoryEvent::new(HistoryEventType::ActivityFailed)
                            .with_activity_name(name)
                            .with_error(WorkflowError::from(&err)),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    /// Sleeps for `duration`, recording `timer_started` and `timer_fired`.
    /// A timer that already fired in a previous run is skipped on replay.
    pub async fn timer(&self, duration: Duration) -> Result<()> {
        self.inner.scope.check()?;

        {
            let mut replay = self.inner.replay.lock().await;
            if let Some(entry) = replay.front() {
                match entry {
                    ReplayEntry::Timer => {
                        replay.pop_front();
                        return Ok(());
                    }
                    _ => {
                        return Err(Error::internal(format!(
                            "non-deterministic replay: expected {entry:?}, got timer"
                        )));
                    }
                }
            }
        }

        self.inner
            .append_and_save(HistoryEvent::new(HistoryEventType::TimerStarted))
            .await?;

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.inner.scope.cancelled() => return self.inner.scope.check(),
        }

        self.inner
            .append_and_save(HistoryEvent::new(HistoryEventType::TimerFired))
            .await
    }

    /// Records receipt of a named signal with its payload.
    pub async fn signal(&self, name: &str, payload: Value) -> Result<()> {
        self.inner.scope.check()?;

        {
            let mut replay = self.inner.replay.lock().await;
            if let Some(entry) = replay.front() {
                match entry {
                    ReplayEntry::Signal { name: recorded } if recorded == name => {
                        replay.pop_front();
                        return Ok(());
                    }
                    _ => {
                        return Err(Error::internal(format!(
                            "non-deterministic replay: expected {entry:?}, got signal {name:?}"
                        )));
                    }
                }
            }
        }

        self.inner
            .append_and_save(
                HistoryEvent::new(HistoryEventType::SignalReceived)
                    .with_activity_name(name)
                    .with_input(payload),
            )
            .await
    }
}

/// Runs workflows durably against a pluggable store.
pub struct WorkflowExecutor {
    store: Arc<dyn WorkflowStore>,
    config: ExecutorConfig,
    /// Scopes of in-flight runs, keyed by workflow ID; used by `cancel`
    /// and drained by `stop`.
    in_flight: Arc<Mutex<HashMap<String, RequestScope>>>,
}

impl WorkflowExecutor {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self::with_config(store, ExecutorConfig::default())
    }

    pub fn with_config(store: Arc<dyn WorkflowStore>, config: ExecutorConfig) -> Self {
        Self {
            store,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts the runtime: sweeps zombie workflows left behind by dead hosts.
    ///
    /// Any `running` state with a heartbeat older than the staleness
    /// threshold is transitioned to `failed` with a synthetic error.
    pub async fn start(&self, scope: &RequestScope) -> Result<()> {
        let filter = WorkflowFilter::new().with_status(WorkflowStatus::Running);
        let running = self.store.list(scope, &filter).await?;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.staleness_threshold)
                .unwrap_or(chrono::Duration::zero());

        for mut state in running {
            let last_beat = state.heartbeat_at.or(state.started_at);
            let stale = last_beat.map(|t| t < cutoff).unwrap_or(true);
            if !stale {
                continue;
            }
            log::warn!(
                "workflow {:?} (run {:?}): host lost, marking failed",
                state.workflow_id,
                state.run_id
            );
            let error = WorkflowError::new("internal", "workflow host lost");
            state.append_event(
                HistoryEvent::new(HistoryEventType::WorkflowFailed).with_error(error.clone()),
            );
            state.error = Some(error);
            state.transition_to(WorkflowStatus::Failed)?;
            self.store.save(scope, &state).await?;
        }
        Ok(())
    }

    /// Stops the runtime, draining in-flight workflows.
    ///
    /// Waits up to `grace` for running workflows to finish. Survivors are
    /// saved as `running` with a fresh heartbeat so the next startup does
    /// not sweep them prematurely.
    pub async fn stop(&self, scope: &RequestScope, grace: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.in_flight.lock().await.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let survivors: Vec<String> = self.in_flight.lock().await.keys().cloned().collect();
        for workflow_id in survivors {
            if let Some(mut state) = self.store.load(scope, &workflow_id).await? {
                if state.status == WorkflowStatus::Running {
                    state.touch_heartbeat();
                    self.store.save(scope, &state).await?;
                }
            }
            log::warn!("workflow {workflow_id:?} still in flight at shutdown");
        }
        Ok(())
    }

    /// Requests cancellation of an in-flight run. A no-op for unknown or
    /// already-terminal workflows.
    pub async fn cancel(&self, workflow_id: &str) {
        if let Some(run_scope) = self.in_flight.lock().await.get(workflow_id) {
            run_scope.cancel();
        }
    }

    /// Runs a workflow function durably under the given workflow ID.
    ///
    /// A non-terminal persisted state with the same ID is resumed: its
    /// history replays into the context, a fresh run ID is allocated, and
    /// execution continues from the first unpersisted step. A terminal
    /// state (or none) starts a fresh run with a fresh history.
    pub async fn execute<F, Fut>(
        &self,
        scope: &RequestScope,
        workflow_id: &str,
        input: Value,
        f: F,
    ) -> Result<Value>
    where
        F: FnOnce(WorkflowContext, Value) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if workflow_id.trim().is_empty() {
            return Err(Error::invalid_input("workflow_id cannot be empty"));
        }

        let run_scope = scope.child();
        let run_id = Uuid::new_v4().to_string();

        // Load or create the state, keeping prior history when resuming.
        let previous = self.store.load(scope, workflow_id).await?;
        let resuming = previous
            .as_ref()
            .map(|s| !s.status.is_terminal())
            .unwrap_or(false);

        let mut state = match previous {
            Some(prev) if resuming => {
                let mut state = prev;
                state.run_id = run_id;
                state
            }
            _ => WorkflowState::new(workflow_id, run_id, input.clone()),
        };

        if state.status == WorkflowStatus::Pending {
            self.store.save(scope, &state).await?;
            state.transition_to(WorkflowStatus::Running)?;
            state.append_event(HistoryEvent::new(HistoryEventType::WorkflowStarted));
            self.store.save(scope, &state).await?;
        }

        let replay = build_replay_queue(&state.history);
        let workflow_input = state.input.clone().unwrap_or(input);

        let inner = Arc::new(RunInner {
            state: Mutex::new(state),
            replay: Mutex::new(replay),
            store: Arc::clone(&self.store),
            scope: run_scope.clone(),
        });
        let ctx = WorkflowContext {
            inner: Arc::clone(&inner),
        };

        self.in_flight
            .lock()
            .await
            .insert(workflow_id.to_string(), run_scope.clone());

        let heartbeat = self.spawn_heartbeat(Arc::clone(&inner));
        let outcome = f(ctx, workflow_input).await;
        heartbeat.abort();

        self.in_flight.lock().await.remove(workflow_id);

        self.finish(&inner, outcome).await
    }

    /// Periodically refreshes the run's heartbeat while the workflow
    /// function executes.
    fn spawn_heartbeat(&self, inner: Arc<RunInner>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let mut state = inner.state.lock().await;
                state.touch_heartbeat();
                if let Err(e) = inner.store.save(&inner.scope, &state).await {
                    log::warn!(
                        "workflow {:?}: heartbeat save failed: {e}",
                        state.workflow_id
                    );
                }
            }
        })
    }

    /// Appends the single terminal event, sets the final status, and saves.
    async fn finish(&self, inner: &RunInner, outcome: Result<Value>) -> Result<Value> {
        let mut state = inner.state.lock().await;

        let canceled = inner.scope.is_canceled() || matches!(outcome, Err(Error::Canceled));

        if canceled {
            state.append_event(HistoryEvent::new(HistoryEventType::WorkflowCanceled));
            state.transition_to(WorkflowStatus::Canceled)?;
            // Saving the canceled state uses the parent-independent path:
            // the run scope itself is already tripped.
            let save_scope = RequestScope::new();
            self.store.save(&save_scope, &state).await?;
            return outcome.and(Err(Error::Canceled));
        }

        match outcome {
            Ok(output) => {
                state.append_event(
                    HistoryEvent::new(HistoryEventType::WorkflowCompleted)
                        .with_result(output.clone()),
                );
                state.output = Some(output.clone());
                state.transition_to(WorkflowStatus::Completed)?;
                self.store.save(&inner.scope, &state).await?;
                Ok(output)
            }
            Err(err) => {
                let wf_err = WorkflowError::from(&err);
                state.append_event(
                    HistoryEvent::new(HistoryEventType::WorkflowFailed)
                        .with_error(wf_err.clone()),
                );
                state.error = Some(wf_err);
                state.transition_to(WorkflowStatus::Failed)?;
                self.store.save(&inner.scope, &state).await?;
                Err(err)
            }
        }
    }
}

/// Reconstructs the replayable prefix of a persisted history: completed
/// activities, fired timers, and received signals up to the first step whose
/// outcome was never captured.
fn build_replay_queue(history: &[HistoryEvent]) -> VecDeque<ReplayEntry> {
    let mut replay = VecDeque::new();
    let mut i = 0;
    while i < history.len() {
        let event = &history[i];
        match event.event_type {
            HistoryEventType::ActivityStarted => {
                let Some(next) = history.get(i + 1) else { break };
                if next.event_type == HistoryEventType::ActivityCompleted {
                    replay.push_back(ReplayEntry::Activity {
                        name: event.activity_name.clone().unwrap_or_default(),
                        result: next.result.clone().unwrap_or(Value::Null),
                    });
                    i += 2;
                } else {
                    // Failed or interrupted: resume live execution here.
                    break;
                }
            }
            HistoryEventType::TimerStarted => {
                let Some(next) = history.get(i + 1) else { break };
                if next.event_type == HistoryEventType::TimerFired {
                    replay.push_back(ReplayEntry::Timer);
                    i += 2;
                } else {
                    break;
                }
            }
            HistoryEventType::SignalReceived => {
                replay.push_back(ReplayEntry::Signal {
                    name: event.activity_name.clone().unwrap_or_default(),
                });
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    replay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryWorkflowStore;
    use serde_json::json;

    fn executor() -> (WorkflowExecutor, Arc<InMemoryWorkflowStore>) {
        let store = Arc::new(InMemoryWorkflowStore::new());
        (
            WorkflowExecutor::new(Arc::clone(&store) as Arc<dyn WorkflowStore>),
            store,
        )
    }

    #[tokio::test]
    async fn test_successful_run_history_shape() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        let output = executor
            .execute(&scope, "wf-1", json!("in"), |ctx, input| async move {
                ctx.activity("step", input, |_| async move { Ok(json!("ok")) })
                    .await
            })
            .await
            .unwrap();
        assert_eq!(output, json!("ok"));

        let state = store.load(&scope, "wf-1").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.output, Some(json!("ok")));

        let types: Vec<HistoryEventType> =
            state.history.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                HistoryEventType::WorkflowStarted,
                HistoryEventType::ActivityStarted,
                HistoryEventType::ActivityCompleted,
                HistoryEventType::WorkflowCompleted,
            ]
        );
        let ids: Vec<u64> = state.history.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(state.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_run_records_error() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        let err = executor
            .execute(&scope, "wf-2", json!(null), |ctx, input| async move {
                ctx.activity("explode", input, |_| async move {
                    Err::<Value, _>(Error::provider("boom"))
                })
                .await
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));

        let state = store.load(&scope, "wf-2").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Failed);
        assert!(state.error.as_ref().unwrap().message.contains("boom"));
        assert_eq!(
            state.history.last().unwrap().event_type,
            HistoryEventType::WorkflowFailed
        );
    }

    #[tokio::test]
    async fn test_activity_error_not_fatal_unless_reraised() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        let output = executor
            .execute(&scope, "wf-3", json!(null), |ctx, input| async move {
                let fallible = ctx
                    .activity("try", input.clone(), |_| async move {
                        Err::<Value, _>(Error::provider("flaky"))
                    })
                    .await;
                assert!(fallible.is_err());

                // Swallow the activity error and take a fallback path.
                ctx.activity("fallback", input, |_| async move { Ok(json!("recovered")) })
                    .await
            })
            .await
            .unwrap();
        assert_eq!(output, json!("recovered"));

        let state = store.load(&scope, "wf-3").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        let types: Vec<HistoryEventType> =
            state.history.iter().map(|e| e.event_type).collect();
        assert!(types.contains(&HistoryEventType::ActivityFailed));
        assert_eq!(
            types.last(),
            Some(&HistoryEventType::WorkflowCompleted)
        );
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        executor
            .execute(&scope, "wf-4", json!(null), |_, _| async move {
                Ok(json!("done"))
            })
            .await
            .unwrap();

        let state = store.load(&scope, "wf-4").await.unwrap().unwrap();
        let terminal: Vec<&HistoryEvent> = state
            .history
            .iter()
            .filter(|e| e.event_type.is_terminal())
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].id, state.history.last().unwrap().id);
    }

    #[tokio::test]
    async fn test_resume_replays_completed_activities() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let scope = RequestScope::new();

        // Simulate a crash: a running state whose first activity completed
        // but whose run never finished.
        let mut crashed = WorkflowState::new("wf-5", "run-dead", json!(7));
        crashed.transition_to(WorkflowStatus::Running).unwrap();
        crashed.append_event(HistoryEvent::new(HistoryEventType::WorkflowStarted));
        crashed.append_event(
            HistoryEvent::new(HistoryEventType::ActivityStarted)
                .with_activity_name("double")
                .with_input(json!(7)),
        );
        crashed.append_event(
            HistoryEvent::new(HistoryEventType::ActivityCompleted)
                .with_activity_name("double")
                .with_result(json!(14)),
        );
        store.save(&scope, &crashed).await.unwrap();

        let executor = WorkflowExecutor::new(Arc::clone(&store) as Arc<dyn WorkflowStore>);
        let first_ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let first_ran_clone = Arc::clone(&first_ran);

        let output = executor
            .execute(&scope, "wf-5", json!(7), move |ctx, input| {
                let first_ran = first_ran_clone;
                async move {
                    let doubled = ctx
                        .activity("double", input, |v| {
                            let first_ran = Arc::clone(&first_ran);
                            async move {
                                first_ran.store(true, std::sync::atomic::Ordering::SeqCst);
                                Ok(json!(v.as_i64().unwrap() * 2))
                            }
                        })
                        .await?;
                    ctx.activity("add_one", doubled, |v| async move {
                        Ok(json!(v.as_i64().unwrap() + 1))
                    })
                    .await
                }
            })
            .await
            .unwrap();

        // The first activity's recorded result was replayed, not recomputed.
        assert!(!first_ran.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(output, json!(15));

        let state = store.load(&scope, "wf-5").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        // New run ID, same workflow ID.
        assert_ne!(state.run_id, "run-dead");

        // History stayed contiguous across the resume.
        let ids: Vec<u64> = state.history.iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=ids.len() as u64).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_canceled_run() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        let cancel_scope = scope.clone();
        let err = executor
            .execute(&scope, "wf-6", json!(null), move |ctx, input| {
                let cancel_scope = cancel_scope.clone();
                async move {
                    ctx.activity("first", input, |_| async move { Ok(json!(1)) })
                        .await?;
                    cancel_scope.cancel();
                    ctx.activity("second", json!(null), |_| async move { Ok(json!(2)) })
                        .await
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));

        let state = store.load(&RequestScope::new(), "wf-6").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Canceled);
        assert_eq!(
            state.history.last().unwrap().event_type,
            HistoryEventType::WorkflowCanceled
        );
    }

    #[tokio::test]
    async fn test_zombie_sweep_on_start() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let scope = RequestScope::new();

        let mut zombie = WorkflowState::new("wf-zombie", "run-dead", json!(null));
        zombie.transition_to(WorkflowStatus::Running).unwrap();
        zombie.append_event(HistoryEvent::new(HistoryEventType::WorkflowStarted));
        zombie.heartbeat_at = Some(Utc::now() - chrono::Duration::seconds(3600));
        store.save(&scope, &zombie).await.unwrap();

        let executor = WorkflowExecutor::with_config(
            Arc::clone(&store) as Arc<dyn WorkflowStore>,
            ExecutorConfig {
                staleness_threshold: Duration::from_secs(60),
                ..Default::default()
            },
        );
        executor.start(&scope).await.unwrap();

        let state = store.load(&scope, "wf-zombie").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Failed);
        assert_eq!(
            state.error.as_ref().unwrap().message,
            "workflow host lost"
        );
        assert_eq!(
            state.history.last().unwrap().event_type,
            HistoryEventType::WorkflowFailed
        );
    }

    #[tokio::test]
    async fn test_fresh_heartbeat_not_swept() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let scope = RequestScope::new();

        let mut live = WorkflowState::new("wf-live", "run-1", json!(null));
        live.transition_to(WorkflowStatus::Running).unwrap();
        store.save(&scope, &live).await.unwrap();

        let executor = WorkflowExecutor::new(Arc::clone(&store) as Arc<dyn WorkflowStore>);
        executor.start(&scope).await.unwrap();

        let state = store.load(&scope, "wf-live").await.unwrap().unwrap();
        assert_eq!(state.status, WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn test_empty_workflow_id_rejected() {
        let (executor, _) = executor();
        let err = executor
            .execute(&RequestScope::new(), "", json!(null), |_, _| async move {
                Ok(json!(null))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rerun_after_terminal_starts_fresh() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        executor
            .execute(&scope, "wf-7", json!(1), |_, _| async move { Ok(json!("a")) })
            .await
            .unwrap();
        let first = store.load(&scope, "wf-7").await.unwrap().unwrap();

        executor
            .execute(&scope, "wf-7", json!(2), |_, _| async move { Ok(json!("b")) })
            .await
            .unwrap();
        let second = store.load(&scope, "wf-7").await.unwrap().unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.output, Some(json!("b")));
        // A fresh run starts its own history at 1.
        assert_eq!(second.history.first().unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_timer_records_events() {
        let (executor, store) = executor();
        let scope = RequestScope::new();

        executor
            .execute(&scope, "wf-8", json!(null), |ctx, _| async move {
                ctx.timer(Duration::from_millis(5)).await?;
                Ok(json!("slept"))
            })
            .await
            .unwrap();

        let state = store.load(&scope, "wf-8").await.unwrap().unwrap();
        let types: Vec<HistoryEventType> =
            state.history.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                HistoryEventType::WorkflowStarted,
                HistoryEventType::TimerStarted,
                HistoryEventType::TimerFired,
                HistoryEventType::WorkflowCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_with_no_inflight_returns_immediately() {
        let (executor, _) = executor();
        executor
            .stop(&RequestScope::new(), Duration::from_secs(5))
            .await
            .unwrap();
    }
}
