// Per-Task State Machine
// One entry per supervised task. The monitor performs the single
// Running -> Exited transition; Inspect and Wait both read from it, so
// there is exactly one source of truth for the terminal outcome.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

use crate::domain::{ExitResult, TaskConfig, TaskHandle, TaskState, TaskStatus};
use crate::port::supervisor::SupervisedProcess;
use crate::port::TimeProvider;

struct StateInner {
    state: TaskState,
    completed_at: Option<i64>,
    result: Option<ExitResult>,
}

/// Live state machine for one task
pub struct TaskEntry {
    config: TaskConfig,
    proc: Arc<dyn SupervisedProcess>,
    started_at: i64,
    inner: Mutex<StateInner>,
    /// Completion fan-out; set exactly once by `mark_exited`
    exit_tx: watch::Sender<Option<ExitResult>>,
    exit_rx: watch::Receiver<Option<ExitResult>>,
}

impl TaskEntry {
    pub fn new(
        config: TaskConfig,
        proc: Arc<dyn SupervisedProcess>,
        started_at: i64,
    ) -> Arc<Self> {
        let (exit_tx, exit_rx) = watch::channel(None);
        Arc::new(Self {
            config,
            proc,
            started_at,
            inner: Mutex::new(StateInner {
                state: TaskState::Running,
                completed_at: None,
                result: None,
            }),
            exit_tx,
            exit_rx,
        })
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn process(&self) -> &Arc<dyn SupervisedProcess> {
        &self.proc
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().unwrap().state
    }

    pub fn is_exited(&self) -> bool {
        self.state() == TaskState::Exited
    }

    pub fn cached_result(&self) -> Option<ExitResult> {
        self.inner.lock().unwrap().result.clone()
    }

    /// Read-only snapshot for InspectTask
    pub fn status(&self) -> TaskStatus {
        let inner = self.inner.lock().unwrap();
        TaskStatus {
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            state: inner.state,
            pid: self.proc.pid(),
            started_at: self.started_at,
            completed_at: inner.completed_at,
            exit_result: inner.result.clone(),
        }
    }

    /// Reattachment handle for persistence
    pub fn handle(&self) -> TaskHandle {
        TaskHandle::new(
            self.config.clone(),
            self.proc.reattach_config(),
            self.started_at,
        )
    }

    /// Record the terminal result. Monotonic: the first writer wins and
    /// later calls are ignored, so the cached result never changes.
    pub fn mark_exited(&self, result: ExitResult, completed_at: i64) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == TaskState::Exited {
                debug!(task_id = %self.config.id, "Ignoring duplicate exit for terminal task");
                return;
            }
            inner.state = TaskState::Exited;
            inner.completed_at = Some(completed_at);
            inner.result = Some(result.clone());
        }
        let _ = self.exit_tx.send(Some(result));
    }

    /// Await the terminal result
    ///
    /// Immediate once the task is terminal; cancel-safe per caller, and
    /// every caller sees the identical cached result.
    pub async fn wait_exited(&self) -> ExitResult {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // Entry dropped before a result was published
                return ExitResult::executor_lost("task state channel closed");
            }
        }
    }

    /// Drive the state machine from supervisor events until terminal
    ///
    /// Spawned once per entry by the driver facade; this is the only
    /// writer of the Running -> Exited transition.
    pub async fn run_monitor(self: Arc<Self>, time: Arc<dyn TimeProvider>) {
        let result = self.proc.wait().await;
        debug!(
            task_id = %self.config.id,
            exit_code = result.exit_code,
            signal = result.signal,
            "Supervised process reached terminal state"
        );
        self.mark_exited(result, time.now_millis());
    }
}
