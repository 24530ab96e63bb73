// Process Supervisor Port
// Abstraction over launching and owning one external OS process.
// The Unix adapter lives in infra-system; core only sees these traits.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{ExitResult, ReattachConfig, TaskConfig};

/// Supervisor-level errors
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("Signal delivery failed: {0}")]
    Signal(String),

    #[error("Unsupported signal: {0}")]
    UnsupportedSignal(String),

    #[error("Reattach failed: {0}")]
    Reattach(String),
}

impl From<SupervisorError> for crate::error::DriverError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Launch(msg) => Self::Launch(msg),
            SupervisorError::UnknownUser(name) => Self::UnknownUser(name),
            SupervisorError::Signal(msg) => Self::Process(msg),
            SupervisorError::UnsupportedSignal(name) => {
                Self::Process(format!("unsupported signal: {}", name))
            }
            SupervisorError::Reattach(_) => Self::TaskNotFound,
        }
    }
}

/// A single supervised child process
///
/// One instance owns exactly one OS process for its whole lifetime and
/// translates OS events into the task lifecycle.
#[async_trait]
pub trait SupervisedProcess: Send + Sync {
    fn pid(&self) -> i32;

    /// Launch timestamp, epoch millis
    fn started_at(&self) -> i64;

    /// Descriptor sufficient to resume supervision after an agent restart
    fn reattach_config(&self) -> ReattachConfig;

    /// Await the terminal result
    ///
    /// Cancel-safe: dropping the future never affects the process or
    /// other waiters. Returns immediately with the cached result once the
    /// process has terminated; every caller observes the same value.
    async fn wait(&self) -> ExitResult;

    /// Deliver a named signal ("SIGINT", "SIGUSR1", ...) to the process group
    async fn signal(&self, name: &str) -> Result<(), SupervisorError>;

    /// Graceful stop: deliver `signal` (default SIGINT), escalate to a
    /// forceful kill after `grace_ms`. Idempotent once the process is gone.
    async fn stop(&self, signal: Option<&str>, grace_ms: i64) -> Result<(), SupervisorError>;

    /// Kill outright and release all owned resources. Idempotent.
    async fn destroy(&self) -> Result<(), SupervisorError>;
}

impl std::fmt::Debug for dyn SupervisedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("pid", &self.pid())
            .finish()
    }
}

/// Factory side of the port: launch new processes, reattach to old ones
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Spawn exactly one child process for `config`
    ///
    /// # Errors
    /// - `SupervisorError::UnknownUser` if the requested user cannot be resolved
    /// - `SupervisorError::Launch` on any other failure; no process is left
    ///   behind when this returns an error
    async fn launch(
        &self,
        config: &TaskConfig,
    ) -> Result<Arc<dyn SupervisedProcess>, SupervisorError>;

    /// Resume supervision of a previously launched process
    ///
    /// # Errors
    /// - `SupervisorError::Reattach` if the descriptor no longer matches a
    ///   live process (dead pid, or pid reused by another process)
    async fn reattach(
        &self,
        reattach: &ReattachConfig,
    ) -> Result<Arc<dyn SupervisedProcess>, SupervisorError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Scripted in-memory process for driver facade tests
    pub struct MockProcess {
        pid: i32,
        started_at: i64,
        start_time: u64,
        exit_tx: Mutex<Option<watch::Sender<Option<ExitResult>>>>,
        exit_rx: watch::Receiver<Option<ExitResult>>,
        signals: Mutex<Vec<String>>,
        stops: Mutex<Vec<(Option<String>, i64)>>,
    }

    impl MockProcess {
        pub fn running(pid: i32, started_at: i64) -> Arc<Self> {
            let (tx, rx) = watch::channel(None);
            Arc::new(Self {
                pid,
                started_at,
                start_time: pid as u64 * 10,
                exit_tx: Mutex::new(Some(tx)),
                exit_rx: rx,
                signals: Mutex::new(Vec::new()),
                stops: Mutex::new(Vec::new()),
            })
        }

        /// Publish the terminal result, waking every waiter
        pub fn finish(&self, result: ExitResult) {
            if let Some(tx) = self.exit_tx.lock().unwrap().as_ref() {
                let _ = tx.send(Some(result));
            }
        }

        /// Drop the supervision channel without a result, simulating the
        /// watchdog dying out-of-band
        pub fn lose_executor(&self) {
            self.exit_tx.lock().unwrap().take();
        }

        pub fn delivered_signals(&self) -> Vec<String> {
            self.signals.lock().unwrap().clone()
        }

        pub fn stop_calls(&self) -> usize {
            self.stops.lock().unwrap().len()
        }

        /// Grace periods observed across stop calls, in order
        pub fn stop_graces(&self) -> Vec<i64> {
            self.stops.lock().unwrap().iter().map(|(_, g)| *g).collect()
        }

        fn finished(&self) -> bool {
            self.exit_rx.borrow().is_some()
        }
    }

    #[async_trait]
    impl SupervisedProcess for MockProcess {
        fn pid(&self) -> i32 {
            self.pid
        }

        fn started_at(&self) -> i64 {
            self.started_at
        }

        fn reattach_config(&self) -> ReattachConfig {
            ReattachConfig {
                pid: self.pid,
                process_start_time: self.start_time,
            }
        }

        async fn wait(&self) -> ExitResult {
            let mut rx = self.exit_rx.clone();
            loop {
                if let Some(result) = rx.borrow_and_update().clone() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    return ExitResult::executor_lost("supervision channel closed");
                }
            }
        }

        async fn signal(&self, name: &str) -> Result<(), SupervisorError> {
            if self.finished() {
                return Err(SupervisorError::Signal("process already gone".to_string()));
            }
            self.signals.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn stop(&self, signal: Option<&str>, grace_ms: i64) -> Result<(), SupervisorError> {
            self.stops
                .lock()
                .unwrap()
                .push((signal.map(|s| s.to_string()), grace_ms));
            if !self.finished() {
                // SIGINT-equivalent teardown
                self.finish(ExitResult::new(-1, 2));
            }
            Ok(())
        }

        async fn destroy(&self) -> Result<(), SupervisorError> {
            if !self.finished() {
                self.finish(ExitResult::new(-1, 9));
            }
            Ok(())
        }
    }

    /// Mock supervisor: hands out MockProcess instances and remembers them
    /// by pid so reattach works like the real adapter's in-process table
    pub struct MockSupervisor {
        next_pid: AtomicI32,
        procs: Mutex<HashMap<i32, Arc<MockProcess>>>,
        fail_launch: Mutex<Option<String>>,
    }

    impl MockSupervisor {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                next_pid: AtomicI32::new(1000),
                procs: Mutex::new(HashMap::new()),
                fail_launch: Mutex::new(None),
            })
        }

        pub fn fail_next_launch(&self, reason: impl Into<String>) {
            *self.fail_launch.lock().unwrap() = Some(reason.into());
        }

        /// Last process handed out, for scripting its exit from tests
        pub fn process(&self, pid: i32) -> Option<Arc<MockProcess>> {
            self.procs.lock().unwrap().get(&pid).cloned()
        }

        pub fn launched_count(&self) -> usize {
            self.procs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProcessSupervisor for MockSupervisor {
        async fn launch(
            &self,
            _config: &TaskConfig,
        ) -> Result<Arc<dyn SupervisedProcess>, SupervisorError> {
            if let Some(reason) = self.fail_launch.lock().unwrap().take() {
                return Err(SupervisorError::Launch(reason));
            }
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            let proc = MockProcess::running(pid, 0);
            self.procs.lock().unwrap().insert(pid, proc.clone());
            Ok(proc)
        }

        async fn reattach(
            &self,
            reattach: &ReattachConfig,
        ) -> Result<Arc<dyn SupervisedProcess>, SupervisorError> {
            match self.procs.lock().unwrap().get(&reattach.pid) {
                Some(proc) if proc.reattach_config().process_start_time
                    == reattach.process_start_time =>
                {
                    Ok(proc.clone())
                }
                _ => Err(SupervisorError::Reattach(format!(
                    "no live process with pid {}",
                    reattach.pid
                ))),
            }
        }
    }
}
