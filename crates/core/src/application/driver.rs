// Driver Facade
// The contract the orchestrator's client subsystem calls. Owns the only
// shared mutable structure: the TaskId -> entry registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::application::config::DriverConfig;
use crate::application::state::TaskEntry;
use crate::application::validator::UserPolicyValidator;
use crate::domain::{ExitResult, TaskConfig, TaskHandle, TaskId, TaskStatus};
use crate::error::{DriverError, Result};
use crate::port::supervisor::ProcessSupervisor;
use crate::port::{IdentityProbe, TimeProvider};

/// Default grace period for StopTask, millis
pub const DEFAULT_STOP_GRACE_MS: i64 = 5_000;
/// Default stop signal when the caller does not name one
pub const DEFAULT_STOP_SIGNAL: &str = "SIGINT";

/// Raw process execution driver
///
/// Each supervised task is an independent unit of concurrency; distinct
/// TaskIds never contend beyond the registry lock, which is only held
/// for map operations, never across supervision awaits.
pub struct RawExecDriver {
    config: RwLock<DriverConfig>,
    validator: RwLock<UserPolicyValidator>,
    supervisor: Arc<dyn ProcessSupervisor>,
    identity: Arc<dyn IdentityProbe>,
    time: Arc<dyn TimeProvider>,
    tasks: RwLock<HashMap<TaskId, Arc<TaskEntry>>>,
}

impl RawExecDriver {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        identity: Arc<dyn IdentityProbe>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        let config = DriverConfig::default();
        // An empty denylist always parses
        let validator = UserPolicyValidator::new(&config)
            .unwrap_or_else(|_| unreachable!("default config is valid"));
        Self {
            config: RwLock::new(config),
            validator: RwLock::new(validator),
            supervisor,
            identity,
            time,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Apply (or re-apply) driver configuration
    ///
    /// # Errors
    /// - `DriverError::Config` if the denylist spec is malformed; the
    ///   previous configuration stays in effect
    pub fn set_config(&self, config: DriverConfig) -> Result<()> {
        let validator = UserPolicyValidator::new(&config)?;
        *self.validator.write().unwrap() = validator;
        *self.config.write().unwrap() = config;
        Ok(())
    }

    /// Check a task config against the identity denylist
    ///
    /// Pure, no side effects; safe to call repeatedly and before launch.
    pub fn validate(&self, task: &TaskConfig) -> Result<()> {
        self.validator
            .read()
            .unwrap()
            .validate(task, self.identity.as_ref())
    }

    /// Launch a task and begin supervising it
    ///
    /// Called at most once per handle lifetime for a given TaskId; the
    /// returned handle is what the orchestrator persists for recovery.
    pub async fn start_task(&self, config: TaskConfig) -> Result<TaskHandle> {
        if !self.config.read().unwrap().enabled {
            return Err(DriverError::Config(
                "raw process execution is disabled".to_string(),
            ));
        }

        config.validate()?;
        self.validate(&config)?;

        if self.tasks.read().unwrap().contains_key(&config.id) {
            return Err(DriverError::Config(format!(
                "task with id {} already started",
                config.id
            )));
        }

        let proc = self.supervisor.launch(&config).await?;
        let entry = TaskEntry::new(config, proc.clone(), proc.started_at());

        {
            let mut tasks = self.tasks.write().unwrap();
            if tasks.contains_key(&entry.config().id) {
                // Lost a start race for the same id; reap our launch
                let loser = proc.clone();
                tokio::spawn(async move {
                    let _ = loser.destroy().await;
                });
                return Err(DriverError::Config(format!(
                    "task with id {} already started",
                    entry.config().id
                )));
            }
            tasks.insert(entry.config().id.clone(), entry.clone());
        }

        info!(
            task_id = %entry.config().id,
            task_name = %entry.config().name,
            pid = proc.pid(),
            "Task started"
        );

        tokio::spawn(entry.clone().run_monitor(self.time.clone()));
        Ok(entry.handle())
    }

    /// Block until the task reaches its terminal result
    ///
    /// Cancel-safe: dropping the future never affects the process or any
    /// other waiter. Once terminal, every call returns the cached result.
    pub async fn wait_task(&self, task_id: &str) -> Result<ExitResult> {
        let entry = self.entry(task_id)?;
        Ok(entry.wait_exited().await)
    }

    /// Gracefully stop a task: deliver `signal` (default SIGINT), then
    /// kill forcefully after the grace period (default 5s when `grace_ms`
    /// is None)
    ///
    /// No-op once the task is already terminal, so a second Stop never
    /// errors and never alters the cached result.
    pub async fn stop_task(
        &self,
        task_id: &str,
        grace_ms: Option<i64>,
        signal: Option<&str>,
    ) -> Result<()> {
        let entry = self.entry(task_id)?;
        if entry.is_exited() {
            return Ok(());
        }
        let grace_ms = grace_ms.unwrap_or(DEFAULT_STOP_GRACE_MS);
        info!(
            task_id = %task_id,
            signal = signal.unwrap_or(DEFAULT_STOP_SIGNAL),
            grace_ms,
            "Stopping task"
        );
        entry.process().stop(signal, grace_ms).await?;
        Ok(())
    }

    /// Deliver a named signal to the task's process group
    pub async fn signal_task(&self, task_id: &str, signal: &str) -> Result<()> {
        let entry = self.entry(task_id)?;
        entry.process().signal(signal).await?;
        Ok(())
    }

    /// Read-only snapshot of the task's current state
    pub fn inspect_task(&self, task_id: &str) -> Result<TaskStatus> {
        Ok(self.entry(task_id)?.status())
    }

    /// Tear the task down and forget it
    ///
    /// A still-running task requires `force`; afterwards the TaskId is no
    /// longer known and every operation on it fails with TaskNotFound.
    pub async fn destroy_task(&self, task_id: &str, force: bool) -> Result<()> {
        let entry = self.entry(task_id)?;
        if !entry.is_exited() && !force {
            return Err(DriverError::InvalidState(
                "cannot destroy running task".to_string(),
            ));
        }

        entry.process().destroy().await?;
        self.tasks.write().unwrap().remove(task_id);
        info!(task_id = %task_id, "Task destroyed");
        Ok(())
    }

    /// Resume supervision from a persisted handle after an agent restart
    ///
    /// Reattaches without restarting the process. A handle whose process
    /// no longer exists yields TaskNotFound; the caller decides whether to
    /// start the task fresh.
    pub async fn recover_task(&self, handle: &TaskHandle) -> Result<()> {
        let task_id = handle.config.id.clone();
        if self.tasks.read().unwrap().contains_key(&task_id) {
            warn!(task_id = %task_id, "Recover requested for a task already supervised");
            return Ok(());
        }

        let proc = self
            .supervisor
            .reattach(&handle.reattach)
            .await
            .map_err(|err| {
                warn!(task_id = %task_id, error = %err, "Task recovery failed");
                DriverError::TaskNotFound
            })?;

        let entry = TaskEntry::new(handle.config.clone(), proc, handle.started_at);
        self.tasks
            .write()
            .unwrap()
            .insert(task_id.clone(), entry.clone());

        info!(
            task_id = %task_id,
            pid = handle.reattach.pid,
            "Task recovered from handle"
        );

        tokio::spawn(entry.run_monitor(self.time.clone()));
        Ok(())
    }

    fn entry(&self, task_id: &str) -> Result<Arc<TaskEntry>> {
        self.tasks
            .read()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or(DriverError::TaskNotFound)
    }
}
