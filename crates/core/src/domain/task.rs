// Task Domain Model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::domain::error::DomainError;

/// Task ID (UUID v4, assigned by the placement layer)
pub type TaskId = String;

/// Allocation ID grouping tasks placed together
pub type AllocId = String;

/// Resource limits requested for a task
///
/// `cgroup_path` points at a pre-created cgroup directory for the
/// alloc/task pair; if set, the launcher must place the child in it
/// before confirming the start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_shares: u64,
    pub memory_mb: u64,
    pub cgroup_path: Option<PathBuf>,
}

/// Task Config - everything needed to launch one supervised process
///
/// Immutable once submitted; the driver keeps its own copy inside the
/// task entry and in the returned handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: TaskId,
    pub alloc_id: AllocId,
    pub name: String,

    pub command: String,
    pub args: Vec<String>,
    /// Environment mapping; key unique, order irrelevant
    pub env: HashMap<String, String>,

    /// Execution user; empty means "run as the supervisor's own identity"
    pub user: String,
    pub cwd: Option<PathBuf>,

    /// Task-private directory for stdout/stderr log files
    pub log_dir: PathBuf,

    pub resources: Resources,
}

impl TaskConfig {
    /// Reject a malformed config before any side effect occurs
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_empty() {
            return Err(DomainError::InvalidConfig("task id is empty".to_string()));
        }
        if self.name.is_empty() {
            return Err(DomainError::InvalidConfig("task name is empty".to_string()));
        }
        if self.command.is_empty() {
            return Err(DomainError::InvalidConfig(
                "command is required".to_string(),
            ));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(DomainError::InvalidConfig("log_dir is empty".to_string()));
        }
        Ok(())
    }

    /// Log file name for a stream, `<task-name>.stdout.<index>`
    ///
    /// Rotation is owned by an external collaborator, so the driver only
    /// ever writes index 0.
    pub fn log_file_name(&self, stream: &str, index: u32) -> String {
        format!("{}.{}.{}", self.name, stream, index)
    }
}

/// Task lifecycle state
///
/// Transitions are monotonic: Pending -> Running -> Exited, nothing
/// ever leaves Exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Exited,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Exited => write!(f, "EXITED"),
        }
    }
}

/// Terminal outcome of a supervised task
///
/// Produced exactly once per task lifetime, then cached and immutable;
/// every waiter observes the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitResult {
    /// Process exit code; -1 when the process could not report one
    /// (killed by signal, or status lost)
    pub exit_code: i32,
    /// Numeric signal that terminated the process, 0 if none
    pub signal: i32,
    pub oom_killed: bool,
    pub err: Option<String>,
}

impl ExitResult {
    pub fn new(exit_code: i32, signal: i32) -> Self {
        Self {
            exit_code,
            signal,
            oom_killed: false,
            err: None,
        }
    }

    /// Terminal result for a task whose supervision channel was lost
    /// (the watchdog died out-of-band); surfaced through Wait rather
    /// than thrown, since callers may already be blocked there.
    pub fn executor_lost(reason: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            signal: 0,
            oom_killed: false,
            err: Some(reason.into()),
        }
    }

    pub fn successful(&self) -> bool {
        self.exit_code == 0 && self.signal == 0 && !self.oom_killed && self.err.is_none()
    }
}

/// Read-only snapshot returned by InspectTask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    pub pid: i32,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub exit_result: Option<ExitResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> TaskConfig {
        TaskConfig {
            id: "task-1".to_string(),
            alloc_id: "alloc-1".to_string(),
            name: "sleep".to_string(),
            command: "/bin/sleep".to_string(),
            log_dir: PathBuf::from("/tmp/task-1/logs"),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validate_accepts_minimal() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn test_config_validate_rejects_missing_command() {
        let mut config = minimal_config();
        config.command = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("command is required"));
    }

    #[test]
    fn test_config_validate_rejects_empty_id() {
        let mut config = minimal_config();
        config.id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_file_name_convention() {
        let config = minimal_config();
        assert_eq!(config.log_file_name("stdout", 0), "sleep.stdout.0");
        assert_eq!(config.log_file_name("stderr", 0), "sleep.stderr.0");
    }

    #[test]
    fn test_successful_requires_all_clear() {
        assert!(ExitResult::new(0, 0).successful());
        assert!(!ExitResult::new(3, 0).successful());
        assert!(!ExitResult::new(-1, 9).successful());

        let mut oom = ExitResult::new(0, 0);
        oom.oom_killed = true;
        assert!(!oom.successful());

        assert!(!ExitResult::executor_lost("control channel lost").successful());
    }

    #[test]
    fn test_executor_lost_shape() {
        let res = ExitResult::executor_lost("watchdog died");
        assert_eq!(res.exit_code, -1);
        assert_eq!(res.signal, 0);
        assert!(!res.oom_killed);
        assert!(res.err.is_some());
    }
}
