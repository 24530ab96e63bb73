// Reattachment Handle
// Persisted by the orchestrator and replayed into RecoverTask after an
// agent restart; must round-trip through serde without loss.

use serde::{Deserialize, Serialize};

use crate::domain::task::{TaskConfig, TaskState};

/// Schema version for persisted handles
pub const HANDLE_VERSION: i32 = 1;

/// Connection metadata for resuming supervision of a live process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReattachConfig {
    pub pid: i32,
    /// OS-reported process start time (seconds since boot/epoch depending
    /// on platform); guards against pid reuse across the restart window
    pub process_start_time: u64,
}

/// Opaque task handle handed back from StartTask
///
/// Sufficient to reconstruct supervision after the agent restarts; the
/// external store that persists it is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub version: i32,
    pub config: TaskConfig,
    pub state: TaskState,
    pub reattach: ReattachConfig,
    /// Launch timestamp, epoch millis
    pub started_at: i64,
}

impl TaskHandle {
    pub fn new(config: TaskConfig, reattach: ReattachConfig, started_at: i64) -> Self {
        Self {
            version: HANDLE_VERSION,
            config,
            state: TaskState::Running,
            reattach,
            started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_handle_serde_round_trip() {
        let config = TaskConfig {
            id: "task-9".to_string(),
            alloc_id: "alloc-9".to_string(),
            name: "worker".to_string(),
            command: "/bin/sleep".to_string(),
            args: vec!["30".to_string()],
            log_dir: PathBuf::from("/tmp/alloc-9/worker/logs"),
            ..Default::default()
        };
        let handle = TaskHandle::new(
            config,
            ReattachConfig {
                pid: 4242,
                process_start_time: 987_654,
            },
            1_700_000_000_000,
        );

        let encoded = serde_json::to_string(&handle).unwrap();
        let decoded: TaskHandle = serde_json::from_str(&encoded).unwrap();
        assert_eq!(handle, decoded);
        assert_eq!(decoded.version, HANDLE_VERSION);
        assert_eq!(decoded.reattach.pid, 4242);
    }
}
