// End-to-end lifecycle tests against real processes (Unix only)

mod common;

use std::sync::Arc;
use std::time::Duration;

use execdrive_core::domain::TaskState;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use common::{driver, init_tracing, system_supervisor, task};

#[tokio::test]
async fn test_start_wait_stop() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let driver = Arc::new(driver(system_supervisor()));

    let config = task(dir.path(), "sleeper", "/bin/sleep", &["100"]);
    let task_id = config.id.clone();
    driver.start_task(config).await.unwrap();

    let waiter = {
        let driver = driver.clone();
        let task_id = task_id.clone();
        tokio::spawn(async move { driver.wait_task(&task_id).await.unwrap() })
    };

    sleep(Duration::from_millis(100)).await;
    driver.stop_task(&task_id, Some(2_000), Some("SIGINT")).await.unwrap();

    let result = timeout(Duration::from_secs(10), waiter)
        .await
        .expect("timeout waiting for task to shut down")
        .unwrap();
    assert_eq!(result.signal, 2, "expected SIGINT death: {:?}", result);
    assert!(!result.successful());

    // The state machine flips to Exited shortly after the wait resolves
    let mut state = driver.inspect_task(&task_id).unwrap().state;
    for _ in 0..50 {
        if state == TaskState::Exited {
            break;
        }
        sleep(Duration::from_millis(100)).await;
        state = driver.inspect_task(&task_id).unwrap().state;
    }
    assert_eq!(state, TaskState::Exited);

    driver.destroy_task(&task_id, true).await.unwrap();
}

#[tokio::test]
async fn test_signal_trap_exits_with_code() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let driver = Arc::new(driver(system_supervisor()));

    let script = dir.path().join("test.sh");
    std::fs::write(
        &script,
        r#"
at_term() {
    echo 'Terminated.'
    exit 3
}
trap at_term USR1
while true; do
    sleep 1
done
"#,
    )
    .unwrap();

    let mut config = task(dir.path(), "signal", "/bin/bash", &["test.sh"]);
    config.cwd = Some(dir.path().to_path_buf());
    let task_id = config.id.clone();
    driver.start_task(config).await.unwrap();

    sleep(Duration::from_millis(200)).await;
    driver.signal_task(&task_id, "SIGUSR1").await.unwrap();

    let result = timeout(Duration::from_secs(6), driver.wait_task(&task_id))
        .await
        .expect("wait_task timeout")
        .unwrap();
    assert!(!result.successful());
    assert_eq!(result.exit_code, 3);

    // The trap's output landed in the task-private stdout log
    let log_path = dir.path().join("logs").join("signal.stdout.0");
    let mut output = String::new();
    for _ in 0..50 {
        output = std::fs::read_to_string(&log_path).unwrap_or_default();
        if output.trim() == "Terminated." {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(output.trim(), "Terminated.");

    driver.destroy_task(&task_id, true).await.unwrap();
}

#[tokio::test]
async fn test_destroy_kills_all() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let driver = Arc::new(driver(system_supervisor()));

    let config = task(
        dir.path(),
        "forker",
        "/bin/sh",
        &["-c", r#"sleep 3600 & echo "SLEEP_PID=$!""#],
    );
    let task_id = config.id.clone();
    driver.start_task(config).await.unwrap();

    let result = timeout(Duration::from_secs(10), driver.wait_task(&task_id))
        .await
        .expect("wait_task timeout")
        .unwrap();
    assert!(result.successful(), "command failed: {:?}", result);

    // Pull the backgrounded child's pid out of the stdout log
    let log_path = dir.path().join("logs").join("forker.stdout.0");
    let mut sleep_pid = 0;
    for _ in 0..50 {
        let stdout = std::fs::read_to_string(&log_path).unwrap_or_default();
        if let Some(pid) = stdout
            .lines()
            .find_map(|line| line.strip_prefix("SLEEP_PID="))
            .and_then(|pid| pid.trim().parse::<i32>().ok())
        {
            sleep_pid = pid;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(sleep_pid > 0, "failed to find backgrounded pid in log");
    assert!(process_exists(sleep_pid), "backgrounded child not running");

    driver.destroy_task(&task_id, true).await.unwrap();

    let mut gone = false;
    for _ in 0..50 {
        if !process_exists(sleep_pid) {
            gone = true;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(gone, "backgrounded descendant survived destroy");
}

#[tokio::test]
async fn test_wait_result_is_cached_and_identical() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let driver = Arc::new(driver(system_supervisor()));

    let config = task(dir.path(), "brief", "/bin/sh", &["-c", "exit 5"]);
    let task_id = config.id.clone();
    driver.start_task(config).await.unwrap();

    let first = driver.wait_task(&task_id).await.unwrap();
    let second = driver.wait_task(&task_id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.exit_code, 5);

    // Stop on an already-exited task: no error, cached result untouched
    driver.stop_task(&task_id, Some(1_000), None).await.unwrap();
    assert_eq!(driver.wait_task(&task_id).await.unwrap(), first);

    driver.destroy_task(&task_id, false).await.unwrap();
}

fn process_exists(pid: i32) -> bool {
    std::path::Path::new(&format!("/proc/{}", pid)).exists()
}
