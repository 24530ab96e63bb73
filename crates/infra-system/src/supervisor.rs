// Unix process supervisor
// Launches one child per task (own process group, logs redirected to the
// task log dir, optional cgroup placement) and owns its lifetime: signal
// delivery, stop escalation, exit capture, reattach after agent restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use execdrive_core::domain::{ExitResult, ReattachConfig, TaskConfig};
use execdrive_core::port::identity::{IdentityError, IdentityProbe, ResolvedUser};
use execdrive_core::port::signal_map::SignalMap;
use execdrive_core::port::supervisor::{ProcessSupervisor, SupervisedProcess, SupervisorError};
use execdrive_core::port::TimeProvider;

/// Poll interval for processes we reattached to but are not the parent of
const REATTACH_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Upper bound on waiting for the exit capture to land during destroy
const DESTROY_REAP_TIMEOUT: Duration = Duration::from_secs(5);

type AttachTable = Arc<Mutex<HashMap<i32, Arc<UnixProcess>>>>;

/// Process supervisor for Unix hosts
///
/// Keeps a pid-keyed table of everything it launched in this process
/// lifetime so reattach inside the same agent process retains full exit
/// fidelity; reattach across a real restart falls back to polling the OS
/// process table.
pub struct UnixProcessSupervisor {
    identity: Arc<dyn IdentityProbe>,
    signals: Arc<dyn SignalMap>,
    time: Arc<dyn TimeProvider>,
    attached: AttachTable,
}

impl UnixProcessSupervisor {
    pub fn new(
        identity: Arc<dyn IdentityProbe>,
        signals: Arc<dyn SignalMap>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            identity,
            signals,
            time,
            attached: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn resolve_user(&self, config: &TaskConfig) -> Result<Option<ResolvedUser>, SupervisorError> {
        if config.user.is_empty() {
            // Run as the supervisor's own identity
            return Ok(None);
        }
        match self.identity.resolve_user(&config.user) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(IdentityError::UnknownUser(name)) => Err(SupervisorError::UnknownUser(name)),
            Err(IdentityError::Lookup(msg)) => Err(SupervisorError::Launch(msg)),
        }
    }

    fn open_log(&self, config: &TaskConfig, stream: &str) -> Result<std::fs::File, SupervisorError> {
        let path = config.log_dir.join(config.log_file_name(stream, 0));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                SupervisorError::Launch(format!("failed to open {}: {}", path.display(), e))
            })
    }
}

#[async_trait]
impl ProcessSupervisor for UnixProcessSupervisor {
    async fn launch(
        &self,
        config: &TaskConfig,
    ) -> Result<Arc<dyn SupervisedProcess>, SupervisorError> {
        let user = self.resolve_user(config)?;

        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            SupervisorError::Launch(format!(
                "failed to create log dir {}: {}",
                config.log_dir.display(),
                e
            ))
        })?;
        let stdout = self.open_log(config, "stdout")?;
        let stderr = self.open_log(config, "stderr")?;

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            // The child must outlive the agent; reattach handles cleanup
            .kill_on_drop(false)
            // Own group so signals reach every descendant
            .process_group(0);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(user) = user {
            cmd.uid(user.uid).gid(user.gid);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SupervisorError::Launch(format!("failed to spawn process: {}", e)))?;

        let Some(pid) = child.id().map(|p| p as i32) else {
            let _ = child.wait().await;
            return Err(SupervisorError::Launch(
                "process exited before it could be supervised".to_string(),
            ));
        };

        // Resource placement is fatal: reap the child before erroring so
        // no process is left behind
        if let Some(cgroup) = &config.resources.cgroup_path {
            if let Err(e) = attach_cgroup(cgroup, pid) {
                let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
                let _ = child.wait().await;
                return Err(SupervisorError::Launch(format!(
                    "failed to place pid {} in cgroup {}: {}",
                    pid,
                    cgroup.display(),
                    e
                )));
            }
        }

        let started_at = self.time.now_millis();
        let process_start_time = process_start_time(pid).unwrap_or(0);
        let cgroup = config.resources.cgroup_path.clone();

        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(capture_exit(child, cgroup, exit_tx));

        let proc = Arc::new(UnixProcess {
            pid,
            started_at,
            process_start_time,
            exit_rx,
            signals: self.signals.clone(),
            attached: self.attached.clone(),
        });
        self.attached.lock().unwrap().insert(pid, proc.clone());

        info!(
            task_id = %config.id,
            command = %config.command,
            pid,
            user = %config.user,
            "Launched supervised process"
        );
        Ok(proc)
    }

    async fn reattach(
        &self,
        reattach: &ReattachConfig,
    ) -> Result<Arc<dyn SupervisedProcess>, SupervisorError> {
        // Fast path: we launched it in this process lifetime and still own
        // the real exit status
        if let Some(proc) = self.attached.lock().unwrap().get(&reattach.pid) {
            if reattach.process_start_time == 0
                || proc.process_start_time == reattach.process_start_time
            {
                debug!(pid = reattach.pid, "Reattached to in-process supervisor");
                return Ok(proc.clone());
            }
        }

        // Cross-restart path: the OS process table is the source of truth
        if !process_alive(reattach.pid) {
            return Err(SupervisorError::Reattach(format!(
                "no process with pid {}",
                reattach.pid
            )));
        }
        if let Some(start_time) = process_start_time(reattach.pid) {
            if reattach.process_start_time != 0 && start_time != reattach.process_start_time {
                return Err(SupervisorError::Reattach(format!(
                    "pid {} was reused by another process",
                    reattach.pid
                )));
            }
        }

        // The child was reparented while the agent was down; its exit
        // status is unobservable, so supervision degrades to liveness
        // polling.
        let pid = reattach.pid;
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            while process_alive(pid) {
                sleep(REATTACH_POLL_INTERVAL).await;
            }
            let _ = exit_tx.send(Some(ExitResult {
                exit_code: -1,
                signal: 0,
                oom_killed: false,
                err: Some("process exit status lost across agent restart".to_string()),
            }));
        });

        let proc = Arc::new(UnixProcess {
            pid,
            started_at: self.time.now_millis(),
            process_start_time: reattach.process_start_time,
            exit_rx,
            signals: self.signals.clone(),
            attached: self.attached.clone(),
        });
        self.attached.lock().unwrap().insert(pid, proc.clone());

        info!(pid, "Reattached to process via process-table polling");
        Ok(proc)
    }
}

/// Waiter task: reaps the child and publishes the terminal result once
async fn capture_exit(
    mut child: tokio::process::Child,
    cgroup: Option<PathBuf>,
    exit_tx: watch::Sender<Option<ExitResult>>,
) {
    let result = match child.wait().await {
        Ok(status) => {
            // A signal-killed child carries no exit code; report -1 plus
            // the numeric signal
            let exit_code = status.code().unwrap_or(-1);
            let signal = status.signal().unwrap_or(0);
            let oom_killed = cgroup.as_deref().map(cgroup_oom_killed).unwrap_or(false);
            ExitResult {
                exit_code,
                signal,
                oom_killed,
                err: None,
            }
        }
        Err(e) => ExitResult {
            exit_code: -1,
            signal: 0,
            oom_killed: false,
            err: Some(format!("wait on child failed: {}", e)),
        },
    };
    let _ = exit_tx.send(Some(result));
}

/// One supervised child process
pub struct UnixProcess {
    pid: i32,
    started_at: i64,
    process_start_time: u64,
    exit_rx: watch::Receiver<Option<ExitResult>>,
    signals: Arc<dyn SignalMap>,
    attached: AttachTable,
}

impl UnixProcess {
    fn exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    fn deliver(&self, name: &str) -> Result<(), SupervisorError> {
        let num = self
            .signals
            .lookup(name)
            .ok_or_else(|| SupervisorError::UnsupportedSignal(name.to_string()))?;
        let sig = Signal::try_from(num)
            .map_err(|e| SupervisorError::UnsupportedSignal(format!("{}: {}", name, e)))?;
        killpg(Pid::from_raw(self.pid), sig).map_err(|e| {
            SupervisorError::Signal(format!(
                "failed to deliver {} to process group {}: {}",
                name, self.pid, e
            ))
        })
    }

    /// Await termination with an upper bound; true if the process exited
    async fn wait_with_deadline(&self, grace: Duration) -> bool {
        let mut rx = self.exit_rx.clone();
        timeout(grace, async move {
            loop {
                if rx.borrow_and_update().is_some() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl SupervisedProcess for UnixProcess {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn started_at(&self) -> i64 {
        self.started_at
    }

    fn reattach_config(&self) -> ReattachConfig {
        ReattachConfig {
            pid: self.pid,
            process_start_time: self.process_start_time,
        }
    }

    async fn wait(&self) -> ExitResult {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // The capture task died without reporting; treat loss of
                // the control channel as a terminal outcome
                return ExitResult::executor_lost("supervisor control channel lost");
            }
        }
    }

    async fn signal(&self, name: &str) -> Result<(), SupervisorError> {
        self.deliver(name)
    }

    async fn stop(&self, signal: Option<&str>, grace_ms: i64) -> Result<(), SupervisorError> {
        if self.exited() {
            return Ok(());
        }

        let name = signal.unwrap_or("SIGINT");
        if let Err(err) = self.deliver(name) {
            // The process may have exited between the check and delivery;
            // stop stays idempotent in that window
            if self.exited() || !process_alive(self.pid) {
                return Ok(());
            }
            return Err(err);
        }

        let grace = Duration::from_millis(grace_ms.max(0) as u64);
        if !self.wait_with_deadline(grace).await {
            warn!(
                pid = self.pid,
                signal = name,
                grace_ms,
                "Process survived its grace period, escalating to SIGKILL"
            );
            let _ = killpg(Pid::from_raw(self.pid), Signal::SIGKILL);
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), SupervisorError> {
        if !self.exited() {
            let _ = killpg(Pid::from_raw(self.pid), Signal::SIGKILL);
        }
        if !self.wait_with_deadline(DESTROY_REAP_TIMEOUT).await {
            warn!(pid = self.pid, "Timed out waiting for exit capture during destroy");
        }
        self.attached.lock().unwrap().remove(&self.pid);
        debug!(pid = self.pid, "Released supervision resources");
        Ok(())
    }
}

fn process_alive(pid: i32) -> bool {
    // Signal 0 probes existence without delivering anything
    kill(Pid::from_raw(pid), None).is_ok()
}

fn process_start_time(pid: i32) -> Option<u64> {
    let sys_pid = sysinfo::Pid::from_u32(pid as u32);
    let mut system = System::new();
    if !system.refresh_process(sys_pid) {
        return None;
    }
    system.process(sys_pid).map(|p| p.start_time())
}

fn attach_cgroup(path: &Path, pid: i32) -> std::io::Result<()> {
    std::fs::write(path.join("cgroup.procs"), pid.to_string())
}

fn cgroup_oom_killed(path: &Path) -> bool {
    let Ok(events) = std::fs::read_to_string(path.join("memory.events")) else {
        return false;
    };
    events.lines().any(|line| {
        line.strip_prefix("oom_kill ")
            .and_then(|count| count.trim().parse::<u64>().ok())
            .map_or(false, |count| count > 0)
    })
}
