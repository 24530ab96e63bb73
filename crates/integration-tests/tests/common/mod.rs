// Shared harness for driver integration tests

use std::path::Path;
use std::sync::Arc;

use execdrive_core::application::RawExecDriver;
use execdrive_core::domain::TaskConfig;
use execdrive_core::port::SystemTimeProvider;
use execdrive_system::{PosixSignals, SystemIdentityProbe, UnixProcessSupervisor};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("execdrive=info")),
        )
        .with_test_writer()
        .try_init();
}

pub fn system_supervisor() -> Arc<UnixProcessSupervisor> {
    Arc::new(UnixProcessSupervisor::new(
        Arc::new(SystemIdentityProbe),
        Arc::new(PosixSignals),
        Arc::new(SystemTimeProvider),
    ))
}

pub fn driver(supervisor: Arc<UnixProcessSupervisor>) -> RawExecDriver {
    RawExecDriver::new(
        supervisor,
        Arc::new(SystemIdentityProbe),
        Arc::new(SystemTimeProvider),
    )
}

pub fn task(task_dir: &Path, name: &str, command: &str, args: &[&str]) -> TaskConfig {
    TaskConfig {
        id: uuid::Uuid::new_v4().to_string(),
        alloc_id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        log_dir: task_dir.join("logs"),
        ..Default::default()
    }
}
