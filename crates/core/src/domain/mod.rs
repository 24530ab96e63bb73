// Domain Layer - Pure task model, no infrastructure

pub mod error;
pub mod handle;
pub mod task;

// Re-exports
pub use error::DomainError;
pub use handle::{ReattachConfig, TaskHandle, HANDLE_VERSION};
pub use task::{AllocId, ExitResult, Resources, TaskConfig, TaskId, TaskState, TaskStatus};
