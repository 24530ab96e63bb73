// Application Layer - Driver facade and task lifecycle services

pub mod config;
pub mod driver;
pub mod state;
pub mod validator;

// Re-exports
pub use config::DriverConfig;
pub use driver::{RawExecDriver, DEFAULT_STOP_GRACE_MS, DEFAULT_STOP_SIGNAL};
pub use state::TaskEntry;
pub use validator::{IdSet, UserPolicyValidator};
