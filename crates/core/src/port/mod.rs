// Port Layer - Interfaces for external dependencies

pub mod identity;
pub mod signal_map;
pub mod supervisor;
pub mod time_provider;

// Re-exports
pub use identity::{IdentityError, IdentityProbe, ResolvedUser};
pub use signal_map::SignalMap;
pub use supervisor::{ProcessSupervisor, SupervisedProcess, SupervisorError};
pub use time_provider::{SystemTimeProvider, TimeProvider};
