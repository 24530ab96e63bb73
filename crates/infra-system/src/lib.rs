// Execdrive Infrastructure - Unix System Adapters
// Implements: ProcessSupervisor, IdentityProbe, SignalMap

pub mod identity;
pub mod signals;
pub mod supervisor;

pub use identity::SystemIdentityProbe;
pub use signals::PosixSignals;
pub use supervisor::{UnixProcess, UnixProcessSupervisor};
