// Signal Name Translation Port
// Injectable so non-POSIX targets can substitute their own table or
// report unsupported-signal errors instead.

/// Translate POSIX-style signal names to platform signal numbers
pub trait SignalMap: Send + Sync {
    /// Numeric value for a name like "SIGINT" or "SIGUSR1"; None if the
    /// platform does not support it
    fn lookup(&self, name: &str) -> Option<i32>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Minimal fixed table for tests
    pub struct MockSignalMap;

    impl SignalMap for MockSignalMap {
        fn lookup(&self, name: &str) -> Option<i32> {
            match name {
                "SIGINT" => Some(2),
                "SIGKILL" => Some(9),
                "SIGUSR1" => Some(10),
                "SIGTERM" => Some(15),
                _ => None,
            }
        }
    }
}
