// POSIX signal table
// The injectable SignalMap implementation for Unix hosts.

use nix::sys::signal::Signal;
use std::str::FromStr;

use execdrive_core::port::signal_map::SignalMap;

/// Signal-name translation backed by the platform signal set
///
/// Accepts both "SIGUSR1" and the bare "USR1" spelling.
pub struct PosixSignals;

impl SignalMap for PosixSignals {
    fn lookup(&self, name: &str) -> Option<i32> {
        let canonical;
        let name = if name.starts_with("SIG") {
            name
        } else {
            canonical = format!("SIG{}", name);
            &canonical
        };
        Signal::from_str(name).ok().map(|sig| sig as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_common_signals() {
        let map = PosixSignals;
        assert_eq!(map.lookup("SIGINT"), Some(Signal::SIGINT as i32));
        assert_eq!(map.lookup("SIGKILL"), Some(9));
        assert_eq!(map.lookup("SIGTERM"), Some(15));
        assert_eq!(map.lookup("SIGUSR1"), Some(Signal::SIGUSR1 as i32));
    }

    #[test]
    fn test_lookup_accepts_bare_names() {
        let map = PosixSignals;
        assert_eq!(map.lookup("INT"), map.lookup("SIGINT"));
        assert_eq!(map.lookup("USR1"), map.lookup("SIGUSR1"));
    }

    #[test]
    fn test_lookup_rejects_unknown_names() {
        let map = PosixSignals;
        assert_eq!(map.lookup("SIGBOGUS"), None);
        assert_eq!(map.lookup(""), None);
    }
}
