// Execution Identity Port
// The policy validator and the launcher must compute the effective
// identity identically, so both go through this probe.

use thiserror::Error;

/// A resolved execution user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedUser {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("user lookup failed: {0}")]
    Lookup(String),
}

/// Identity probe port
pub trait IdentityProbe: Send + Sync {
    /// Uid the supervisor process itself runs as
    fn current_uid(&self) -> u32;

    /// Resolve a user by name or numeric id string
    ///
    /// # Errors
    /// - `IdentityError::UnknownUser` if no matching user exists
    fn resolve_user(&self, user: &str) -> Result<ResolvedUser, IdentityError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// Mock identity probe with a fixed ambient uid and user table
    pub struct MockIdentityProbe {
        uid: u32,
        users: HashMap<String, ResolvedUser>,
    }

    impl MockIdentityProbe {
        pub fn new(uid: u32) -> Self {
            Self {
                uid,
                users: HashMap::new(),
            }
        }

        pub fn with_user(mut self, name: impl Into<String>, uid: u32, gid: u32) -> Self {
            self.users.insert(name.into(), ResolvedUser { uid, gid });
            self
        }
    }

    impl IdentityProbe for MockIdentityProbe {
        fn current_uid(&self) -> u32 {
            self.uid
        }

        fn resolve_user(&self, user: &str) -> Result<ResolvedUser, IdentityError> {
            if let Some(resolved) = self.users.get(user) {
                return Ok(*resolved);
            }
            if let Ok(uid) = user.parse::<u32>() {
                return Ok(ResolvedUser { uid, gid: uid });
            }
            Err(IdentityError::UnknownUser(user.to_string()))
        }
    }
}
