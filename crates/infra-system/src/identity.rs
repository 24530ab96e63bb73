// System identity probe
// Resolves execution users against the host passwd database.

use nix::unistd::{getuid, Uid, User};

use execdrive_core::port::identity::{IdentityError, IdentityProbe, ResolvedUser};

/// Identity probe backed by the OS user database
pub struct SystemIdentityProbe;

impl IdentityProbe for SystemIdentityProbe {
    fn current_uid(&self) -> u32 {
        getuid().as_raw()
    }

    fn resolve_user(&self, user: &str) -> Result<ResolvedUser, IdentityError> {
        match User::from_name(user) {
            Ok(Some(u)) => Ok(ResolvedUser {
                uid: u.uid.as_raw(),
                gid: u.gid.as_raw(),
            }),
            Ok(None) => {
                // Numeric ids are accepted when a matching passwd entry exists
                if let Ok(uid) = user.parse::<u32>() {
                    match User::from_uid(Uid::from_raw(uid)) {
                        Ok(Some(u)) => {
                            return Ok(ResolvedUser {
                                uid: u.uid.as_raw(),
                                gid: u.gid.as_raw(),
                            })
                        }
                        Ok(None) => {}
                        Err(e) => return Err(IdentityError::Lookup(e.to_string())),
                    }
                }
                Err(IdentityError::UnknownUser(user.to_string()))
            }
            Err(e) => Err(IdentityError::Lookup(e.to_string())),
        }
    }
}
