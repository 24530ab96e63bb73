// User Policy Validator
// Pre-launch check of the requested execution identity against a
// configured denylist. Pure function of configuration, no side effects.

use crate::application::config::DriverConfig;
use crate::domain::TaskConfig;
use crate::error::{DriverError, Result};
use crate::port::identity::{IdentityError, IdentityProbe};

/// Set of numeric ids, held as sorted inclusive ranges
///
/// Parsed from specs like "0,100-199,65534".
#[derive(Debug, Clone, Default)]
pub struct IdSet {
    ranges: Vec<(u32, u32)>,
}

impl IdSet {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut ranges = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let range = match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo = Self::parse_id(lo)?;
                    let hi = Self::parse_id(hi)?;
                    if lo > hi {
                        return Err(DriverError::Config(format!(
                            "invalid id range \"{}\": lower bound exceeds upper",
                            part
                        )));
                    }
                    (lo, hi)
                }
                None => {
                    let id = Self::parse_id(part)?;
                    (id, id)
                }
            };
            ranges.push(range);
        }
        ranges.sort_unstable();
        Ok(Self { ranges })
    }

    fn parse_id(s: &str) -> Result<u32> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| DriverError::Config(format!("invalid id \"{}\" in denylist", s.trim())))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ranges.iter().any(|&(lo, hi)| id >= lo && id <= hi)
    }
}

/// Validates the effective execution identity before launch
///
/// Computes the identity precisely as the launcher will: the explicit
/// `TaskConfig.user` when set, else the supervisor's own ambient uid.
pub struct UserPolicyValidator {
    denied_uids: IdSet,
}

impl UserPolicyValidator {
    /// Build from driver configuration; malformed denylist specs are
    /// rejected here, at set-config time, not at validation time
    pub fn new(config: &DriverConfig) -> Result<Self> {
        Ok(Self {
            denied_uids: IdSet::parse(&config.denied_host_uids)?,
        })
    }

    /// Check `task` against the denylist
    ///
    /// # Errors
    /// - `DriverError::PolicyViolation` naming the denied uid
    /// - `DriverError::UnknownUser` if an explicit user cannot be resolved
    pub fn validate(&self, task: &TaskConfig, identity: &dyn IdentityProbe) -> Result<()> {
        if self.denied_uids.is_empty() {
            return Ok(());
        }

        let uid = effective_uid(task, identity)?;
        if self.denied_uids.contains(uid) {
            return Err(DriverError::PolicyViolation { uid });
        }
        Ok(())
    }
}

/// Effective numeric identity a launch of `task` would run as
pub fn effective_uid(task: &TaskConfig, identity: &dyn IdentityProbe) -> Result<u32> {
    if task.user.is_empty() {
        return Ok(identity.current_uid());
    }
    match identity.resolve_user(&task.user) {
        Ok(resolved) => Ok(resolved.uid),
        Err(IdentityError::UnknownUser(name)) => Err(DriverError::UnknownUser(name)),
        Err(IdentityError::Lookup(msg)) => Err(DriverError::Config(msg)),
    }
}
