// Driver Configuration
// Delivered once at driver initialization and re-appliable at runtime.

use serde::{Deserialize, Serialize};

/// Driver-level configuration blob from the scheduling/placement layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Refuse StartTask entirely when false
    pub enabled: bool,

    /// Denied execution uids as a comma-separated list of ids and
    /// inclusive ranges, e.g. "0,100-199"
    pub denied_host_uids: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            denied_host_uids: String::new(),
        }
    }
}
