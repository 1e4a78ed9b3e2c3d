use std::path::PathBuf;

use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// Configuration for the OmniLogic integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Enable the integration (default: true when section is present)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON snapshot of the controller's device tree
    pub snapshot: PathBuf,

    /// Re-read the snapshot this often, in seconds (default: never)
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}
