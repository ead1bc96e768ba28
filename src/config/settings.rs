//! Settings types for a deploy run.
//!
//! These types map to the `gantry.yaml` settings file. Every section is
//! optional and falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the workspace state file.
pub const DEFAULT_STATE_PATH: &str = ".gantry/state.json";

/// Log levels accepted in `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Root settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeploySettings {
    /// Deploy run options.
    #[serde(default)]
    pub deploy: DeployOptionsSettings,
    /// State storage options.
    #[serde(default)]
    pub state: StateSettings,
    /// Logging options.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Options of the deploy run itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeployOptionsSettings {
    /// Validate instead of deploying.
    #[serde(default)]
    pub check_only: bool,
    /// Maximum number of groups dispatched at once. Unbounded if absent.
    #[serde(default)]
    pub max_concurrent_groups: Option<usize>,
}

/// Where and how workspace state is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StateSettings {
    /// Path of the state file.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// Holder name written to the lock file. Generated if absent.
    #[serde(default)]
    pub lock_holder: Option<String>,
}

/// Logging output options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Minimum level, one of [`LOG_LEVELS`].
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of text.
    #[serde(default)]
    pub json: bool,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

fn default_log_level() -> String {
    String::from("info")
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            lock_holder: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
