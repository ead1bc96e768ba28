//! Configuration module for deploy runs.
//!
//! This module handles all settings-related functionality:
//! - Deserializing `gantry.yaml`
//! - `.env` loading and `GANTRY_*` environment overrides
//! - Validation of settings values

mod parser;
mod settings;
mod validator;

pub use parser::{
    DEFAULT_SETTINGS_FILES, ENV_CHECK_ONLY, ENV_LOG_LEVEL, ENV_MAX_CONCURRENT_GROUPS,
    ENV_STATE_PATH, SettingsParser, find_settings_file,
};
pub use settings::{
    DEFAULT_STATE_PATH, DeployOptionsSettings, DeploySettings, LOG_LEVELS, LoggingSettings,
    StateSettings,
};
pub use validator::{SettingsValidator, ValidationError, ValidationResult};
