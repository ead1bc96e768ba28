//! Settings parser for loading and overriding deploy settings.
//!
//! Settings come from a YAML file, then environment variables (including a
//! `.env` file next to the settings) override individual keys.

use crate::error::{ConfigError, GantryError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::settings::DeploySettings;

/// Environment variable overriding `deploy.check_only`.
pub const ENV_CHECK_ONLY: &str = "GANTRY_CHECK_ONLY";
/// Environment variable overriding `deploy.max_concurrent_groups`.
pub const ENV_MAX_CONCURRENT_GROUPS: &str = "GANTRY_MAX_CONCURRENT_GROUPS";
/// Environment variable overriding `state.path`.
pub const ENV_STATE_PATH: &str = "GANTRY_STATE_PATH";
/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "GANTRY_LOG_LEVEL";

/// Default settings file names to search for.
pub const DEFAULT_SETTINGS_FILES: &[&str] = &["gantry.yaml", "gantry.yml"];

/// Parser for deploy settings.
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Directory holding the `.env` file.
    base_path: Option<PathBuf>,
}

impl SettingsParser {
    /// Creates a new settings parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is loaded from.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or invalid.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeploySettings> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(GantryError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GantryError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string. An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeploySettings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(DeploySettings::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            GantryError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads `.env`, the settings file and the environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if any source cannot be read or interpreted.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DeploySettings> {
        self.load_dotenv()?;
        let mut settings = self.load_file(path)?;
        Self::apply_env_overrides(&mut settings)?;
        Ok(settings)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn apply_env_overrides(settings: &mut DeploySettings) -> Result<()> {
        Self::apply_env_overrides_from(settings, |name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn apply_env_overrides_from(
        settings: &mut DeploySettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(value) = lookup(ENV_CHECK_ONLY) {
            debug!("Overriding deploy.check_only from environment");
            settings.deploy.check_only = parse_bool(ENV_CHECK_ONLY, &value)?;
        }

        if let Some(value) = lookup(ENV_MAX_CONCURRENT_GROUPS) {
            debug!("Overriding deploy.max_concurrent_groups from environment");
            let limit = value
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid_env(ENV_MAX_CONCURRENT_GROUPS, &value))?;
            settings.deploy.max_concurrent_groups = Some(limit);
        }

        if let Some(path) = lookup(ENV_STATE_PATH) {
            debug!("Overriding state.path from environment");
            settings.state.path = PathBuf::from(path);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            debug!("Overriding logging.level from environment");
            settings.logging.level = level.trim().to_lowercase();
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                GantryError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_env(name, value)),
    }
}

fn invalid_env(name: &str, value: &str) -> GantryError {
    GantryError::Config(ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Finds the settings file in `start_dir` or one of its parents.
///
/// # Errors
///
/// Returns an error if no settings file is found.
pub fn find_settings_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_SETTINGS_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found settings file: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(GantryError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_SETTINGS_FILES[0]),
    }))
}
