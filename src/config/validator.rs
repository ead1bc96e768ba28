//! Settings validation.
//!
//! Collects every problem in one pass so a user sees all of them at once;
//! the first error is returned as the failure.

use crate::error::{ConfigError, GantryError, Result};
use std::fmt;
use tracing::{debug, warn};

use super::settings::{DeploySettings, LOG_LEVELS};

/// Concurrency limits above this only produce a warning.
const HIGH_CONCURRENCY: usize = 64;

/// Validator for deploy settings.
#[derive(Debug, Default)]
pub struct SettingsValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors.
    pub errors: Vec<ValidationError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// Path of the offending field.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl SettingsValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates deploy settings.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, settings: &DeploySettings) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_deploy(settings, &mut result);
        Self::validate_state(settings, &mut result);
        Self::validate_logging(settings, &mut result);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if let Some(first) = result.errors.first() {
            return Err(GantryError::Config(ConfigError::validation(
                first.message.clone(),
                first.field.clone(),
            )));
        }
        debug!("Settings validation passed");
        Ok(result)
    }

    fn validate_deploy(settings: &DeploySettings, result: &mut ValidationResult) {
        match settings.deploy.max_concurrent_groups {
            Some(0) => result.errors.push(ValidationError {
                field: String::from("deploy.max_concurrent_groups"),
                message: String::from("Concurrency limit must be at least 1"),
            }),
            Some(limit) if limit > HIGH_CONCURRENCY => result.warnings.push(format!(
                "deploy.max_concurrent_groups: {limit} concurrent groups may exceed adapter rate limits"
            )),
            _ => {}
        }
    }

    fn validate_state(settings: &DeploySettings, result: &mut ValidationResult) {
        if settings.state.path.as_os_str().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("state.path"),
                message: String::from("State path cannot be empty"),
            });
        }

        if settings
            .state
            .lock_holder
            .as_deref()
            .is_some_and(|holder| holder.trim().is_empty())
        {
            result.errors.push(ValidationError {
                field: String::from("state.lock_holder"),
                message: String::from("Lock holder cannot be blank"),
            });
        }
    }

    fn validate_logging(settings: &DeploySettings, result: &mut ValidationResult) {
        if !LOG_LEVELS.contains(&settings.logging.level.as_str()) {
            result.errors.push(ValidationError {
                field: String::from("logging.level"),
                message: format!(
                    "Unknown log level '{}'. Expected one of: {}",
                    settings.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_are_valid() {
        let result = SettingsValidator::new().validate(&DeploySettings::default()).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut settings = DeploySettings::default();
        settings.deploy.max_concurrent_groups = Some(0);

        let err = SettingsValidator::new().validate(&settings).unwrap_err();
        assert!(matches!(
            err,
            GantryError::Config(ConfigError::ValidationError { field: Some(ref f), .. })
                if f == "deploy.max_concurrent_groups"
        ));
    }

    #[test]
    fn test_high_concurrency_warns() {
        let mut settings = DeploySettings::default();
        settings.deploy.max_concurrent_groups = Some(500);

        let result = SettingsValidator::new().validate(&settings).unwrap();
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut settings = DeploySettings::default();
        settings.logging.level = String::from("verbose");

        let err = SettingsValidator::new().validate(&settings).unwrap_err();
        assert!(err.to_string().contains("Unknown log level 'verbose'"));
    }

    #[test]
    fn test_empty_state_path_rejected() {
        let mut settings = DeploySettings::default();
        settings.state.path = PathBuf::new();
        settings.state.lock_holder = Some(String::from("  "));

        let err = SettingsValidator::new().validate(&settings).unwrap_err();
        assert!(matches!(
            err,
            GantryError::Config(ConfigError::ValidationError { field: Some(ref f), .. })
                if f == "state.path"
        ));
    }
}
