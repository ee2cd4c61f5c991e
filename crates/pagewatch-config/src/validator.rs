//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

const LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
const TYPES: [&str; 7] = [
    "console",
    "network",
    "error",
    "performance",
    "page",
    "security",
    "runtime",
];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a `ConfigError`, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(ConfigError::InvalidValue {
                field: e.path,
                message: e.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_screenshots(config, &mut result);
        Self::validate_control(config, &mut result);
        Self::validate_server(config, &mut result);

        result
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let endpoint = &config.browser.endpoint;
        if endpoint.is_empty() {
            result.add_error(ValidationError::new(
                "browser.endpoint",
                "Endpoint cannot be empty",
            ));
        } else if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            result.add_error(ValidationError::new(
                "browser.endpoint",
                "Endpoint must start with http:// or https://",
            ));
        }

        if config.browser.command_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "browser.command_timeout_ms",
                "command_timeout_ms must be greater than 0",
            ));
        }

        if config.browser.reconnect_attempts == 0 {
            result.add_warning(ValidationWarning::new(
                "browser.reconnect_attempts",
                "Reconnect is disabled, a dropped connection will fail every control request",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        if !LEVELS.contains(&config.logging.min_level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.min_level",
                format!(
                    "Unknown level '{}', valid values: {:?}",
                    config.logging.min_level, LEVELS
                ),
            ));
        }

        for t in &config.logging.types {
            if !TYPES.contains(&t.as_str()) {
                result.add_error(ValidationError::new(
                    "logging.types",
                    format!("Unknown entry type '{}', valid values: {:?}", t, TYPES),
                ));
            }
        }
    }

    fn validate_screenshots(config: &Config, result: &mut ValidationResult) {
        if !(1..=5).contains(&config.screenshots.min_severity) {
            result.add_error(ValidationError::new(
                "screenshots.min_severity",
                "min_severity must be between 1 and 5",
            ));
        }

        if !config.screenshots.on_error {
            result.add_warning(ValidationWarning::new(
                "screenshots.on_error",
                "Automatic screenshots are disabled",
            ));
        }
    }

    fn validate_control(config: &Config, result: &mut ValidationResult) {
        let control = &config.control;
        if control.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "control.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }

        if control.default_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "control.default_timeout_ms",
                "default_timeout_ms must be greater than 0",
            ));
        }

        if control.poll_interval_ms > control.default_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "control.poll_interval_ms",
                "poll_interval_ms exceeds default_timeout_ms, waits will check only once",
            ));
        }
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
