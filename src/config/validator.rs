use crate::config::Config;
use crate::error::{Result, ServiceRulesError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    ///
    /// An empty `services_files` list is not rejected here; the rule filter
    /// reports it as missing configuration when it is built.
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_rules(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceRulesError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_rules(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.rules.name.trim().is_empty() {
            errors.push(ValidationError::new(
                "rules.name",
                "Filter name cannot be empty",
            ));
        }

        for (idx, file) in config.rules.services_files.iter().enumerate() {
            if file.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    format!("rules.services_files[{}]", idx),
                    "Signatures file path cannot be empty",
                ));
            }
        }

        // Loading the same file twice only shadows its own rulesets
        for (idx, file) in config.rules.services_files.iter().enumerate() {
            if config.rules.services_files[..idx].contains(file) {
                errors.push(ValidationError::new(
                    format!("rules.services_files[{}]", idx),
                    format!("Duplicate signatures file: {}", file.display()),
                ));
            }
        }
    }
}
