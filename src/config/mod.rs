//! Configuration management for service-rules
//!
//! Configuration is a TOML file naming the signature files the rule filter
//! loads. The order of `services_files` is the match priority.

use crate::error::{Result, ServiceRulesError};
use crate::filtering::DEFAULT_FILTER_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "SERVICE_RULES_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub rules: RulesConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn default_filter_name() -> String {
    DEFAULT_FILTER_NAME.to_string()
}

/// Rule filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Filter instance name
    #[serde(default = "default_filter_name")]
    pub name: String,
    /// Signature files, highest priority first
    #[serde(default, alias = "servicesfiles", alias = "servicesFiles")]
    pub services_files: Vec<PathBuf>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RulesConfig {
    pub fn new(services_files: Vec<PathBuf>) -> Self {
        Self {
            name: default_filter_name(),
            services_files,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ServiceRulesError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ServiceRulesError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        config.resolve_paths(path.parent())?;

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ServiceRulesError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SERVICE_RULES_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RULES__SERVICES_FILES" => {
                self.rules.services_files = std::env::split_paths(value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect();
            }
            "RULES__NAME" => {
                if value.is_empty() {
                    return Err(ServiceRulesError::InvalidConfigValue {
                        path: path.to_string(),
                        message: "Filter name cannot be empty".to_string(),
                    });
                }
                self.rules.name = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Expand `~/` and resolve relative signature paths against `base`
    pub fn resolve_paths(&mut self, base: Option<&Path>) -> Result<()> {
        for file in &mut self.rules.services_files {
            let expanded = expand_path(file)?;
            *file = match base {
                Some(base) if expanded.is_relative() && !base.as_os_str().is_empty() => {
                    base.join(expanded)
                }
                _ => expanded,
            };
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ServiceRulesError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("service-rules").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = PathBuf::from("~/.config/service-rules");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            rules: RulesConfig::new(vec![config_dir.join("services.json")]),
        }
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ServiceRulesError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            ServiceRulesError::Config("Cannot determine home directory".to_string())
        })?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[_meta]
schema_version = "1.0.0"

[rules]
services_files = ["builtin.json", "/etc/service-rules/site.json"]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.rules.name, DEFAULT_FILTER_NAME);
        assert_eq!(
            config.rules.services_files,
            vec![
                dir.path().join("builtin.json"),
                PathBuf::from("/etc/service-rules/site.json"),
            ]
        );
    }

    #[test]
    fn test_legacy_key_alias() {
        let config: Config = toml::from_str(
            r#"
[_meta]
schema_version = "1.0.0"

[rules]
servicesfiles = ["a.json"]
"#,
        )
        .unwrap();

        assert_eq!(config.rules.services_files, vec![PathBuf::from("a.json")]);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ServiceRulesError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.rules.services_files = vec![dir.path().join("services.json")];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.rules.services_files, config.rules.services_files);
        assert_eq!(loaded.meta.schema_version, "1.0.0");
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_path(Path::new("~/rules.json")).unwrap();
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("rules.json"));
    }
}
