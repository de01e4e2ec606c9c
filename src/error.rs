use std::path::PathBuf;
use thiserror::Error;

/// Main error type for service-rules
#[derive(Error, Debug)]
pub enum ServiceRulesError {
    /// No rule sources configured
    #[error("servicesFiles configuration value missing")]
    ConfigurationMissing,

    /// A declared rule source cannot be read
    #[error("Cannot read service signatures from {path:?}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A rule source does not decode into the signatures shape
    #[error("Malformed service signatures in {path:?}: {message}")]
    MalformedRules { path: PathBuf, message: String },

    /// A loaded ruleset cannot be turned into an engine expression
    #[error("Failed to compile ruleset '{ruleset}': {source}")]
    RuleCompilation {
        ruleset: String,
        source: serde_json::Error,
    },

    /// The rule engine rejected a compiled expression or its input
    #[error("Failed to evaluate ruleset '{ruleset}': {message}")]
    Evaluation { ruleset: String, message: String },

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceRulesError {
    /// True for errors raised while building the rule store
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationMissing | Self::SourceUnreadable { .. } | Self::MalformedRules { .. }
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
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

/// Result type for service-rules operations
pub type Result<T> = std::result::Result<T, ServiceRulesError>;
