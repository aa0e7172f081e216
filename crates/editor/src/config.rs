//! Editor configuration
//!
//! Values can be set in code through the builder methods or loaded from
//! `EDITOR_*` environment variables.

use std::collections::HashMap;
use std::env;

use thiserror::Error;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    EnvVar(String),
    Default(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Prefix added to every row id on the wire
    pub id_prefix: String,
    /// Run each request inside one storage transaction
    pub transactions: bool,
    /// Fold runtime errors into the response `error` instead of returning them
    pub contained_errors: bool,
    /// Attach executed statements to the response
    pub debug: bool,
    /// Also delete directly linked rows of left-joined tables on remove
    pub left_join_remove: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            id_prefix: "row_".to_string(),
            transactions: true,
            contained_errors: false,
            debug: false,
            left_join_remove: false,
        }
    }
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            id_prefix: env::var("EDITOR_ID_PREFIX").unwrap_or(defaults.id_prefix),
            transactions: env_flag("EDITOR_TRANSACTIONS", defaults.transactions)?,
            contained_errors: env_flag("EDITOR_CONTAINED_ERRORS", defaults.contained_errors)?,
            debug: env_flag("EDITOR_DEBUG", defaults.debug)?,
            left_join_remove: env_flag("EDITOR_LEFT_JOIN_REMOVE", defaults.left_join_remove)?,
        })
    }

    pub fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        for (field, var) in [
            ("id_prefix", "EDITOR_ID_PREFIX"),
            ("transactions", "EDITOR_TRANSACTIONS"),
            ("contained_errors", "EDITOR_CONTAINED_ERRORS"),
            ("debug", "EDITOR_DEBUG"),
            ("left_join_remove", "EDITOR_LEFT_JOIN_REMOVE"),
        ] {
            let source = if env::var(var).is_ok() {
                ConfigSource::EnvVar(var.to_string())
            } else {
                ConfigSource::Default(field.to_string())
            };
            sources.insert(field.to_string(), source);
        }
        sources
    }

    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn transactions(mut self, enabled: bool) -> Self {
        self.transactions = enabled;
        self
    }

    pub fn contained_errors(mut self, enabled: bool) -> Self {
        self.contained_errors = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn left_join_remove(mut self, enabled: bool) -> Self {
        self.left_join_remove = enabled;
        self
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                field: key.to_string(),
                value,
                expected: "true or false".to_string(),
            }),
        },
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue { field: String, value: String, expected: String },
}
