//! Configuration error types
//!
//! Error codes:
//! - GRID_CONFIG_READ_FAILED (FATAL)
//! - GRID_CONFIG_INVALID_JSON (FATAL)
//! - GRID_CONFIG_INVALID_VALUE (FATAL)

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    GridConfigReadFailed,
    GridConfigInvalidJson,
    GridConfigInvalidValue,
}

impl ConfigErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigErrorCode::GridConfigReadFailed => "GRID_CONFIG_READ_FAILED",
            ConfigErrorCode::GridConfigInvalidJson => "GRID_CONFIG_INVALID_JSON",
            ConfigErrorCode::GridConfigInvalidValue => "GRID_CONFIG_INVALID_VALUE",
        }
    }

    /// A grid never boots from a bad config
    pub fn severity(&self) -> &'static str {
        "FATAL"
    }
}

impl fmt::Display for ConfigErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    code: ConfigErrorCode,
    message: String,
}

impl ConfigError {
    pub fn read_failed(path: &str, reason: impl fmt::Display) -> Self {
        Self {
            code: ConfigErrorCode::GridConfigReadFailed,
            message: format!("Failed to read config '{}': {}", path, reason),
        }
    }

    pub fn invalid_json(reason: impl fmt::Display) -> Self {
        Self {
            code: ConfigErrorCode::GridConfigInvalidJson,
            message: format!("Invalid config JSON: {}", reason),
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self {
            code: ConfigErrorCode::GridConfigInvalidValue,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ConfigErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = Result<T, ConfigError>;
