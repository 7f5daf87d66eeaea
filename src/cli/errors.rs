//! CLI-specific error types
//!
//! Library errors keep their own codes; the CLI adds codes only for its
//! own input handling.

use std::fmt;
use std::io;

use crate::cluster::{ClusterError, ClusterErrorCode};
use crate::config::{ConfigError, ConfigErrorCode};
use crate::query::{QueryError, QueryErrorCode};

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// stdin/stdout or data file I/O
    IoError,
    /// Data file is not a JSON object of collections
    InvalidData,
    /// Tokio runtime could not start
    RuntimeFailed,
    Config(ConfigErrorCode),
    Cluster(ClusterErrorCode),
    Query(QueryErrorCode),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::IoError => "GRID_CLI_IO_ERROR",
            Self::InvalidData => "GRID_CLI_INVALID_DATA",
            Self::RuntimeFailed => "GRID_CLI_RUNTIME_FAILED",
            Self::Config(code) => code.code(),
            Self::Cluster(code) => code.code(),
            Self::Query(code) => code.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidData, msg)
    }

    pub fn runtime_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeFailed, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(CliErrorCode::Config(e.code()), e.message())
    }
}

impl From<ClusterError> for CliError {
    fn from(e: ClusterError) -> Self {
        Self::new(CliErrorCode::Cluster(e.code()), e.message())
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        Self::new(CliErrorCode::Query(e.code()), e.message())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
