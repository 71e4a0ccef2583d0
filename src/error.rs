//! Error types for docker-recon.
//!
//! One error enum covers the whole pipeline: engine access, schema
//! validation, provider-file ingestion, emission, and the supervisor loop.
//! Reference-resolution problems (unknown middleware or service names,
//! untranslatable rules) are deliberately *not* errors: the emitters log
//! them and leave an explanatory comment in the generated output instead.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for docker-recon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all docker-recon operations
#[derive(Debug, Error)]
pub enum Error {
    /// The container engine binary could not be found or executed
    #[error("container engine not found: {path}")]
    EngineNotFound {
        /// Path or name that was probed
        path: String,
    },

    /// Failure talking to the container engine
    #[error("inventory error: {message}")]
    Inventory {
        /// Details about the engine failure
        message: String,
    },

    /// An engine command exited non-zero
    #[error("command failed: {command} (exit code {exit_code})")]
    CommandFailed {
        /// The command that failed
        command: String,
        /// Exit code returned by the command
        exit_code: i32,
        /// Standard error from the command
        stderr: String,
    },

    /// An engine command did not finish in time
    #[error("command timed out: {command} (timeout: {timeout:?})")]
    CommandTimeout {
        /// The command that timed out
        command: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// Model validation rejected input (strict mode only)
    #[error("schema error: {message}")]
    Schema {
        /// Details about the rejected input
        message: String,
    },

    /// A mounted provider file could not be read or parsed
    #[error("provider file error: {path}: {message}")]
    ProviderFile {
        /// Path of the offending file inside the container
        path: String,
        /// What went wrong
        message: String,
    },

    /// Subpath lookup on an aggregated tree failed
    #[error("not found: {path}: {message}")]
    NotFound {
        /// The requested pointer path
        path: String,
        /// Why resolution stopped
        message: String,
    },

    /// The proxy binary rejected a generated configuration
    #[error("proxy config test failed: {output}")]
    SupervisorTestFailure {
        /// Combined output of the failed test command
        output: String,
    },

    /// A proxy base configuration could not be parsed
    #[error("parse error in {context}: {message}")]
    Parse {
        /// What was being parsed
        context: String,
        /// Where and why parsing stopped
        message: String,
    },

    /// IO error with operation context
    #[error("io error during {operation}: {source}")]
    Io {
        /// The operation that caused the IO error
        operation: String,
        #[source]
        /// The underlying IO error
        source: std::io::Error,
    },

    /// JSON (de)serialization error with context
    #[error("json error in {context}")]
    Json {
        /// Where JSON handling failed
        context: String,
        #[source]
        /// The underlying serde_json error
        source: serde_json::Error,
    },

    /// YAML (de)serialization error with context
    #[error("yaml error in {context}")]
    Yaml {
        /// Where YAML handling failed
        context: String,
        #[source]
        /// The underlying serde_yaml error
        source: serde_yaml::Error,
    },

    /// TOML (de)serialization error with context
    #[error("toml error in {context}: {message}")]
    Toml {
        /// Where TOML handling failed
        context: String,
        /// Rendered parser/serializer message
        message: String,
    },

    /// UTF-8 conversion error with context
    #[error("utf-8 error in {context}: {source}")]
    Utf8 {
        /// Where the conversion failed
        context: String,
        #[source]
        /// The underlying conversion error
        source: std::string::FromUtf8Error,
    },
}

impl Error {
    /// Create a new engine-not-found error
    pub fn engine_not_found(path: impl Into<String>) -> Self {
        Self::EngineNotFound { path: path.into() }
    }

    /// Create a new inventory error
    pub fn inventory(message: impl Into<String>) -> Self {
        Self::Inventory {
            message: message.into(),
        }
    }

    /// Create a new command-failed error
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Create a new command-timeout error
    pub fn command_timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            timeout,
        }
    }

    /// Create a new schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a new provider-file error
    pub fn provider_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new supervisor test failure
    pub fn test_failure(output: impl Into<String>) -> Self {
        Self::SupervisorTestFailure {
            output: output.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a new IO error with context
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a new JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a new YAML error with context
    pub fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            context: context.into(),
            source,
        }
    }

    /// Create a new TOML error with context
    pub fn toml(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Toml {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a new UTF-8 error with context
    pub fn utf8(context: impl Into<String>, source: std::string::FromUtf8Error) -> Self {
        Self::Utf8 {
            context: context.into(),
            source,
        }
    }

    /// Get the error category for grouping and handling
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::EngineNotFound { .. } | Self::Inventory { .. } => "inventory",
            Self::CommandFailed { .. } | Self::CommandTimeout { .. } => "command",
            Self::Schema { .. } => "schema",
            Self::ProviderFile { .. } => "provider_file",
            Self::NotFound { .. } => "not_found",
            Self::Parse { .. } => "parse",
            Self::SupervisorTestFailure { .. } => "supervisor",
            Self::Io { .. } => "io",
            Self::Json { .. } | Self::Yaml { .. } | Self::Toml { .. } => "format",
            Self::Utf8 { .. } => "utf8",
        }
    }
}
