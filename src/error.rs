//! Error types for configd.
//!
//! This module defines the library-wide error type. Every public operation
//! either returns a success payload or one of these variants, each carrying a
//! machine-readable kind (see [`Error::kind`]) and a human-readable message.
//!
//! Validation findings are deliberately *not* errors — they are collected into
//! a `Vec<ValidationError>` and handed to the caller, who decides whether to
//! block a commit.

use thiserror::Error;

/// Result type alias for configd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for configd.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Apply Errors
    // ========================================================================
    /// A command was rejected by the managed device.
    #[error("Command '{command}' rejected by device: {message}")]
    Apply {
        /// The offending command line
        command: String,
        /// Device-reported reason
        message: String,
    },

    /// A multi-line apply (restore/import) aborted; the in-progress
    /// transaction was discarded and prior committed state is intact.
    #[error("Transaction aborted at line '{line}': {message}")]
    TransactionAborted {
        /// The line that failed to apply
        line: String,
        /// Device-reported reason
        message: String,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Durable storage failed a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A snapshot or version id was not present in the index.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Record kind ("snapshot" or "version")
        kind: &'static str,
        /// The missing id
        id: String,
    },

    // ========================================================================
    // Connectivity Errors
    // ========================================================================
    /// The executor could not reach the device after exhausting retries.
    #[error("Device unavailable after {attempts} attempts: {message}")]
    Unavailable {
        /// Number of attempts made
        attempts: u32,
        /// Last transport error
        message: String,
    },

    // ========================================================================
    // Serialization / IO Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error (engine configuration file).
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Engine configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new apply error.
    pub fn apply(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Apply {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a new storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a snapshot not-found error.
    pub fn snapshot_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "snapshot",
            id: id.into(),
        }
    }

    /// Creates a version not-found error.
    pub fn version_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "version",
            id: id.into(),
        }
    }

    /// Returns the machine-readable error kind.
    ///
    /// Callers use this to distinguish "your input was bad" from "the device
    /// could not be reached" without matching on variants.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Apply { .. } | Error::TransactionAborted { .. } => "apply",
            Error::Storage(_) => "storage",
            Error::NotFound { .. } => "not_found",
            Error::Unavailable { .. } => "unavailable",
            Error::Json(_) | Error::Yaml(_) | Error::TomlParse(_) => "serialization",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }

    /// Returns true if retrying the operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::apply("set x", "bad").kind(), "apply");
        assert_eq!(Error::storage("disk full").kind(), "storage");
        assert_eq!(Error::snapshot_not_found("abc").kind(), "not_found");
        let unavailable = Error::Unavailable {
            attempts: 3,
            message: "timeout".into(),
        };
        assert_eq!(unavailable.kind(), "unavailable");
        assert!(unavailable.is_recoverable());
        assert!(!Error::storage("x").is_recoverable());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::version_not_found("v-123");
        assert_eq!(err.to_string(), "version 'v-123' not found");
    }
}
