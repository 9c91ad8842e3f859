//! Error types for pulse-core operations.
//!
//! Observation paths (scanning, marker reads, reconciliation, ticks) never
//! surface these: they degrade to empty results. Errors only cross the API
//! for configuration loading, assertion acquisition and the focus action.

use std::path::PathBuf;

/// All errors that can occur in pulse-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Action Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Idle-sleep assertion failed: {0}")]
    AssertionFailed(String),
}

/// Convenience type alias for Results using PulseError.
pub type Result<T> = std::result::Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_carries_path_and_details() {
        let err = PulseError::ConfigMalformed {
            path: PathBuf::from("/tmp/pulse.toml"),
            details: "expected integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration file malformed: /tmp/pulse.toml: expected integer"
        );
    }

    #[test]
    fn io_error_keeps_its_source() {
        let err = PulseError::Io {
            context: "reading marker dir".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("I/O error: reading marker dir"));
    }
}
