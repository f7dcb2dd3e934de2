//! Errors raised by the audit subsystem.

use thiserror::Error;

/// Raised by the synchronous writer. Failure here is surfaced to the
/// caller — for governance-critical events, the caller (the governance
/// controller) does not proceed when this is returned.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Could not open or lock the audit file.
    #[error("failed to open audit file at {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Lock acquisition exceeded the configured timeout.
    #[error("timed out acquiring exclusive lock on audit file at {path}")]
    LockTimeout {
        /// Path whose lock could not be acquired.
        path: String,
    },

    /// The write or fsync itself failed.
    #[error("failed to write audit entry to {path}: {source}")]
    Write {
        /// Path that failed to write.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
