//! Errors raised by the governance controller and its adapters.

use thiserror::Error;

use phishguard_audit::error::AuditError;

/// Errors raised by governance operations.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The system is frozen; the requested mutation is refused.
    #[error("governance mutation refused: system is frozen ({reason})")]
    SystemFrozen {
        /// The recorded freeze reason.
        reason: String,
    },

    /// A safety budget counter reached its limit as a result of this operation.
    #[error("safety budget exhausted: {counter} limit reached ({detail})")]
    BudgetExhausted {
        /// Which counter was exhausted.
        counter: String,
        /// Additional detail.
        detail: String,
    },

    /// A non-negotiable safety invariant was violated; the system has
    /// been frozen as a side effect of raising this error.
    #[error("invariant violated: {invariant} ({detail})")]
    InvariantViolation {
        /// Name of the violated invariant.
        invariant: String,
        /// Additional detail.
        detail: String,
    },

    /// `resume_from_freeze` preconditions were not met.
    #[error("resume from freeze rejected: {reason}")]
    InvalidResume {
        /// Why the resume was rejected.
        reason: String,
    },

    /// An override request did not satisfy the authority matrix.
    #[error("override request rejected: {reason}")]
    InvalidOverrideRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// A governance action was attempted while calibration health forbids it.
    #[error("calibration status {status:?} forbids action '{action}'")]
    CalibrationViolation {
        /// Current calibration status.
        status: String,
        /// The forbidden action.
        action: String,
    },

    /// Exclusive file lock acquisition exceeded the configured timeout.
    #[error("timed out acquiring governance state lock at {path}")]
    LockTimeout {
        /// Path whose lock could not be acquired.
        path: String,
    },

    /// Failed to read, parse, or write the governance state file.
    #[error("governance state I/O failure at {path}: {source}")]
    StateIo {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The state file existed but could not be parsed as valid JSON. Per
    /// §7, the controller loads best-effort empty state and enters FROZEN
    /// rather than serving on unreadable state.
    #[error("governance state at {path} is corrupted: {detail}")]
    StateCorrupted {
        /// Path that failed to parse.
        path: String,
        /// Parse error detail.
        detail: String,
    },

    /// A governance-critical audit write failed; the mutation it would
    /// have recorded does not proceed.
    #[error("governance-critical audit write failed: {0}")]
    AuditWriteFailed(#[from] AuditError),
}
