//! Errors surfaced by the Decision Pipeline.

use thiserror::Error;

/// Errors raised while analyzing a URL.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The governance controller is frozen; the HTTP layer maps this to 503.
    #[error("system is frozen: {reason}")]
    SystemFrozen {
        /// The recorded freeze reason.
        reason: String,
    },

    /// The submitted URL failed basic validation (length, whitespace).
    #[error("invalid url: {detail}")]
    InvalidUrl {
        /// Why validation failed.
        detail: String,
    },

    /// A governance operation failed during post-decision reporting.
    #[error("governance error during analysis: {0}")]
    Governance(#[from] phishguard_governance::error::GovernanceError),
}
