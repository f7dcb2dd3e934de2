//! Errors raised by the blocklist cache.

use thiserror::Error;

/// Errors raised while refreshing a blocklist source.
#[derive(Debug, Error)]
pub enum BlocklistError {
    /// A source's fetch timed out or failed; its previous contribution is
    /// dropped from the next snapshot but the overall refresh still
    /// succeeds.
    #[error("source '{source_name}' failed to refresh: {detail}")]
    SourceFailed {
        /// Name of the failing source.
        source_name: String,
        /// Failure detail.
        detail: String,
    },

    /// Every configured source failed in the same refresh cycle.
    #[error("all {count} blocklist sources failed to refresh")]
    AllSourcesFailed {
        /// Number of sources attempted.
        count: usize,
    },
}
