//! Errors raised while validating a URL for feature extraction.

use thiserror::Error;

/// Raised by [`crate::extractor::validate`] when a URL is unfit for
/// feature extraction — including the SSRF guard.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidUrlError {
    /// Scheme was not `http` or `https`.
    #[error("unsupported scheme '{scheme}': only http and https are allowed")]
    UnsupportedScheme {
        /// The offending scheme.
        scheme: String,
    },

    /// No hostname could be isolated from the URL.
    #[error("url has no hostname")]
    EmptyHostname,

    /// The hostname resolves (as a literal) into a private, loopback, or
    /// link-local range — refused to prevent the extractor from probing
    /// internal infrastructure.
    #[error("hostname '{host}' resolves into a disallowed SSRF range")]
    SsrfBlocked {
        /// The offending host/IP literal.
        host: String,
    },
}
