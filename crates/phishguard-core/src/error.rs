//! Error types shared by the core data model, the registered-domain parser,
//! and the trusted-domain gate.

use thiserror::Error;

/// Errors that can occur while validating or normalising a URL.
#[derive(Debug, Error)]
pub enum UrlError {
    /// The raw URL string was outside the \[4, 2000\] length bound.
    #[error("url length {len} outside allowed bounds [4, 2000]")]
    BadLength {
        /// The offending length.
        len: usize,
    },

    /// The URL contained internal whitespace.
    #[error("url contains internal whitespace")]
    ContainsWhitespace,

    /// The URL has no parseable host component.
    #[error("url has no parseable host: {raw}")]
    NoHost {
        /// The raw input that failed to parse.
        raw: String,
    },
}

/// Errors raised while mutating the trusted-domain allowlist (C2).
#[derive(Debug, Error)]
pub enum TrustGateError {
    /// The governance controller has the system frozen; mutation refused.
    #[error("trust gate mutation refused: system is frozen ({reason})")]
    SystemFrozen {
        /// Freeze reason reported by the governance controller.
        reason: String,
    },

    /// Calibration health forbids allowlist expansion right now.
    #[error("allowlist expansion refused: {reason}")]
    CalibrationForbidden {
        /// Reason reported by the calibration gate.
        reason: String,
    },

    /// The manifest's declared version did not match the regression
    /// snapshot's `_manifest_version`.
    #[error("trusted-domain manifest version mismatch: manifest={manifest}, snapshot={snapshot}")]
    ManifestVersionMismatch {
        /// Version recorded in `trusted_domains_manifest.json`.
        manifest: String,
        /// Version recorded in the regression snapshot.
        snapshot: String,
    },

    /// Failed to read or parse the manifest file.
    #[error("failed to load trust manifest at {path}: {source}")]
    ManifestLoad {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O or parse error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
