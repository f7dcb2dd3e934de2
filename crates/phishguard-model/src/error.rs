//! Errors raised while loading a calibrated model.

use thiserror::Error;

/// Raised at load time when a model's accompanying metadata does not
/// establish that it is calibrated. This is a load-time invariant, not a
/// runtime check — the pipeline refuses to start rather than serve
/// uncalibrated probabilities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelNotCalibrated {
    /// The metadata's `is_calibrated` field was `false` or absent.
    #[error("model '{model_version}' metadata does not declare is_calibrated = true")]
    NotDeclaredCalibrated {
        /// The model version string from its metadata.
        model_version: String,
    },

    /// The metadata declared a calibration method this build does not recognise.
    #[error("model '{model_version}' declares unrecognised calibration method '{method}'")]
    UnrecognisedMethod {
        /// The model version string from its metadata.
        model_version: String,
        /// The unrecognised method name.
        method: String,
    },
}
