//! Model metadata consulted at load time to enforce the calibration
//! invariant.

use serde::{Deserialize, Serialize};

use crate::error::ModelNotCalibrated;

/// Calibration methods this build recognises. An unrecognised method in
/// the metadata is treated the same as an uncalibrated model: startup
/// fails rather than silently trusting an unknown calibration claim.
pub const RECOGNISED_METHODS: &[&str] = &["platt", "isotonic", "beta"];

/// Metadata accompanying a trained model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Version string identifying this model artifact.
    pub model_version: String,
    /// Whether the training pipeline calibrated this model's output.
    pub is_calibrated: bool,
    /// Which calibration method was applied, if any.
    pub calibration_method: Option<String>,
    /// Index of the phishing class within the model's declared class ordering.
    pub phishing_class_index: usize,
}

impl ModelMetadata {
    /// Validate the calibration invariant; call this once at load time.
    pub fn validate(&self) -> Result<(), ModelNotCalibrated> {
        if !self.is_calibrated {
            return Err(ModelNotCalibrated::NotDeclaredCalibrated {
                model_version: self.model_version.clone(),
            });
        }
        match &self.calibration_method {
            Some(method) if RECOGNISED_METHODS.contains(&method.as_str()) => Ok(()),
            Some(method) => Err(ModelNotCalibrated::UnrecognisedMethod {
                model_version: self.model_version.clone(),
                method: method.clone(),
            }),
            None => Err(ModelNotCalibrated::UnrecognisedMethod {
                model_version: self.model_version.clone(),
                method: "<none>".to_string(),
            }),
        }
    }
}
