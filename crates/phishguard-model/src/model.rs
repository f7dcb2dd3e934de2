//! Calibrated Model interface (C5) and a deterministic reference
//! implementation used for tests and as a local fallback.

use async_trait::async_trait;
use phishguard_core::types::FeatureVector;

use crate::error::ModelNotCalibrated;
use crate::metadata::ModelMetadata;

/// A calibrated phishing probability, always summing to 1 with its
/// complement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Probability the URL is phishing.
    pub p_phishing: f64,
    /// Probability the URL is legitimate; `1.0 - p_phishing`.
    pub p_legit: f64,
}

impl Prediction {
    /// Construct a prediction from a raw phishing probability.
    #[must_use]
    pub fn from_phishing_probability(p_phishing: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&p_phishing), "probability out of range: {p_phishing}");
        Self {
            p_phishing,
            p_legit: 1.0 - p_phishing,
        }
    }
}

/// The contract the Decision Pipeline relies on for model inference.
#[async_trait]
pub trait CalibratedModel: Send + Sync {
    /// This model's metadata, already validated at construction time.
    fn metadata(&self) -> &ModelMetadata;

    /// Map a 33-length feature vector to a calibrated phishing probability.
    async fn predict_proba(&self, features: &FeatureVector) -> Prediction;
}

/// A deterministic, rule-based reference model: maps the count of
/// phishing-leaning (`1`) minus safe-leaning (`-1`) heuristic features
/// onto a fixed probability curve. Useful for integration tests and as a
/// functioning local default before a trained model is wired in.
pub struct DeterministicReferenceModel {
    metadata: ModelMetadata,
}

impl DeterministicReferenceModel {
    /// Construct the reference model, validating its (self-declared,
    /// always-calibrated) metadata.
    pub fn new() -> Result<Self, ModelNotCalibrated> {
        let metadata = ModelMetadata {
            model_version: "deterministic-reference-v1".to_string(),
            is_calibrated: true,
            calibration_method: Some("isotonic".to_string()),
            phishing_class_index: 0,
        };
        metadata.validate()?;
        Ok(Self { metadata })
    }
}

impl Default for DeterministicReferenceModel {
    fn default() -> Self {
        Self::new().expect("reference model metadata is always valid")
    }
}

#[async_trait]
impl CalibratedModel for DeterministicReferenceModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    async fn predict_proba(&self, features: &FeatureVector) -> Prediction {
        let score: i32 = features.heuristics().iter().map(|&v| i32::from(v)).sum();
        let normalized = (f64::from(score) + 30.0) / 60.0;
        Prediction::from_phishing_probability(normalized.clamp(0.0, 1.0))
    }
}
