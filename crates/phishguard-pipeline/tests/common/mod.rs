//! Shared fixtures for the decision pipeline's integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use phishguard_blocklist::cache::BlocklistCache;
use phishguard_core::config::{GovernancePolicy, PipelinePolicy};
use phishguard_core::trust::TrustGate;
use phishguard_core::types::{FailureFlags, FeatureVector, HEURISTIC_FEATURE_LEN};
use phishguard_features::extractor::{ExtractorExplanations, FeatureExtractor, ValidatedUrl};
use phishguard_governance::calibration::{compute_metrics, CalibrationSample};
use phishguard_governance::controller::GovernanceController;
use phishguard_model::metadata::ModelMetadata;
use phishguard_model::model::{CalibratedModel, Prediction};
use phishguard_pipeline::cache::AnalysisCache;
use phishguard_pipeline::executor::{ExtractorFactory, Pipeline};
use phishguard_telemetry::aggregator::TelemetryAggregator;

/// A model whose predicted probability is fixed at construction, so tests
/// can drive the Decision Pipeline's threshold and penalty logic directly
/// without depending on any real scoring behaviour.
pub struct FixedProbabilityModel {
    metadata: ModelMetadata,
    p_bits: AtomicU64,
    invocations: AtomicU64,
}

impl FixedProbabilityModel {
    pub fn new(p_phishing: f64) -> Self {
        Self {
            metadata: ModelMetadata {
                model_version: "fixture-v1".to_string(),
                is_calibrated: true,
                calibration_method: Some("platt".to_string()),
                phishing_class_index: 0,
            },
            p_bits: AtomicU64::new(p_phishing.to_bits()),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn invocation_count(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalibratedModel for FixedProbabilityModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    async fn predict_proba(&self, _features: &FeatureVector) -> Prediction {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let p = f64::from_bits(self.p_bits.load(Ordering::SeqCst));
        Prediction::from_phishing_probability(p)
    }
}

/// An extractor that always reports the same, caller-supplied failure
/// flags and an all-zero heuristic vector, so tests can isolate the
/// drift-penalty contribution of signal-source failures from the model's
/// own output.
pub struct FixedFailureExtractor {
    failures: FailureFlags,
}

#[async_trait]
impl FeatureExtractor for FixedFailureExtractor {
    async fn features(&self) -> FeatureVector {
        FeatureVector::new([0i8; HEURISTIC_FEATURE_LEN], self.failures.clone())
    }

    async fn failure_flags(&self) -> FailureFlags {
        self.failures.clone()
    }

    async fn explanations(&self) -> ExtractorExplanations {
        ExtractorExplanations::default()
    }
}

pub struct FixedFailureExtractorFactory {
    pub failures: FailureFlags,
}

impl ExtractorFactory for FixedFailureExtractorFactory {
    fn build(&self, _url: ValidatedUrl) -> Box<dyn FeatureExtractor> {
        Box::new(FixedFailureExtractor {
            failures: self.failures.clone(),
        })
    }
}

/// A batch of samples a well-behaved model would produce: predictions
/// spread evenly across deciles, each decile's observed phishing rate
/// matching its average prediction. `compute_metrics` reads this as
/// [`phishguard_core::types::CalibrationStatus::Healthy`].
fn well_calibrated_samples() -> Vec<CalibrationSample> {
    (0..100)
        .map(|i| CalibrationSample {
            predicted: (i % 10) as f64 / 10.0 + 0.05,
            actual_phishing: i % 10 >= 5,
        })
        .collect()
}

/// Assemble a pipeline from a fixed-probability model and a
/// fixed-failure-flags extractor, for isolating individual steps of the
/// decision sequence. Publishes a HEALTHY calibration snapshot first, so
/// the threshold and drift-penalty arithmetic under test isn't silently
/// perturbed by the conservative adjustment governance applies while no
/// calibration snapshot has ever been published.
pub fn pipeline_with(
    dir: &std::path::Path,
    p_phishing: f64,
    failures: FailureFlags,
) -> (Pipeline, Arc<FixedProbabilityModel>) {
    let governance = Arc::new(GovernanceController::new(dir, GovernancePolicy::default()));
    governance
        .calibration_monitor()
        .publish(&compute_metrics(&well_calibrated_samples()))
        .unwrap();
    pipeline_with_governance(governance, p_phishing, failures)
}

/// Like [`pipeline_with`], but leaves the calibration monitor unpublished
/// so it reads as [`phishguard_core::types::CalibrationStatus::Unknown`],
/// for tests that specifically exercise the conservative-under-uncertainty
/// path rather than plain threshold behaviour.
pub fn pipeline_with_unpublished_calibration(
    dir: &std::path::Path,
    p_phishing: f64,
    failures: FailureFlags,
) -> (Pipeline, Arc<FixedProbabilityModel>) {
    let governance = Arc::new(GovernanceController::new(dir, GovernancePolicy::default()));
    pipeline_with_governance(governance, p_phishing, failures)
}

fn pipeline_with_governance(
    governance: Arc<GovernanceController>,
    p_phishing: f64,
    failures: FailureFlags,
) -> (Pipeline, Arc<FixedProbabilityModel>) {
    let model = Arc::new(FixedProbabilityModel::new(p_phishing));
    let pipeline = Pipeline::new(
        Arc::new(TrustGate::new()),
        Arc::new(BlocklistCache::new()),
        Arc::new(FixedFailureExtractorFactory { failures }),
        model.clone(),
        governance,
        Arc::new(AnalysisCache::default()),
        None,
        Arc::new(TelemetryAggregator::default()),
        PipelinePolicy::default(),
    );
    (pipeline, model)
}
