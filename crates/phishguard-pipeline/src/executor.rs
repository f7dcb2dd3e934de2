//! The Decision Pipeline (C6): `Analyze(url) -> AnalysisResult`, the
//! workspace's central orchestration point over C1–C5, C7, C10, C11, C12.

use std::sync::Arc;

use phishguard_audit::async_queue::{XaiAuditQueue, XaiRecord};
use phishguard_blocklist::cache::BlocklistCache;
use phishguard_core::config::PipelinePolicy;
use phishguard_core::domain;
use phishguard_core::trust::TrustGate;
use phishguard_core::types::{AnalysisResult, Explanation, FailureFlags, TrustInfo, Verdict};
use phishguard_features::extractor::{FeatureExtractor, ValidatedUrl};
use phishguard_features::heuristic::HeuristicExtractor;
use phishguard_governance::controller::GovernanceController;
use phishguard_model::model::CalibratedModel;
use phishguard_telemetry::aggregator::TelemetryAggregator;

use crate::cache::AnalysisCache;
use crate::drift;
use crate::error::PipelineError;

/// Builds a [`FeatureExtractor`] for a validated URL. The default,
/// [`DefaultExtractorFactory`], produces a [`HeuristicExtractor`] with
/// network probes disabled; callers wiring real HTTP/WHOIS/DNS probes
/// supply their own implementation.
pub trait ExtractorFactory: Send + Sync {
    /// Construct an extractor bound to `url`.
    fn build(&self, url: ValidatedUrl) -> Box<dyn FeatureExtractor>;
}

/// The extractor factory used when none is supplied: a [`HeuristicExtractor`]
/// with its signal probes disabled (always-fail), matching the "feature
/// extractor is an external collaborator" framing — real probes are wired
/// in by the deployment, not by this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractorFactory;

impl ExtractorFactory for DefaultExtractorFactory {
    fn build(&self, url: ValidatedUrl) -> Box<dyn FeatureExtractor> {
        Box::new(HeuristicExtractor::new(url))
    }
}

/// Everything the pipeline needs, assembled once at process init and
/// shared (via `Arc`) across concurrent request handlers. Stateless
/// itself: every [`Pipeline::analyze`] call is independent, all shared
/// state living inside the fields below.
pub struct Pipeline {
    trust_gate: Arc<TrustGate>,
    blocklist: Arc<BlocklistCache>,
    extractor_factory: Arc<dyn ExtractorFactory>,
    model: Arc<dyn CalibratedModel>,
    governance: Arc<GovernanceController>,
    cache: Arc<AnalysisCache>,
    xai_queue: Option<Arc<XaiAuditQueue>>,
    telemetry: Arc<TelemetryAggregator>,
    policy: PipelinePolicy,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        trust_gate: Arc<TrustGate>,
        blocklist: Arc<BlocklistCache>,
        extractor_factory: Arc<dyn ExtractorFactory>,
        model: Arc<dyn CalibratedModel>,
        governance: Arc<GovernanceController>,
        cache: Arc<AnalysisCache>,
        xai_queue: Option<Arc<XaiAuditQueue>>,
        telemetry: Arc<TelemetryAggregator>,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            trust_gate,
            blocklist,
            extractor_factory,
            model,
            governance,
            cache,
            xai_queue,
            telemetry,
            policy,
        }
    }

    /// The governance controller backing this pipeline, for callers
    /// needing direct access (administrative tooling, tests simulating
    /// the step 11 defence-in-depth path).
    #[must_use]
    pub fn governance(&self) -> &Arc<GovernanceController> {
        &self.governance
    }

    /// The central method. See module docs for the ordered step list.
    pub async fn analyze(&self, url: &str) -> Result<AnalysisResult, PipelineError> {
        // Step 1: freeze gate.
        if let Some(reason) = self.governance.freeze_reason()? {
            return Err(PipelineError::SystemFrozen { reason });
        }

        // Step 2: input validation.
        domain::validate_url(url).map_err(|e| PipelineError::InvalidUrl { detail: e.to_string() })?;

        // Step 3: cache lookup.
        if let Some(cached) = self.cache.get(url) {
            return Ok(cached);
        }

        // Step 4: trusted-domain gate.
        let trust_check = self.trust_gate.check(url);
        if trust_check.is_trusted {
            let result = self.build_trusted_result(url, &trust_check.matched.unwrap_or_default());
            self.governance.report_trusted_domain_verdict(
                trust_check.registered_domain.as_str(),
                result.verdict,
                result.risk_score,
            )?;
            self.finish(url, result.clone());
            return Ok(result);
        }

        // Step 5: blocklist.
        let blocklist_result = self.blocklist.check(url).await;
        if blocklist_result.is_blocked {
            let risk_score = if blocklist_result.confidence > self.policy.blocklist_confidence_cutoff {
                self.policy.blocklist_high_confidence_risk
            } else {
                self.policy.blocklist_low_confidence_risk
            };
            let mut explanation = Explanation {
                summary: "URL matched a known phishing blocklist".to_string(),
                analysis_complete: true,
                blocklist_match: Some(true),
                ..Default::default()
            };
            Explanation::push_capped(
                &mut explanation.risk,
                format!("blocklist source: {}", blocklist_result.source.unwrap_or_default()),
            );
            let result = AnalysisResult {
                verdict: Verdict::Phishing,
                risk_score,
                calibrated_probability: None,
                is_trusted_domain: false,
                trust_info: None,
                features: None,
                failure_flags: FailureFlags::default(),
                explanation,
                warnings: vec![],
                url: url.to_string(),
                ml_bypassed: true,
            };
            self.finish(url, result.clone());
            return Ok(result);
        }

        // Step 6: feature extraction.
        let validated = match ValidatedUrl::new(url) {
            Ok(v) => v,
            Err(_) => {
                let result = AnalysisResult {
                    verdict: Verdict::Suspicious,
                    risk_score: self.policy.invalid_url_risk_score,
                    calibrated_probability: None,
                    is_trusted_domain: false,
                    trust_info: None,
                    features: None,
                    failure_flags: FailureFlags::default(),
                    explanation: Explanation {
                        summary: "URL could not be safely analysed".to_string(),
                        analysis_complete: false,
                        ..Default::default()
                    },
                    warnings: vec![],
                    url: url.to_string(),
                    ml_bypassed: true,
                };
                // Not cached at full TTL: an unanalyzable URL may become
                // analyzable on retry (e.g. a transient SSRF-guard false positive).
                return Ok(result);
            }
        };

        let extractor = self.extractor_factory.build(validated);
        let features = extractor.features().await;
        let failure_flags = extractor.failure_flags().await;
        let extractor_explanations = extractor.explanations().await;

        // Step 7: model inference.
        let prediction = self.model.predict_proba(&features).await;

        // Step 8: threshold mapping.
        let mut verdict = if prediction.p_phishing >= self.policy.phishing_threshold {
            Verdict::Phishing
        } else if prediction.p_phishing >= self.policy.suspicious_threshold {
            Verdict::Suspicious
        } else {
            Verdict::Safe
        };
        let mut risk_score = prediction.p_phishing * 100.0;
        let mut warnings = Vec::new();

        // Step 9: drift-aware penalty.
        let calibration_status = self.governance.calibration_status();
        let adjustment = phishguard_governance::calibration::policy_adjustment(calibration_status);
        let penalty = drift::accumulate(&self.policy, &failure_flags, adjustment);
        let (adjusted_verdict, adjusted_score, warning) = drift::apply(&self.policy, verdict, risk_score, penalty);
        verdict = adjusted_verdict;
        risk_score = adjusted_score;
        if let Some(w) = warning {
            warnings.push(w);
        }
        if penalty.surface_uncertainty_warning {
            warnings.push("calibration status is UNKNOWN; treating result conservatively".to_string());
        }

        // Step 10: explanation build.
        let mut explanation = Explanation {
            analysis_complete: !failure_flags.any_failed(),
            ..Default::default()
        };
        explanation.summary = format!("classified {verdict} with p_phishing={:.3}", prediction.p_phishing);
        for s in extractor_explanations.safe_signals.iter().take(5) {
            Explanation::push_capped(&mut explanation.positive, s.name.clone());
        }
        for s in extractor_explanations.phishing_signals.iter().take(5) {
            Explanation::push_capped(&mut explanation.risk, s.name.clone());
        }
        for s in extractor_explanations.failed_features.iter().take(5) {
            Explanation::push_capped(&mut explanation.inconclusive, s.name.clone());
        }

        let result = AnalysisResult {
            verdict,
            risk_score,
            calibrated_probability: Some(prediction.p_phishing),
            is_trusted_domain: false,
            trust_info: None,
            features: Some(features),
            failure_flags,
            explanation,
            warnings,
            url: url.to_string(),
            ml_bypassed: false,
        };

        // Step 11: invariant report (defence-in-depth; this path did not
        // take the trust fast-path, so is_trusted_domain is false here,
        // but report unconditionally in case the gate and this check
        // ever disagree).
        if trust_check.is_trusted {
            self.governance
                .report_trusted_domain_verdict(trust_check.registered_domain.as_str(), result.verdict, result.risk_score)?;
        }

        // Step 12: cache insert.
        self.finish(url, result.clone());
        Ok(result)
    }

    fn build_trusted_result(&self, url: &str, matched: &str) -> AnalysisResult {
        AnalysisResult {
            verdict: Verdict::Safe,
            risk_score: self.policy.trusted_risk_score.min(30.0),
            calibrated_probability: None,
            is_trusted_domain: true,
            trust_info: Some(TrustInfo {
                matched: matched.to_string(),
                reason: "registered domain is on the trust allowlist".to_string(),
            }),
            features: None,
            failure_flags: FailureFlags::default(),
            explanation: Explanation {
                summary: "domain is explicitly trusted".to_string(),
                analysis_complete: true,
                allowlist_override: true,
                ..Default::default()
            },
            warnings: vec![],
            url: url.to_string(),
            ml_bypassed: true,
        }
    }

    fn finish(&self, url: &str, result: AnalysisResult) {
        self.telemetry.record(
            result.verdict,
            self.governance.calibration_status(),
            result.explanation.analysis_complete,
            result.explanation.allowlist_override,
            &top_signal_names(&result),
        );

        if let Some(queue) = &self.xai_queue {
            queue.enqueue(XaiRecord {
                timestamp: chrono::Utc::now().to_rfc3339(),
                url: url.to_string(),
                verdict: result.verdict.to_string(),
                top_signals: top_signal_names(&result),
            });
        }

        self.cache.insert(url, result);
    }
}

fn top_signal_names(result: &AnalysisResult) -> Vec<String> {
    result.explanation.risk.iter().chain(result.explanation.positive.iter()).take(3).cloned().collect()
}
