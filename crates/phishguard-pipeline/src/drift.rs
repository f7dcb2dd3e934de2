//! Drift-aware penalty (C6 step 9): per-failure confidence penalties plus
//! the Calibration Monitor's policy adjustment, applied as a single
//! downgrade-only correction to the model's verdict.

use phishguard_core::config::PipelinePolicy;
use phishguard_core::types::{FailureFlags, Verdict};
use phishguard_governance::calibration::PolicyAdjustment;

/// The accumulated penalty and the warnings/restrictions it carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftPenalty {
    /// Sum of per-failure weights plus the calibration monitor's penalty.
    /// Two independent signals — data-quality and model-health — summed,
    /// not double-applied as one another.
    pub total: f64,
    /// `true` if calibration status independently caps PHISHING at SUSPICIOUS.
    pub restrict_phishing_to_suspicious: bool,
    /// `true` if an uncertainty warning should be attached regardless of outcome.
    pub surface_uncertainty_warning: bool,
}

/// Accumulate the fixed per-signal-failure penalties with the calibration
/// monitor's policy adjustment.
#[must_use]
pub fn accumulate(policy: &PipelinePolicy, failures: &FailureFlags, adjustment: PolicyAdjustment) -> DriftPenalty {
    let mut total = 0.0;
    if failures.http_failed {
        total += policy.http_failure_penalty;
    }
    if failures.whois_failed {
        total += policy.whois_failure_penalty;
    }
    if failures.dns_failed {
        total += policy.dns_failure_penalty;
    }
    total += adjustment.confidence_penalty;

    DriftPenalty {
        total,
        restrict_phishing_to_suspicious: adjustment.restrict_phishing_to_suspicious,
        surface_uncertainty_warning: adjustment.surface_uncertainty_warning,
    }
}

/// Apply the penalty to a `(verdict, risk_score)` pair. Downgrade-only:
/// SAFE and SUSPICIOUS are never upgraded, and a PHISHING verdict is only
/// ever pulled down to SUSPICIOUS, never to SAFE. Returns the possibly
/// adjusted verdict, risk score, and an optional warning to append.
#[must_use]
pub fn apply(
    policy: &PipelinePolicy,
    verdict: Verdict,
    risk_score: f64,
    penalty: DriftPenalty,
) -> (Verdict, f64, Option<String>) {
    if verdict != Verdict::Phishing {
        return (verdict, risk_score, None);
    }

    if penalty.restrict_phishing_to_suspicious {
        return (
            Verdict::Suspicious,
            risk_score,
            Some("calibration status restricts PHISHING to SUSPICIOUS".to_string()),
        );
    }

    if penalty.total <= 0.0 {
        return (verdict, risk_score, None);
    }

    let adjusted_score = risk_score * (1.0 - penalty.total);
    let adjusted_probability = adjusted_score / 100.0;

    if adjusted_probability < policy.phishing_threshold {
        (
            Verdict::Suspicious,
            adjusted_score,
            Some(format!(
                "confidence penalty {penalty:.3} downgraded PHISHING to SUSPICIOUS",
                penalty = penalty.total
            )),
        )
    } else {
        (Verdict::Phishing, adjusted_score, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(penalty: f64, restrict: bool) -> PolicyAdjustment {
        PolicyAdjustment {
            confidence_penalty: penalty,
            restrict_phishing_to_suspicious: restrict,
            surface_uncertainty_warning: false,
        }
    }

    #[test]
    fn no_failures_no_calibration_penalty_is_zero() {
        let policy = PipelinePolicy::default();
        let penalty = accumulate(&policy, &FailureFlags::default(), adjustment(0.0, false));
        assert_eq!(penalty.total, 0.0);
    }

    #[test]
    fn failures_and_calibration_penalty_are_additive() {
        let policy = PipelinePolicy::default();
        let failures = FailureFlags {
            http_failed: true,
            dns_failed: true,
            ..Default::default()
        };
        let penalty = accumulate(&policy, &failures, adjustment(0.10, false));
        let expected = policy.http_failure_penalty + policy.dns_failure_penalty + 0.10;
        assert!((penalty.total - expected).abs() < 1e-9);
    }

    #[test]
    fn penalty_never_upgrades_safe_or_suspicious() {
        let policy = PipelinePolicy::default();
        let penalty = DriftPenalty { total: 0.5, ..Default::default() };
        let (v, _, w) = apply(&policy, Verdict::Safe, 5.0, penalty);
        assert_eq!(v, Verdict::Safe);
        assert!(w.is_none());
    }

    #[test]
    fn large_penalty_downgrades_phishing_to_suspicious() {
        let policy = PipelinePolicy::default();
        let penalty = DriftPenalty { total: 0.5, ..Default::default() };
        let (v, score, w) = apply(&policy, Verdict::Phishing, 90.0, penalty);
        assert_eq!(v, Verdict::Suspicious);
        assert!(score < 90.0);
        assert!(w.is_some());
    }

    #[test]
    fn small_penalty_leaves_phishing_intact() {
        let policy = PipelinePolicy::default();
        let penalty = DriftPenalty { total: 0.01, ..Default::default() };
        let (v, _, w) = apply(&policy, Verdict::Phishing, 99.0, penalty);
        assert_eq!(v, Verdict::Phishing);
        assert!(w.is_none());
    }

    #[test]
    fn degraded_calibration_restricts_regardless_of_penalty_size() {
        let policy = PipelinePolicy::default();
        let penalty = accumulate(&policy, &FailureFlags::default(), adjustment(0.20, true));
        let (v, _, w) = apply(&policy, Verdict::Phishing, 99.0, penalty);
        assert_eq!(v, Verdict::Suspicious);
        assert!(w.is_some());
    }
}
