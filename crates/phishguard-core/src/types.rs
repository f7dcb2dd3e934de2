//! Core data model shared across the workspace: feature vectors, verdicts,
//! analysis results, overrides, canary signals, budgets, freeze state, and
//! audit entries (spec §3).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed-length categorical feature vector produced by the feature
/// extractor. Positions 0–29 carry heuristic signal in `{-1, 0, 1}`;
/// positions 30–32 are the HTTP/WHOIS/DNS failure indicators in `{0, 1}`.
pub const FEATURE_VECTOR_LEN: usize = 33;
/// Number of heuristic feature positions preceding the failure indicators.
pub const HEURISTIC_FEATURE_LEN: usize = 30;

/// A 33-length categorical feature vector.
///
/// Invariant (enforced on construction in debug builds, documented as a
/// caller contract in release): a failure indicator at position `k` in
/// `{30..33}` implies every heuristic feature this extractor gates on that
/// signal is `0`, never `-1`. "Missing data never increases severity."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [i8; FEATURE_VECTOR_LEN]);

impl FeatureVector {
    /// Build a feature vector from heuristic values and failure flags.
    ///
    /// `heuristics` must have exactly [`HEURISTIC_FEATURE_LEN`] entries,
    /// each in `{-1, 0, 1}`.
    #[must_use]
    pub fn new(heuristics: [i8; HEURISTIC_FEATURE_LEN], failures: FailureFlags) -> Self {
        let mut values = [0i8; FEATURE_VECTOR_LEN];
        values[..HEURISTIC_FEATURE_LEN].copy_from_slice(&heuristics);
        values[30] = i8::from(failures.http_failed);
        values[31] = i8::from(failures.whois_failed);
        values[32] = i8::from(failures.dns_failed);
        for v in &values[..HEURISTIC_FEATURE_LEN] {
            debug_assert!((-1..=1).contains(v), "heuristic feature out of range: {v}");
        }
        Self(values)
    }

    /// The 30 heuristic positions.
    #[must_use]
    pub fn heuristics(&self) -> &[i8] {
        &self.0[..HEURISTIC_FEATURE_LEN]
    }

    /// The three trailing failure-indicator positions.
    #[must_use]
    pub fn failure_bits(&self) -> [i8; 3] {
        [self.0[30], self.0[31], self.0[32]]
    }

    /// Raw slice for feeding a model.
    #[must_use]
    pub fn as_slice(&self) -> &[i8] {
        &self.0
    }
}

/// Per-signal-source failure indicators, with optional diagnostic text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureFlags {
    /// HTTP fetch failed (timeout, connection error, non-2xx treated as failure upstream).
    pub http_failed: bool,
    /// HTTP failure detail, if any.
    pub http_error: Option<String>,
    /// WHOIS lookup failed.
    pub whois_failed: bool,
    /// WHOIS failure detail, if any.
    pub whois_error: Option<String>,
    /// DNS resolution failed.
    pub dns_failed: bool,
    /// DNS failure detail, if any.
    pub dns_error: Option<String>,
}

impl FailureFlags {
    /// `true` if any of the three signal sources failed.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.http_failed || self.whois_failed || self.dns_failed
    }
}

/// Tri-state classification outcome. No boolean alias exists for this type
/// deliberately — callers must match all three arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum Verdict {
    /// No phishing signal found; ordering value 0 — lowest severity.
    Safe,
    /// Ambiguous or partially-failed analysis; ordering value 1.
    Suspicious,
    /// Confident phishing classification; ordering value 2 — highest severity.
    Phishing,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Safe => "SAFE",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::Phishing => "PHISHING",
        };
        write!(f, "{s}")
    }
}

/// Human-readable explanation accompanying an [`AnalysisResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Explanation {
    /// One-sentence summary.
    pub summary: String,
    /// Up to 5 safe-leaning signals.
    pub positive: Vec<String>,
    /// Up to 5 risk-leaning signals.
    pub risk: Vec<String>,
    /// Signals that could not be evaluated due to an upstream failure.
    pub inconclusive: Vec<String>,
    /// `false` if any upstream signal source failed.
    pub analysis_complete: bool,
    /// `true` if this result bypassed the model via the trust or override path.
    pub allowlist_override: bool,
    /// `true` if a blocklist match produced this result.
    pub blocklist_match: Option<bool>,
}

impl Explanation {
    /// Cap a signal list at 5 entries, as the explanation contract requires.
    pub fn push_capped(list: &mut Vec<String>, item: impl Into<String>) {
        if list.len() < 5 {
            list.push(item.into());
        }
    }
}

/// Optional detail attached when a result was produced via the trust gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustInfo {
    /// The registered domain or bare suffix that matched.
    pub matched: String,
    /// Human-readable reason the gate matched.
    pub reason: String,
}

/// The complete, immutable result of analyzing one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Final classification.
    pub verdict: Verdict,
    /// Risk score on a 0–100 scale.
    pub risk_score: f64,
    /// Calibrated phishing probability in \[0, 1\], if the model ran.
    pub calibrated_probability: Option<f64>,
    /// Whether the registered domain (or suffix) was on the trust allowlist.
    pub is_trusted_domain: bool,
    /// Detail about the trust match, if any.
    pub trust_info: Option<TrustInfo>,
    /// Feature vector used for model inference, if the model ran.
    pub features: Option<FeatureVector>,
    /// Failure flags observed during feature extraction.
    pub failure_flags: FailureFlags,
    /// Human-facing explanation.
    pub explanation: Explanation,
    /// Any non-fatal warnings (e.g. drift downgrade notice).
    pub warnings: Vec<String>,
    /// The original input URL.
    pub url: String,
    /// `true` if the model was never invoked (trust or blocklist fast path).
    pub ml_bypassed: bool,
}

impl AnalysisResult {
    /// `true` if this result satisfies the explanation contract: a trusted
    /// or override-bypassed result carries no risk signals and is SAFE.
    #[must_use]
    pub fn satisfies_trust_contract(&self) -> bool {
        if self.is_trusted_domain || self.explanation.allowlist_override {
            self.explanation.risk.is_empty() && self.verdict == Verdict::Safe
        } else {
            true
        }
    }
}

/// The kind of governance override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum OverrideType {
    /// Never expires; requires a review ticket.
    Permanent,
    /// Short-lived, up to 24 hours.
    Emergency,
    /// Very short-lived, up to 1 hour, CI-only.
    Testing,
}

/// Who is permitted to request a given [`OverrideType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum Authority {
    /// Human security team member.
    SecurityTeam,
    /// On-call engineer.
    OnCall,
    /// Automated CI system.
    CiSystem,
}

/// A governance override record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Override {
    /// Unique identifier.
    pub id: Uuid,
    /// Override kind.
    pub override_type: OverrideType,
    /// Who is acting.
    pub authority: Authority,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiration, if any (PERMANENT overrides never expire).
    pub expires_at: Option<DateTime<Utc>>,
    /// Domains this override covers.
    pub affected_domains: Vec<String>,
    /// Human-readable justification.
    pub reason: String,
    /// Name or identifier of the approver.
    pub approved_by: String,
    /// Tracking ticket, required for PERMANENT.
    pub review_ticket: Option<String>,
    /// Whether this override is currently in effect.
    pub is_active: bool,
}

impl Override {
    /// `true` if this override has passed its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Per-domain canary evaluation counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanarySignal {
    /// Total evaluation runs.
    pub test_runs: u64,
    /// Runs that passed (SAFE or SUSPICIOUS verdict).
    pub passes: u64,
    /// Runs that failed (PHISHING verdict).
    pub failures: u64,
    /// Cumulative traffic sample size observed.
    pub sample_size: u64,
    /// Current consecutive-pass streak.
    pub consecutive_passes: u64,
    /// Timestamp of the last recorded run.
    pub last_run: Option<DateTime<Utc>>,
    /// Verdict of the last recorded run.
    pub last_verdict: Option<Verdict>,
}

/// Eligibility determination for promoting a canary domain to full trust.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eligibility {
    /// Whether all promotion criteria are currently satisfied.
    pub eligible: bool,
    /// Always `true`: promotion always requires an explicit approval step.
    pub requires_approval: bool,
    /// Metadata fields the approval flow must supply.
    pub required_metadata: Vec<&'static str>,
    /// Human-readable reasons the domain is or is not eligible.
    pub reasons: Vec<String>,
}

/// Monotonic safety-budget counters, reset only by explicit admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyBudgetState {
    /// Start of the current hourly override-rate window.
    pub window_start: DateTime<Utc>,
    /// Overrides granted within the current hourly window.
    pub override_count_hourly: u64,
    /// SUSPICIOUS verdicts observed on a trusted domain (zero tolerance).
    pub suspicious_trusted_count: u64,
    /// PHISHING verdicts observed on a trusted domain — invariant: always 0.
    pub phishing_trusted_count: u64,
    /// Canary failures observed in the current budget window.
    pub canary_failures: u64,
    /// Whether the system is currently frozen.
    pub is_frozen: bool,
    /// Reason for the current freeze, if any.
    pub freeze_reason: Option<String>,
}

impl Default for SafetyBudgetState {
    fn default() -> Self {
        Self {
            window_start: Utc::now(),
            override_count_hourly: 0,
            suspicious_trusted_count: 0,
            phishing_trusted_count: 0,
            canary_failures: 0,
            is_frozen: false,
            freeze_reason: None,
        }
    }
}

/// Persisted freeze/resume lifecycle, independent of the budget counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreezeState {
    /// Whether the system is currently frozen.
    pub is_frozen: bool,
    /// When the current freeze began.
    pub frozen_at: Option<DateTime<Utc>>,
    /// Who or what triggered the current freeze.
    pub frozen_by: Option<String>,
    /// Why the system froze.
    pub freeze_reason: Option<String>,
    /// When the most recent resume happened.
    pub resumed_at: Option<DateTime<Utc>>,
    /// Who performed the most recent resume.
    pub resumed_by: Option<String>,
    /// Incident tracking ID for the current or most recent freeze.
    pub incident_id: Option<String>,
    /// Incident ID supplied at resume time.
    pub resume_incident_id: Option<String>,
    /// Justification supplied at resume time.
    pub resume_justification: Option<String>,
}

/// Trust level recorded for a domain in the allowlist manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TrustLevel {
    /// Fully trusted, no revalidation pressure beyond the standard window.
    Full,
    /// Provisionally trusted, under canary evaluation.
    Probation,
}

/// One allowlist entry's provenance and revalidation schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainTrustRecord {
    /// The registered domain or bare suffix.
    pub domain: String,
    /// When this record was first added.
    pub added_date: DateTime<Utc>,
    /// When this record was last reviewed.
    pub last_reviewed_date: DateTime<Utc>,
    /// Who last reviewed it.
    pub reviewed_by: String,
    /// Current trust level.
    pub trust_level: TrustLevel,
    /// Deadline by which this record must be revalidated (365 days from review).
    pub revalidation_required_by: DateTime<Utc>,
}

/// Deployment environment tag, recorded on every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum Environment {
    /// Continuous integration.
    Ci,
    /// Local development.
    Local,
    /// Production deployment.
    Prod,
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// Deployment environment.
    pub environment: Environment,
    /// Event type tag (e.g. `ALLOWLIST_MODIFICATION`).
    pub event_type: String,
    /// The value of the override/feature flag at the time, if relevant.
    pub override_flag_value: Option<bool>,
    /// Domains this event concerned.
    pub affected_domains: Vec<String>,
    /// Contextual description of what triggered this event.
    pub triggering_context: String,
    /// Human-readable reason.
    pub reason: String,
    /// Free-form structured detail.
    pub additional_data: serde_json::Value,
}

/// Calibration health status produced offline by the Calibration Monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum CalibrationStatus {
    /// Model is well-calibrated; no penalty applied.
    Healthy,
    /// Model shows calibration drift; penalty applied and PHISHING restricted.
    Degraded,
    /// No calibration snapshot available; treated conservatively.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_ordering_is_severity() {
        assert!(Verdict::Safe < Verdict::Suspicious);
        assert!(Verdict::Suspicious < Verdict::Phishing);
    }

    #[test]
    fn feature_vector_packs_failure_bits_at_tail() {
        let failures = FailureFlags {
            http_failed: true,
            dns_failed: true,
            ..Default::default()
        };
        let fv = FeatureVector::new([0; HEURISTIC_FEATURE_LEN], failures);
        assert_eq!(fv.failure_bits(), [1, 0, 1]);
    }

    #[test]
    fn trust_contract_requires_empty_risk_and_safe_verdict() {
        let mut result = AnalysisResult {
            verdict: Verdict::Safe,
            risk_score: 10.0,
            calibrated_probability: None,
            is_trusted_domain: true,
            trust_info: None,
            features: None,
            failure_flags: FailureFlags::default(),
            explanation: Explanation {
                allowlist_override: true,
                analysis_complete: true,
                ..Default::default()
            },
            warnings: vec![],
            url: "https://accounts.google.com".to_string(),
            ml_bypassed: true,
        };
        assert!(result.satisfies_trust_contract());

        result.explanation.risk.push("should not be here".to_string());
        assert!(!result.satisfies_trust_contract());
    }

    #[test]
    fn override_expiry_uses_inclusive_boundary() {
        let now = Utc::now();
        let o = Override {
            id: Uuid::new_v4(),
            override_type: OverrideType::Emergency,
            authority: Authority::OnCall,
            created_at: now,
            expires_at: Some(now),
            affected_domains: vec![],
            reason: "test".to_string(),
            approved_by: "tester".to_string(),
            review_ticket: None,
            is_active: true,
        };
        assert!(o.is_expired(now));
    }
}
