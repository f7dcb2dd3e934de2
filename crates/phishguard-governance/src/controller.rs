//! The single governance entry point, constructed once at process init
//! and injected everywhere governance decisions are needed — never a
//! mutable global.

use std::path::PathBuf;

use phishguard_core::config::GovernancePolicy;
use phishguard_core::trust::{CalibrationGate, FreezeQuery, TrustGate};
use phishguard_core::types::{CalibrationStatus, Eligibility, Override, OverrideType, Authority, Verdict};
use phishguard_audit::sync_writer::SyncAuditWriter;
use uuid::Uuid;

use crate::budget;
use crate::calibration::CalibrationMonitor;
use crate::error::GovernanceError;
use crate::{canary, freeze, invariant, overrides};
use crate::store::GovernanceStore;

/// Ties the governance state store, the audit writer, and the
/// calibration monitor together behind one handle. Cheap to clone
/// (everything inside is already reference-counted or path-based); share
/// one instance across the process rather than constructing per-request.
pub struct GovernanceController {
    store: GovernanceStore,
    policy: GovernancePolicy,
    audit: SyncAuditWriter,
    calibration: CalibrationMonitor,
}

impl GovernanceController {
    /// Construct a controller rooted at `state_dir`, containing
    /// `governance_state.json`, `audit/policy_override.log`, and
    /// `calibration_metrics.json`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>, policy: GovernancePolicy) -> Self {
        let state_dir = state_dir.into();
        Self {
            store: GovernanceStore::new(state_dir.join("governance_state.json")),
            policy,
            audit: SyncAuditWriter::new(state_dir.join("audit").join("policy_override.log")),
            calibration: CalibrationMonitor::new(state_dir.join("calibration_metrics.json")),
        }
    }

    /// The underlying state store, for callers needing raw access (tests,
    /// administrative tooling).
    #[must_use]
    pub fn store(&self) -> &GovernanceStore {
        &self.store
    }

    /// The calibration monitor backing [`GovernanceController::calibration_status`].
    #[must_use]
    pub fn calibration_monitor(&self) -> &CalibrationMonitor {
        &self.calibration
    }

    /// `true` if the system is currently frozen.
    pub fn is_frozen(&self) -> Result<bool, GovernanceError> {
        freeze::is_frozen(&self.store)
    }

    /// The current freeze reason, if frozen.
    pub fn freeze_reason(&self) -> Result<Option<String>, GovernanceError> {
        freeze::freeze_reason(&self.store)
    }

    /// Transition FROZEN → UNFROZEN.
    pub fn resume(&self, resumed_by: &str, incident_id: &str, justification: &str) -> Result<(), GovernanceError> {
        freeze::resume_from_freeze(&self.store, resumed_by, incident_id, justification)
    }

    /// Transition UNFROZEN → FROZEN.
    pub fn freeze(&self, reason: &str, frozen_by: &str, incident_id: Option<String>) -> Result<(), GovernanceError> {
        freeze::trigger_freeze(&self.store, reason, frozen_by, incident_id)
    }

    /// Reset all monotonic safety budget counters.
    pub fn reset_budget(&self, by: &str, justification: &str, incident_id: &str) -> Result<(), GovernanceError> {
        budget::reset_budget(&self.store, by, justification, incident_id)
    }

    /// Grant an override per the authority matrix.
    pub fn request_override(
        &self,
        override_type: OverrideType,
        authority: Authority,
        affected_domains: Vec<String>,
        reason: String,
        approved_by: String,
        review_ticket: Option<String>,
        duration: Option<chrono::Duration>,
    ) -> Result<Override, GovernanceError> {
        if override_type == OverrideType::Permanent {
            invariant::assert_calibration_allows(self.calibration_status(), "permanent_override")?;
        }
        overrides::request_override(
            &self.store,
            &self.policy,
            &self.audit,
            overrides::OverrideRequest {
                override_type,
                authority,
                affected_domains,
                reason,
                approved_by,
                review_ticket,
                duration,
            },
        )
    }

    /// Currently active overrides.
    pub fn active_overrides(&self) -> Result<Vec<Override>, GovernanceError> {
        overrides::get_active_overrides(&self.store)
    }

    /// Revoke an override ahead of its natural expiry.
    pub fn revoke_override(&self, id: Uuid, by: &str, reason: &str) -> Result<(), GovernanceError> {
        overrides::revoke_override(&self.store, &self.audit, id, by, reason)
    }

    /// Record a canary evaluation result.
    pub fn record_canary_result(&self, domain: &str, verdict: Verdict, sample_size: u64) -> Result<(), GovernanceError> {
        canary::record_canary_result(&self.store, &self.policy, domain, verdict, sample_size)
    }

    /// Check promotion eligibility for `domain`.
    pub fn check_promotion_eligibility(&self, domain: &str) -> Result<Eligibility, GovernanceError> {
        canary::check_promotion_eligibility(&self.store, &self.policy, domain)
    }

    /// Promote `domain`, subject to re-checked eligibility.
    pub fn promote_canary(&self, domain: &str, approved_by: &str, review_ticket: &str) -> Result<(), GovernanceError> {
        invariant::assert_calibration_allows(self.calibration_status(), "canary_promotion")?;
        canary::promote_canary(&self.store, &self.policy, domain, approved_by, review_ticket)
    }

    /// Current calibration health.
    #[must_use]
    pub fn calibration_status(&self) -> CalibrationStatus {
        self.calibration.status()
    }

    /// Report a verdict observed for a known-trusted domain.
    pub fn report_trusted_domain_verdict(&self, domain: &str, verdict: Verdict, risk_score: f64) -> Result<(), GovernanceError> {
        invariant::report_trusted_domain_verdict(&self.store, domain, verdict, risk_score)
    }

    /// Look up an active override applicable to `domain`.
    pub fn consume_override(&self, domain: &str) -> Result<Option<Override>, GovernanceError> {
        invariant::consume_override(&self.store, domain)
    }

    /// `Err` if the system is frozen; the gate every mutating path and
    /// every pipeline write-path must pass first.
    pub fn assert_operational(&self) -> Result<(), GovernanceError> {
        invariant::assert_system_operational(&self.store)
    }

    /// Add `domain` to `gate`'s allowlist, subject to the freeze and
    /// calibration-health gates `gate.add` itself consults through this
    /// controller.
    pub fn expand_allowlist(&self, gate: &TrustGate, domain: &str) -> Result<(), phishguard_core::error::TrustGateError> {
        gate.add(domain, self, self)
    }
}

impl FreezeQuery for GovernanceController {
    fn frozen_reason(&self) -> Option<String> {
        self.freeze_reason().ok().flatten()
    }
}

impl CalibrationGate for GovernanceController {
    fn forbids_allowlist_expansion(&self) -> Option<String> {
        invariant::assert_calibration_allows(self.calibration_status(), "allowlist_expansion")
            .err()
            .map(|e| e.to_string())
    }
}
