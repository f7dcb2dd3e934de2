//! Manual override lifecycle (C7 §4.8): PERMANENT / EMERGENCY / TESTING
//! grants, each constrained by an authority matrix and a maximum duration.

use chrono::{Duration as ChronoDuration, Utc};
use phishguard_core::config::GovernancePolicy;
use phishguard_core::types::{Authority, AuditEntry, Override, OverrideType};
use phishguard_audit::sync_writer::SyncAuditWriter;
use uuid::Uuid;

use crate::budget;
use crate::error::GovernanceError;
use crate::freeze;
use crate::store::GovernanceStore;

/// Maximum lifetime of an EMERGENCY override.
const EMERGENCY_MAX: ChronoDuration = ChronoDuration::hours(24);
/// Maximum lifetime of a TESTING override.
const TESTING_MAX: ChronoDuration = ChronoDuration::hours(1);

/// Validate the authority matrix for `(override_type, authority)` and
/// return the effective expiry, clamping an over-long requested duration
/// down to the type's maximum rather than rejecting it.
fn resolve_expiry(
    override_type: OverrideType,
    authority: Authority,
    review_ticket: &Option<String>,
    requested_duration: Option<ChronoDuration>,
    now: chrono::DateTime<Utc>,
) -> Result<Option<chrono::DateTime<Utc>>, GovernanceError> {
    match override_type {
        OverrideType::Permanent => {
            if authority != Authority::SecurityTeam {
                return Err(GovernanceError::InvalidOverrideRequest {
                    reason: "PERMANENT overrides require SECURITY_TEAM authority".to_string(),
                });
            }
            if review_ticket.as_deref().unwrap_or("").trim().is_empty() {
                return Err(GovernanceError::InvalidOverrideRequest {
                    reason: "PERMANENT overrides require a non-empty review_ticket".to_string(),
                });
            }
            Ok(None)
        }
        OverrideType::Emergency => {
            if !matches!(authority, Authority::SecurityTeam | Authority::OnCall) {
                return Err(GovernanceError::InvalidOverrideRequest {
                    reason: "EMERGENCY overrides require SECURITY_TEAM or ON_CALL authority"
                        .to_string(),
                });
            }
            let requested = requested_duration.unwrap_or(EMERGENCY_MAX);
            let clamped = requested.min(EMERGENCY_MAX);
            Ok(Some(now + clamped))
        }
        OverrideType::Testing => {
            if authority != Authority::CiSystem {
                return Err(GovernanceError::InvalidOverrideRequest {
                    reason: "TESTING overrides require CI_SYSTEM authority".to_string(),
                });
            }
            let requested = requested_duration.unwrap_or(TESTING_MAX);
            let clamped = requested.min(TESTING_MAX);
            Ok(Some(now + clamped))
        }
    }
}

/// Request parameters for [`request_override`].
#[derive(Debug, Clone)]
pub struct OverrideRequest {
    /// Kind of override.
    pub override_type: OverrideType,
    /// Acting authority.
    pub authority: Authority,
    /// Domains this override covers.
    pub affected_domains: Vec<String>,
    /// Human-readable justification.
    pub reason: String,
    /// Name or identifier of the approver.
    pub approved_by: String,
    /// Tracking ticket; required for PERMANENT.
    pub review_ticket: Option<String>,
    /// Requested duration; clamped to the type's maximum, never rejected
    /// for being too long.
    pub duration: Option<ChronoDuration>,
}

/// Grant an override per the authority matrix. The override is appended
/// to governance state, the window counter is incremented, and an audit
/// entry is written; a failed audit write aborts here with
/// `AuditWriteFailed` rather than leaving the grant unrecorded. If the
/// post-increment count exceeds the configured limit, the system is
/// frozen as a side effect and this call itself returns `BudgetExhausted`
/// rather than the granted override, matching the other zero-tolerance
/// budget counters in `budget.rs`: the triggering call is the first to
/// feel the freeze, not just the ones after it.
pub fn request_override(
    store: &GovernanceStore,
    policy: &GovernancePolicy,
    audit: &SyncAuditWriter,
    request: OverrideRequest,
) -> Result<Override, GovernanceError> {
    if let Some(reason) = freeze::freeze_reason(store)? {
        return Err(GovernanceError::SystemFrozen { reason });
    }

    budget::recompute_window_if_stale(store, policy.override_window_hours)?;

    let now = Utc::now();
    let expires_at = resolve_expiry(
        request.override_type,
        request.authority,
        &request.review_ticket,
        request.duration,
        now,
    )?;

    let granted = Override {
        id: Uuid::new_v4(),
        override_type: request.override_type,
        authority: request.authority,
        created_at: now,
        expires_at,
        affected_domains: request.affected_domains.clone(),
        reason: request.reason.clone(),
        approved_by: request.approved_by.clone(),
        review_ticket: request.review_ticket.clone(),
        is_active: true,
    };

    let hourly_count = store.update(|state| {
        state.overrides.push(granted.clone());
        state.budget.override_count_hourly += 1;
        state.budget.override_count_hourly
    })?;

    audit.append(&AuditEntry {
        timestamp: now,
        environment: phishguard_core::types::Environment::Prod,
        event_type: "OVERRIDE_GRANTED".to_string(),
        override_flag_value: Some(true),
        affected_domains: request.affected_domains,
        triggering_context: format!("{:?} override requested by {:?}", granted.override_type, granted.authority),
        reason: request.reason,
        additional_data: serde_json::json!({ "override_id": granted.id.to_string() }),
    })?;

    if hourly_count > policy.overrides_per_window {
        freeze::trigger_freeze(store, "Override budget exceeded", "governance-controller", None)?;
        return Err(GovernanceError::BudgetExhausted {
            counter: "override_count_hourly".to_string(),
            detail: format!("limit {} reached", policy.overrides_per_window),
        });
    }

    Ok(granted)
}

/// Return currently-active overrides, lazily flipping any expired entry's
/// `is_active` to `false` as a side effect. Idempotent: calling this twice
/// in a row with no intervening grant yields the same result both times.
pub fn get_active_overrides(store: &GovernanceStore) -> Result<Vec<Override>, GovernanceError> {
    let now = Utc::now();
    let any_expired = store.read_cached()?.overrides.iter().any(|o| o.is_active && o.is_expired(now));

    if any_expired {
        store.update(|state| {
            for o in &mut state.overrides {
                if o.is_active && o.is_expired(now) {
                    o.is_active = false;
                }
            }
        })?;
    }

    Ok(store
        .read_cached()?
        .overrides
        .into_iter()
        .filter(|o| o.is_active && !o.is_expired(now))
        .collect())
}

/// Revoke an override ahead of its natural expiry, auditing the reason.
pub fn revoke_override(
    store: &GovernanceStore,
    audit: &SyncAuditWriter,
    id: Uuid,
    by: &str,
    reason: &str,
) -> Result<(), GovernanceError> {
    let found = store.update(|state| {
        let entry = state.overrides.iter_mut().find(|o| o.id == id);
        match entry {
            Some(o) if o.is_active => {
                o.is_active = false;
                true
            }
            _ => false,
        }
    })?;

    if !found {
        return Err(GovernanceError::InvalidOverrideRequest {
            reason: format!("no active override with id {id}"),
        });
    }

    audit.append(&AuditEntry {
        timestamp: Utc::now(),
        environment: phishguard_core::types::Environment::Prod,
        event_type: "OVERRIDE_REVOKED".to_string(),
        override_flag_value: Some(false),
        affected_domains: vec![],
        triggering_context: format!("override {id} revoked by {by}"),
        reason: reason.to_string(),
        additional_data: serde_json::Value::Null,
    })?;

    Ok(())
}
