//! Freeze protocol (C7): UNFROZEN ↔ FROZEN, the system's global "stop
//! serving, stop mutating" mode.

use chrono::Utc;
use uuid::Uuid;

use crate::error::GovernanceError;
use crate::store::GovernanceStore;

/// Minimum length required for a resume justification.
pub const MIN_RESUME_JUSTIFICATION_LEN: usize = 20;

/// Transition UNFROZEN → FROZEN. Idempotent: a second call while already
/// frozen leaves `frozen_at`/`frozen_by`/`freeze_reason` unchanged — first
/// writer wins.
pub fn trigger_freeze(
    store: &GovernanceStore,
    reason: &str,
    frozen_by: &str,
    incident_id: Option<String>,
) -> Result<(), GovernanceError> {
    store.update(|state| {
        if state.freeze.is_frozen {
            return;
        }
        let now = Utc::now();
        state.freeze.is_frozen = true;
        state.freeze.frozen_at = Some(now);
        state.freeze.frozen_by = Some(frozen_by.to_string());
        state.freeze.freeze_reason = Some(reason.to_string());
        state.freeze.incident_id = incident_id.or_else(|| Some(Uuid::new_v4().to_string()));
        state.budget.is_frozen = true;
        state.budget.freeze_reason = Some(reason.to_string());
    })
}

/// Transition FROZEN → UNFROZEN. Preconditions: the system is actually
/// frozen; `incident_id` is non-empty; `justification` is at least
/// [`MIN_RESUME_JUSTIFICATION_LEN`] characters. Any failure raises and
/// leaves the persisted state unchanged (the closure is never invoked for
/// a failed precondition check performed before the write).
pub fn resume_from_freeze(
    store: &GovernanceStore,
    resumed_by: &str,
    incident_id: &str,
    justification: &str,
) -> Result<(), GovernanceError> {
    if incident_id.trim().is_empty() {
        return Err(GovernanceError::InvalidResume {
            reason: "incident_id must be non-empty".to_string(),
        });
    }
    if justification.len() < MIN_RESUME_JUSTIFICATION_LEN {
        return Err(GovernanceError::InvalidResume {
            reason: format!(
                "justification must be at least {MIN_RESUME_JUSTIFICATION_LEN} characters"
            ),
        });
    }

    store.update(|state| -> Result<(), GovernanceError> {
        if !state.freeze.is_frozen {
            return Err(GovernanceError::InvalidResume {
                reason: "system is not currently frozen".to_string(),
            });
        }
        let now = Utc::now();
        state.freeze.is_frozen = false;
        state.freeze.resumed_at = Some(now);
        state.freeze.resumed_by = Some(resumed_by.to_string());
        state.freeze.resume_incident_id = Some(incident_id.to_string());
        state.freeze.resume_justification = Some(justification.to_string());
        state.budget.is_frozen = false;
        state.budget.freeze_reason = None;
        Ok(())
    })?
}

/// `true` if the persisted state is currently frozen (via the cached view).
pub fn is_frozen(store: &GovernanceStore) -> Result<bool, GovernanceError> {
    Ok(store.read_cached()?.freeze.is_frozen)
}

/// The current freeze reason, if frozen.
pub fn freeze_reason(store: &GovernanceStore) -> Result<Option<String>, GovernanceError> {
    Ok(store.read_cached()?.freeze.freeze_reason)
}
