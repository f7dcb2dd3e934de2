//! Safety budgets & escalation (C7 §4.9): monotonic counters reset only
//! by explicit administrative action.

use chrono::Utc;

use crate::error::GovernanceError;
use crate::freeze;
use crate::store::GovernanceStore;

/// Minimum justification length required to reset a budget.
pub const MIN_RESET_JUSTIFICATION_LEN: usize = 20;

/// Recompute the override-rate window if stale, resetting its counter.
/// Does not touch any other counter. `window_hours` comes from
/// [`phishguard_core::config::GovernancePolicy::override_window_hours`].
pub fn recompute_window_if_stale(
    store: &GovernanceStore,
    window_hours: i64,
) -> Result<(), GovernanceError> {
    store.update(|state| {
        let now = Utc::now();
        if now - state.budget.window_start > chrono::Duration::hours(window_hours) {
            state.budget.window_start = now;
            state.budget.override_count_hourly = 0;
        }
    })
}

/// Reset all budget counters. The only way counters may return to zero
/// outside of process-wide state loss.
pub fn reset_budget(
    store: &GovernanceStore,
    by: &str,
    justification: &str,
    incident_id: &str,
) -> Result<(), GovernanceError> {
    if justification.len() < MIN_RESET_JUSTIFICATION_LEN {
        return Err(GovernanceError::InvalidResume {
            reason: format!(
                "justification must be at least {MIN_RESET_JUSTIFICATION_LEN} characters"
            ),
        });
    }
    if incident_id.trim().is_empty() {
        return Err(GovernanceError::InvalidResume {
            reason: "incident_id must be non-empty".to_string(),
        });
    }
    tracing::info!(by, incident_id, "resetting governance safety budget");
    store.update(|state| {
        state.budget.override_count_hourly = 0;
        state.budget.suspicious_trusted_count = 0;
        state.budget.phishing_trusted_count = 0;
        state.budget.canary_failures = 0;
        state.budget.window_start = Utc::now();
    })
}

/// Increment the canary-failure counter, triggering a freeze if the
/// configured limit is reached.
pub fn charge_canary_failure(store: &GovernanceStore, limit: u64) -> Result<(), GovernanceError> {
    let exceeded = store.update(|state| {
        state.budget.canary_failures += 1;
        state.budget.canary_failures >= limit
    })?;
    if exceeded {
        freeze::trigger_freeze(
            store,
            "Canary failure budget exceeded",
            "governance-controller",
            None,
        )?;
        return Err(GovernanceError::BudgetExhausted {
            counter: "canary_failures".to_string(),
            detail: format!("limit {limit} reached"),
        });
    }
    Ok(())
}

/// Increment the zero-tolerance suspicious-on-trusted counter, freezing
/// immediately since its limit is 0.
pub fn charge_suspicious_trusted(store: &GovernanceStore) -> Result<(), GovernanceError> {
    store.update(|state| {
        state.budget.suspicious_trusted_count += 1;
    })?;
    freeze::trigger_freeze(
        store,
        "Trusted domain received SUSPICIOUS verdict (zero tolerance)",
        "invariant-reporter",
        None,
    )?;
    Err(GovernanceError::BudgetExhausted {
        counter: "suspicious_trusted".to_string(),
        detail: "limit 0 reached".to_string(),
    })
}
