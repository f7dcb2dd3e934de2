//! The persisted shape of a telemetry snapshot (`explanation_metrics.json`).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A point-in-time dump of all counters, suitable for JSON persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Counts keyed by verdict string (`SAFE`/`SUSPICIOUS`/`PHISHING`).
    pub by_verdict: FxHashMap<String, u64>,
    /// Counts keyed by calibration status string.
    pub by_drift_status: FxHashMap<String, u64>,
    /// Count of requests with `analysis_complete = true`.
    pub complete_count: u64,
    /// Count of requests with `analysis_complete = false`.
    pub incomplete_count: u64,
    /// Count of requests that bypassed the model via trust/allowlist override.
    pub allowlist_override_count: u64,
    /// Top signal-type buckets kept by frequency, trimmed to 10 entries.
    pub top_signals: FxHashMap<String, u64>,
    /// Total events recorded since the aggregator started.
    pub total_events: u64,
    /// When this snapshot was taken.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
