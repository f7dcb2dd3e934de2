//! Telemetry Aggregator (C9): thread-safe counters, persisted every
//! N=100 events or on shutdown. All operations are fail-safe: any error
//! is caught and logged, never propagated to the request path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use phishguard_core::types::{CalibrationStatus, Verdict};
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::snapshot::TelemetrySnapshot;

/// Persist the snapshot after this many recorded events.
const PERSIST_EVERY: u64 = 100;
/// Maximum distinct signal-type buckets retained; least-frequent are
/// trimmed once this is exceeded.
const MAX_SIGNAL_BUCKETS: usize = 10;

/// One mutex guarding every counter, released around I/O — matching the
/// "one mutex per aggregator instance" discipline the concurrency model
/// requires.
struct Counters {
    by_verdict: FxHashMap<String, u64>,
    by_drift_status: FxHashMap<String, u64>,
    complete_count: u64,
    incomplete_count: u64,
    allowlist_override_count: u64,
    top_signals: FxHashMap<String, u64>,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            by_verdict: FxHashMap::default(),
            by_drift_status: FxHashMap::default(),
            complete_count: 0,
            incomplete_count: 0,
            allowlist_override_count: 0,
            top_signals: FxHashMap::default(),
        }
    }
}

/// The telemetry aggregator. Cheap to clone-share via `Arc` at call sites;
/// holds its own mutex internally.
pub struct TelemetryAggregator {
    counters: Mutex<Counters>,
    total_events: AtomicU64,
    snapshot_path: Option<PathBuf>,
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TelemetryAggregator {
    /// Construct an aggregator, optionally persisting snapshots to `snapshot_path`.
    #[must_use]
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            total_events: AtomicU64::new(0),
            snapshot_path,
        }
    }

    /// Record one completed analysis. Never panics; any internal error is
    /// logged and the counters are left in whatever state they reached.
    pub fn record(
        &self,
        verdict: Verdict,
        drift_status: CalibrationStatus,
        analysis_complete: bool,
        allowlist_override: bool,
        top_signal_names: &[String],
    ) {
        {
            let mut counters = self.counters.lock();
            *counters.by_verdict.entry(verdict.to_string()).or_insert(0) += 1;
            *counters
                .by_drift_status
                .entry(format!("{drift_status:?}"))
                .or_insert(0) += 1;
            if analysis_complete {
                counters.complete_count += 1;
            } else {
                counters.incomplete_count += 1;
            }
            if allowlist_override {
                counters.allowlist_override_count += 1;
            }
            for name in top_signal_names {
                *counters.top_signals.entry(name.clone()).or_insert(0) += 1;
            }
            trim_signal_buckets(&mut counters.top_signals);
        }

        let total = self.total_events.fetch_add(1, Ordering::Relaxed) + 1;
        if total % PERSIST_EVERY == 0 {
            self.persist();
        }
    }

    /// Take an immutable snapshot of current counters.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let counters = self.counters.lock();
        TelemetrySnapshot {
            by_verdict: counters.by_verdict.clone(),
            by_drift_status: counters.by_drift_status.clone(),
            complete_count: counters.complete_count,
            incomplete_count: counters.incomplete_count,
            allowlist_override_count: counters.allowlist_override_count,
            top_signals: counters.top_signals.clone(),
            total_events: self.total_events.load(Ordering::Relaxed),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Persist the current snapshot to disk. Failure is logged at warning
    /// and swallowed — counters may lag the file but never corrupt.
    pub fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let snapshot = self.snapshot();
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Some(parent) = path.parent() {
                    if let Err(err) = std::fs::create_dir_all(parent) {
                        warn!(error = %err, "failed to create telemetry snapshot directory");
                        return;
                    }
                }
                if let Err(err) = std::fs::write(path, bytes) {
                    warn!(error = %err, "failed to persist telemetry snapshot");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialise telemetry snapshot"),
        }
    }
}

fn trim_signal_buckets(buckets: &mut FxHashMap<String, u64>) {
    if buckets.len() <= MAX_SIGNAL_BUCKETS {
        return;
    }
    let mut entries: Vec<(String, u64)> = buckets.drain().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(MAX_SIGNAL_BUCKETS);
    buckets.extend(entries);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_increment_expected_counters() {
        let agg = TelemetryAggregator::new(None);
        agg.record(Verdict::Safe, CalibrationStatus::Healthy, true, true, &[]);
        agg.record(Verdict::Phishing, CalibrationStatus::Degraded, false, false, &[]);

        let snap = agg.snapshot();
        assert_eq!(snap.by_verdict.get("SAFE"), Some(&1));
        assert_eq!(snap.by_verdict.get("PHISHING"), Some(&1));
        assert_eq!(snap.complete_count, 1);
        assert_eq!(snap.incomplete_count, 1);
        assert_eq!(snap.allowlist_override_count, 1);
        assert_eq!(snap.total_events, 2);
    }

    #[test]
    fn signal_buckets_are_trimmed_to_top_ten() {
        let agg = TelemetryAggregator::new(None);
        for i in 0..15 {
            agg.record(
                Verdict::Safe,
                CalibrationStatus::Healthy,
                true,
                false,
                &[format!("signal-{i}")],
            );
        }
        let snap = agg.snapshot();
        assert!(snap.top_signals.len() <= 10);
    }

    #[test]
    fn persist_writes_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explanation_metrics.json");
        let agg = TelemetryAggregator::new(Some(path.clone()));
        agg.record(Verdict::Safe, CalibrationStatus::Healthy, true, false, &[]);
        agg.persist();
        assert!(path.exists());
    }

    #[test]
    fn auto_persists_every_hundred_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explanation_metrics.json");
        let agg = TelemetryAggregator::new(Some(path.clone()));
        for _ in 0..100 {
            agg.record(Verdict::Safe, CalibrationStatus::Healthy, true, false, &[]);
        }
        assert!(path.exists());
    }
}
