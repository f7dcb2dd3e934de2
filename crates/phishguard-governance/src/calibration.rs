//! Calibration Monitor (C11): offline-computed model health, consumed by
//! the pipeline as a downgrade-only confidence adjustment and by
//! governance as an action gate.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use phishguard_core::types::CalibrationStatus;
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

const CACHE_TTL: Duration = Duration::from_secs(60);

/// Actions the calibration status may forbid while not HEALTHY.
pub const GATED_ACTIONS: &[&str] = &["canary_promotion", "allowlist_expansion", "permanent_override"];

/// Brier score threshold at or below which calibration is HEALTHY.
const BRIER_HEALTHY_MAX: f64 = 0.25;
/// Brier score threshold at or below which calibration is DEGRADED (not FAILED outright).
const BRIER_DEGRADED_MAX: f64 = 0.35;
/// Mean absolute calibration error threshold for HEALTHY.
const CAL_ERROR_HEALTHY_MAX: f64 = 0.10;
/// Mean absolute calibration error threshold for DEGRADED.
const CAL_ERROR_DEGRADED_MAX: f64 = 0.20;
/// Bins used for the reliability-diagram calibration-error calculation.
const CALIBRATION_BINS: usize = 10;
/// Variance below which predictions are considered collapsed to a point estimate.
const COLLAPSE_VARIANCE_THRESHOLD: f64 = 0.01;
/// Fraction of predictions within this distance of 0 or 1 that counts as "extreme".
const EXTREME_MARGIN: f64 = 0.05;
/// Share of extreme predictions above which overconfidence drift is flagged.
const OVERCONFIDENT_FRACTION: f64 = 0.80;

/// One historical (predicted probability, actual phishing label) pair,
/// the unit the monitor computes metrics over.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationSample {
    /// Model's predicted phishing probability.
    pub predicted: f64,
    /// Ground-truth label, resolved after the fact (e.g. via incident review).
    pub actual_phishing: bool,
}

/// Computed calibration health, persisted as `calibration_metrics.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationMetrics {
    /// Mean squared error between predicted probability and actual outcome.
    pub brier_score: f64,
    /// Mean absolute difference between each bin's average prediction and
    /// its observed phishing frequency, over [`CALIBRATION_BINS`] equal-width bins.
    pub mean_abs_calibration_error: f64,
    /// `true` if prediction variance collapsed below [`COLLAPSE_VARIANCE_THRESHOLD`].
    pub probability_collapse_detected: bool,
    /// `true` if more than [`OVERCONFIDENT_FRACTION`] of predictions sit
    /// within [`EXTREME_MARGIN`] of 0 or 1.
    pub overconfidence_drift_detected: bool,
    /// Derived health status.
    pub status: CalibrationStatus,
    /// Sample count the metrics were computed over.
    pub sample_count: usize,
    /// When these metrics were computed.
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

/// Compute calibration metrics from a batch of historical samples.
/// Returns [`CalibrationStatus::Unknown`] with zeroed metrics when given
/// no samples — "no snapshot" and "no data" degrade identically.
#[must_use]
pub fn compute_metrics(samples: &[CalibrationSample]) -> CalibrationMetrics {
    let n = samples.len();
    if n == 0 {
        return CalibrationMetrics {
            brier_score: 0.0,
            mean_abs_calibration_error: 0.0,
            probability_collapse_detected: false,
            overconfidence_drift_detected: false,
            status: CalibrationStatus::Unknown,
            sample_count: 0,
            computed_at: chrono::Utc::now(),
        };
    }

    let brier_score = samples
        .iter()
        .map(|s| {
            let actual = if s.actual_phishing { 1.0 } else { 0.0 };
            (s.predicted - actual).powi(2)
        })
        .sum::<f64>()
        / n as f64;

    let mean_abs_calibration_error = binned_calibration_error(samples);

    let mean = samples.iter().map(|s| s.predicted).sum::<f64>() / n as f64;
    let variance = samples.iter().map(|s| (s.predicted - mean).powi(2)).sum::<f64>() / n as f64;
    let probability_collapse_detected = variance < COLLAPSE_VARIANCE_THRESHOLD;

    let extreme_count = samples
        .iter()
        .filter(|s| s.predicted <= EXTREME_MARGIN || s.predicted >= 1.0 - EXTREME_MARGIN)
        .count();
    let overconfidence_drift_detected = (extreme_count as f64 / n as f64) > OVERCONFIDENT_FRACTION;

    let status = derive_status(
        brier_score,
        mean_abs_calibration_error,
        probability_collapse_detected,
        overconfidence_drift_detected,
    );

    CalibrationMetrics {
        brier_score,
        mean_abs_calibration_error,
        probability_collapse_detected,
        overconfidence_drift_detected,
        status,
        sample_count: n,
        computed_at: chrono::Utc::now(),
    }
}

fn binned_calibration_error(samples: &[CalibrationSample]) -> f64 {
    let mut bin_sum_pred = vec![0.0_f64; CALIBRATION_BINS];
    let mut bin_sum_actual = vec![0.0_f64; CALIBRATION_BINS];
    let mut bin_count = vec![0_usize; CALIBRATION_BINS];

    for s in samples {
        let bin = ((s.predicted * CALIBRATION_BINS as f64) as usize).min(CALIBRATION_BINS - 1);
        bin_sum_pred[bin] += s.predicted;
        bin_sum_actual[bin] += if s.actual_phishing { 1.0 } else { 0.0 };
        bin_count[bin] += 1;
    }

    let mut total_error = 0.0;
    let mut occupied_bins = 0;
    for i in 0..CALIBRATION_BINS {
        if bin_count[i] == 0 {
            continue;
        }
        let avg_pred = bin_sum_pred[i] / bin_count[i] as f64;
        let observed_rate = bin_sum_actual[i] / bin_count[i] as f64;
        total_error += (avg_pred - observed_rate).abs();
        occupied_bins += 1;
    }

    if occupied_bins == 0 {
        0.0
    } else {
        total_error / occupied_bins as f64
    }
}

fn derive_status(
    brier: f64,
    cal_error: f64,
    collapse: bool,
    overconfident: bool,
) -> CalibrationStatus {
    if collapse || overconfident {
        return CalibrationStatus::Degraded;
    }
    if brier <= BRIER_HEALTHY_MAX && cal_error <= CAL_ERROR_HEALTHY_MAX {
        CalibrationStatus::Healthy
    } else if brier <= BRIER_DEGRADED_MAX && cal_error <= CAL_ERROR_DEGRADED_MAX {
        CalibrationStatus::Degraded
    } else {
        CalibrationStatus::Degraded
    }
}

/// The confidence-score penalty and action restrictions a [`CalibrationStatus`] implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyAdjustment {
    /// Additive penalty applied to the model's phishing probability (downgrade-only).
    pub confidence_penalty: f64,
    /// If `true`, a PHISHING classification is capped at SUSPICIOUS.
    pub restrict_phishing_to_suspicious: bool,
    /// If `true`, the result should carry an uncertainty warning.
    pub surface_uncertainty_warning: bool,
}

/// Map a calibration status to its pipeline policy adjustment.
#[must_use]
pub fn policy_adjustment(status: CalibrationStatus) -> PolicyAdjustment {
    match status {
        CalibrationStatus::Healthy => PolicyAdjustment {
            confidence_penalty: 0.00,
            restrict_phishing_to_suspicious: false,
            surface_uncertainty_warning: false,
        },
        CalibrationStatus::Degraded => PolicyAdjustment {
            confidence_penalty: 0.20,
            restrict_phishing_to_suspicious: true,
            surface_uncertainty_warning: false,
        },
        CalibrationStatus::Unknown => PolicyAdjustment {
            confidence_penalty: 0.10,
            restrict_phishing_to_suspicious: true,
            surface_uncertainty_warning: true,
        },
    }
}

/// `Err` if `status` forbids `action`. HEALTHY forbids nothing.
pub fn assert_action_allowed(status: CalibrationStatus, action: &str) -> Result<(), GovernanceError> {
    if status != CalibrationStatus::Healthy && GATED_ACTIONS.contains(&action) {
        return Err(GovernanceError::CalibrationViolation {
            status: format!("{status:?}"),
            action: action.to_string(),
        });
    }
    Ok(())
}

struct Cached {
    fetched_at: Instant,
    metrics: CalibrationMetrics,
}

/// Reads a persisted calibration snapshot from disk, caching it in memory
/// for [`CACHE_TTL`]. Computation of fresh metrics from raw samples is a
/// separate, offline concern ([`compute_metrics`]); this type only serves
/// the latest snapshot to callers.
pub struct CalibrationMonitor {
    path: PathBuf,
    cache: RwLock<Option<Cached>>,
}

impl CalibrationMonitor {
    /// Construct a monitor reading snapshots from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// Persist freshly computed metrics, becoming the new current snapshot.
    pub fn publish(&self, metrics: &CalibrationMetrics) -> Result<(), GovernanceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GovernanceError::StateIo {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(metrics).expect("CalibrationMetrics always serialises");
        std::fs::write(&self.path, bytes).map_err(|source| GovernanceError::StateIo {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut cache = self.cache.write().expect("calibration cache lock poisoned");
        *cache = Some(Cached {
            fetched_at: Instant::now(),
            metrics: metrics.clone(),
        });
        Ok(())
    }

    /// Current calibration status. Missing or unreadable snapshot reads as
    /// [`CalibrationStatus::Unknown`] rather than failing the caller.
    pub fn status(&self) -> CalibrationStatus {
        self.current().map_or(CalibrationStatus::Unknown, |m| m.status)
    }

    /// Current metrics snapshot, if one has ever been published and the
    /// file is still readable.
    pub fn current(&self) -> Option<CalibrationMetrics> {
        {
            let cache = self.cache.read().expect("calibration cache lock poisoned");
            if let Some(c) = cache.as_ref() {
                if c.fetched_at.elapsed() < CACHE_TTL {
                    return Some(c.metrics.clone());
                }
            }
        }
        let metrics = read_snapshot(&self.path)?;
        let mut cache = self.cache.write().expect("calibration cache lock poisoned");
        *cache = Some(Cached {
            fetched_at: Instant::now(),
            metrics: metrics.clone(),
        });
        Some(metrics)
    }
}

fn read_snapshot(path: &Path) -> Option<CalibrationMetrics> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(predicted: f64, actual_phishing: bool) -> CalibrationSample {
        CalibrationSample { predicted, actual_phishing }
    }

    #[test]
    fn no_samples_reads_unknown() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics.status, CalibrationStatus::Unknown);
    }

    #[test]
    fn well_calibrated_samples_read_healthy() {
        let samples: Vec<_> = (0..100)
            .map(|i| {
                let p = (i % 10) as f64 / 10.0 + 0.05;
                sample(p, i % 10 >= 5)
            })
            .collect();
        let metrics = compute_metrics(&samples);
        assert_eq!(metrics.status, CalibrationStatus::Healthy);
    }

    #[test]
    fn collapsed_predictions_read_degraded() {
        let samples: Vec<_> = (0..50).map(|i| sample(0.5, i % 2 == 0)).collect();
        let metrics = compute_metrics(&samples);
        assert!(metrics.probability_collapse_detected);
        assert_eq!(metrics.status, CalibrationStatus::Degraded);
    }

    #[test]
    fn overconfident_extremes_read_degraded() {
        let samples: Vec<_> = (0..50)
            .map(|i| if i % 2 == 0 { sample(0.01, false) } else { sample(0.99, true) })
            .collect();
        let metrics = compute_metrics(&samples);
        assert!(metrics.overconfidence_drift_detected);
        assert_eq!(metrics.status, CalibrationStatus::Degraded);
    }

    #[test]
    fn healthy_forbids_nothing_degraded_forbids_gated_actions() {
        assert!(assert_action_allowed(CalibrationStatus::Healthy, "canary_promotion").is_ok());
        assert!(assert_action_allowed(CalibrationStatus::Degraded, "canary_promotion").is_err());
        assert!(assert_action_allowed(CalibrationStatus::Degraded, "scan_url").is_ok());
    }

    #[test]
    fn monitor_round_trips_published_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = CalibrationMonitor::new(dir.path().join("calibration_metrics.json"));
        assert_eq!(monitor.status(), CalibrationStatus::Unknown);

        let metrics = compute_metrics(&[sample(0.9, true), sample(0.1, false)]);
        monitor.publish(&metrics).unwrap();
        assert_eq!(monitor.status(), metrics.status);
    }
}
