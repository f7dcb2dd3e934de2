//! Ensemble scoring — combines heuristic and structural analysis scores
//! into a final injection decision.
//!
//! [`EnsembleScorer`] feeds detector scores through a pluggable
//! [`EnsembleStrategy`] to produce a block/allow [`Decision`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::injection::PatternMatch;
use super::structural::StructuralReport;

// ── EnsembleStrategy trait ─────────────────────────────────────────────

/// Strategy for combining multiple detector scores into a final score.
///
/// Implement this trait to plug in custom ensemble logic.
pub trait EnsembleStrategy: Send + Sync + std::fmt::Debug {
    /// Human-readable name of the strategy.
    fn name(&self) -> &str;

    /// Combine named `(detector_id, score)` pairs into a single `0.0–1.0` score.
    fn combine(&self, scores: &[(&str, f32)]) -> f32;
}

// ── Built-in strategies ────────────────────────────────────────────────

/// Block if *any* detector score is at or above a threshold.
///
/// Returns the maximum score across all detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyAboveThreshold {
    /// Score threshold for blocking (default `0.8`).
    pub threshold: f32,
}

impl Default for AnyAboveThreshold {
    fn default() -> Self {
        Self { threshold: 0.8 }
    }
}

impl EnsembleStrategy for AnyAboveThreshold {
    fn name(&self) -> &'static str {
        "any_above_threshold"
    }

    fn combine(&self, scores: &[(&str, f32)]) -> f32 {
        scores.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max)
    }
}

/// Weighted average of detector scores with configurable per-detector weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedAverage {
    /// Per-detector weights (missing detectors default to `1.0`).
    pub weights: HashMap<String, f32>,
    /// Score threshold for blocking.
    pub threshold: f32,
}

impl Default for WeightedAverage {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert("heuristic".to_string(), 0.6);
        weights.insert("structural".to_string(), 0.4);
        Self {
            weights,
            threshold: 0.7,
        }
    }
}

impl EnsembleStrategy for WeightedAverage {
    fn name(&self) -> &'static str {
        "weighted_average"
    }

    fn combine(&self, scores: &[(&str, f32)]) -> f32 {
        if scores.is_empty() {
            return 0.0;
        }
        let mut weighted_sum = 0.0_f32;
        let mut weight_total = 0.0_f32;
        for (id, score) in scores {
            let w = self.weights.get(*id).copied().unwrap_or(1.0);
            weighted_sum += w * score;
            weight_total += w;
        }
        if weight_total == 0.0 {
            0.0
        } else {
            weighted_sum / weight_total
        }
    }
}

/// Block when enough detectors report a score above `0.5`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MajorityVote {
    /// Minimum number of detectors that must exceed `0.5` to block.
    pub min_detectors: usize,
}

impl Default for MajorityVote {
    fn default() -> Self {
        Self { min_detectors: 2 }
    }
}

impl EnsembleStrategy for MajorityVote {
    fn name(&self) -> &'static str {
        "majority_vote"
    }

    #[allow(clippy::cast_precision_loss)]
    fn combine(&self, scores: &[(&str, f32)]) -> f32 {
        let above = scores.iter().filter(|(_, s)| *s > 0.5).count();
        if above >= self.min_detectors {
            // Return the max score to reflect confidence.
            scores.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max)
        } else {
            // Not enough votes — return the average to stay below threshold.
            if scores.is_empty() {
                0.0
            } else {
                let sum: f32 = scores.iter().map(|(_, s)| *s).sum();
                sum / scores.len() as f32
            }
        }
    }
}

/// Returns the maximum score (semantic alias for clarity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxScore {
    /// Score threshold for blocking.
    pub threshold: f32,
}

impl Default for MaxScore {
    fn default() -> Self {
        Self { threshold: 0.8 }
    }
}

impl EnsembleStrategy for MaxScore {
    fn name(&self) -> &'static str {
        "max_score"
    }

    fn combine(&self, scores: &[(&str, f32)]) -> f32 {
        scores.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max)
    }
}

// ── Decision ───────────────────────────────────────────────────────────

/// Final injection decision produced by [`EnsembleScorer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Decision {
    /// The input is considered safe.
    Allow,
    /// The input should be blocked.
    Block,
}

// ── DetectorScore ──────────────────────────────────────────────────────

/// Score contribution from a single detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorScore {
    /// Identifier for the detector (e.g. `"heuristic"`, `"structural"`).
    pub detector_id: String,
    /// Normalized score in `0.0–1.0`.
    pub score: f32,
    /// Human-readable details about the score.
    pub details: String,
}

// ── EnsembleResult ─────────────────────────────────────────────────────

/// Result of ensemble scoring.
#[derive(Debug, Clone)]
pub struct EnsembleResult {
    /// Block or allow decision.
    pub decision: Decision,
    /// Confidence in the decision (`0.0–1.0`).
    pub confidence: f32,
    /// Per-detector scores that fed into the decision.
    pub scores: Vec<DetectorScore>,
    /// Name of the strategy that produced this result.
    pub strategy_name: String,
}

// ── EnsembleScorer ─────────────────────────────────────────────────────

/// Combines heuristic and structural detector outputs into a final
/// [`Decision`] using a pluggable [`EnsembleStrategy`].
pub struct EnsembleScorer {
    strategy: Box<dyn EnsembleStrategy>,
}

impl std::fmt::Debug for EnsembleScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleScorer")
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl EnsembleScorer {
    /// Create a scorer with a custom strategy.
    pub fn new(strategy: impl EnsembleStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Create a scorer from a pre-boxed strategy.
    #[must_use]
    pub fn from_boxed(strategy: Box<dyn EnsembleStrategy>) -> Self {
        Self { strategy }
    }

    /// Create a scorer with sensible defaults (`AnyAboveThreshold` at `0.7`).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(AnyAboveThreshold { threshold: 0.7 })
    }

    /// Produce an ensemble [`EnsembleResult`] from heuristic pattern matches
    /// and a structural report.
    #[must_use]
    pub fn score(
        &self,
        heuristic_matches: &[PatternMatch],
        structural: &StructuralReport,
    ) -> EnsembleResult {
        // Heuristic score: sum of matched weights, capped at 1.0.
        let h_score: f32 = heuristic_matches
            .iter()
            .map(|m| m.weight)
            .sum::<f32>()
            .min(1.0);

        // Structural score: already normalized 0.0–1.0.
        let s_score = structural.overall_risk;

        let h_details = if heuristic_matches.is_empty() {
            "no patterns matched".to_string()
        } else {
            format!(
                "{} pattern(s) matched, combined weight {:.2}",
                heuristic_matches.len(),
                h_score,
            )
        };

        let s_details = format!("overall structural risk {s_score:.2}");

        let detector_scores = vec![
            DetectorScore {
                detector_id: "heuristic".to_string(),
                score: h_score,
                details: h_details,
            },
            DetectorScore {
                detector_id: "structural".to_string(),
                score: s_score,
                details: s_details,
            },
        ];

        let pairs: Vec<(&str, f32)> = detector_scores
            .iter()
            .map(|ds| (ds.detector_id.as_str(), ds.score))
            .collect();

        let combined = self.strategy.combine(&pairs);

        // Determine threshold from the strategy (duck-type check via downcast
        // is not worth it — instead, determine decision by comparing combined
        // score against a threshold derived from the strategy type).
        let threshold = self.resolve_threshold();
        let decision = if combined >= threshold {
            Decision::Block
        } else {
            Decision::Allow
        };

        // Confidence: distance from the threshold, scaled to 0.0–1.0.
        let confidence = if decision == Decision::Block {
            // How far above threshold (more = more confident).
            ((combined - threshold) / (1.0 - threshold + f32::EPSILON)).min(1.0)
        } else {
            // How far below threshold (more = more confident).
            ((threshold - combined) / (threshold + f32::EPSILON)).min(1.0)
        };

        EnsembleResult {
            decision,
            confidence,
            scores: detector_scores,
            strategy_name: self.strategy.name().to_string(),
        }
    }

    /// Resolve the effective threshold for the active strategy.
    fn resolve_threshold(&self) -> f32 {
        match self.strategy.name() {
            "any_above_threshold" | "max_score" | "weighted_average" => 0.7,
            // "majority_vote" and custom strategies default to 0.5.
            _ => 0.5,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
