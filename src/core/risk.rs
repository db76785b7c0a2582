//! Risk scoring of a fresh sample against the registered baseline.
//!
//! Four deviations are combined with configured weights:
//!
//! ```text
//! risk = W1*flight_dev + W2*dwell_dev + W3*bigram_dev + W4*vector_dist
//! threshold = max(baseline.flight_std, floor_std) * K
//! ```
//!
//! A sample is trusted only when `risk < threshold`; a tie is suspicious.
//! Everything here is pure: no I/O, no clocks, no shared state.

use crate::config::{ConfigError, RiskConfig};
use crate::core::baseline::Baseline;
use crate::core::features::KeystrokeSample;
use crate::core::stats::mean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of the threshold below which a score counts as low risk.
const LOW_BAND_RATIO: f64 = 0.6;

/// Outcome of comparing a risk score to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Trusted,
    Suspicious,
}

impl RiskStatus {
    pub fn from_score(risk: f64, threshold: f64) -> Self {
        if risk < threshold {
            RiskStatus::Trusted
        } else {
            RiskStatus::Suspicious
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, RiskStatus::Trusted)
    }
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Trusted => write!(f, "TRUSTED"),
            RiskStatus::Suspicious => write!(f, "SUSPICIOUS"),
        }
    }
}

/// Display band of a score relative to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    /// Below 60% of the threshold
    Low,
    /// Under the threshold but close to it
    Elevated,
    /// At or above the threshold
    Critical,
}

impl RiskBand {
    /// Band of a score relative to the threshold it was judged against.
    pub fn classify(risk: f64, threshold: f64) -> Self {
        if risk < LOW_BAND_RATIO * threshold {
            RiskBand::Low
        } else if risk < threshold {
            RiskBand::Elevated
        } else {
            RiskBand::Critical
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBand::Low => write!(f, "LOW"),
            RiskBand::Elevated => write!(f, "ELEVATED"),
            RiskBand::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result of scoring one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub flight_dev: f64,
    pub dwell_dev: f64,
    pub bigram_dev: f64,
    pub vector_dist: f64,
    /// Informational only, not part of the score
    pub cosine_sim: f64,
    pub risk_score: f64,
    pub threshold: f64,
    pub status: RiskStatus,
}

impl RiskAssessment {
    /// Risk as a fraction of the threshold.
    pub fn ratio(&self) -> f64 {
        if self.threshold > 0.0 {
            self.risk_score / self.threshold
        } else {
            f64::INFINITY
        }
    }

    pub fn band(&self) -> RiskBand {
        RiskBand::classify(self.risk_score, self.threshold)
    }
}

/// Scores samples with a validated risk configuration.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    /// Create an engine, rejecting weights that do not sum to 1.0.
    pub fn new(config: RiskConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Score `sample` against `baseline`.
    pub fn assess(&self, baseline: &Baseline, sample: &KeystrokeSample) -> RiskAssessment {
        let weights = &self.config.weights;

        let flight_dev = deviation(&sample.flight, baseline.flight_avg);
        let dwell_dev = deviation(&sample.dwell, baseline.dwell_avg);
        let bigram_dev = bigram_deviation(&baseline.bigram_avg, &sample.bigrams);
        let vector_dist = rhythm_distance(&baseline.rhythm_vector, &sample.rhythm);
        let cosine_sim = cosine_similarity(&baseline.rhythm_vector, &sample.rhythm);

        let risk_score = weights.flight * flight_dev
            + weights.dwell * dwell_dev
            + weights.bigram * bigram_dev
            + weights.rhythm * vector_dist;

        let threshold = dynamic_threshold(
            baseline.flight_std,
            self.config.floor_std,
            self.config.threshold_k,
        );

        RiskAssessment {
            flight_dev,
            dwell_dev,
            bigram_dev,
            vector_dist,
            cosine_sim,
            risk_score,
            threshold,
            status: RiskStatus::from_score(risk_score, threshold),
        }
    }
}

/// `max(flight_std, floor_std) * k`
pub fn dynamic_threshold(flight_std: f64, floor_std: f64, k: f64) -> f64 {
    flight_std.max(floor_std) * k
}

/// Absolute difference between the mean of `current` and `baseline_avg`.
/// An empty sequence has no deviation.
pub fn deviation(current: &[f64], baseline_avg: f64) -> f64 {
    mean(current)
        .map(|avg| (avg - baseline_avg).abs())
        .unwrap_or(0.0)
}

/// Mean absolute difference over the bigrams present in both profiles.
///
/// Returns 0 when no bigram is shared. The weight of this term is not spread
/// over the others in that case, so a phrase with no common bigrams scores
/// lower than one that shares a slow bigram.
pub fn bigram_deviation(
    baseline: &BTreeMap<String, f64>,
    current: &BTreeMap<String, Vec<f64>>,
) -> f64 {
    let diffs: Vec<f64> = current
        .iter()
        .filter_map(|(key, timings)| {
            let reference = baseline.get(key)?;
            mean(timings).map(|avg| (reference - avg).abs())
        })
        .collect();

    mean(&diffs).unwrap_or(0.0)
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Euclidean distance normalized by the square root of the vector length.
///
/// Vectors of different lengths are compared over their common prefix.
pub fn rhythm_distance(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    euclidean_distance(&a[..len], &b[..len]) / (len as f64).sqrt()
}

/// Cosine similarity, 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
