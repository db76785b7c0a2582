//! The registered typing profile.
//!
//! A [`Baseline`] is built once from a registration sample and never changes
//! afterwards. Loading one back is strict: every field must be present with the
//! right type, and nothing is ever filled in with a default.

use crate::core::features::KeystrokeSample;
use crate::core::stats::{mean, std_dev};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Statistical summary of the registered user's typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub flight_avg: f64,
    pub flight_std: f64,
    pub dwell_avg: f64,
    pub dwell_std: f64,
    pub bigram_avg: BTreeMap<String, f64>,
    pub rhythm_vector: Vec<f64>,
}

impl Baseline {
    /// Build a baseline from a registration sample.
    ///
    /// Fails with [`BaselineError::InsufficientData`] when the sample has fewer
    /// than `min_samples` flight intervals.
    pub fn from_sample(
        sample: &KeystrokeSample,
        min_samples: usize,
    ) -> Result<Self, BaselineError> {
        if sample.flight_count() < min_samples {
            return Err(BaselineError::InsufficientData {
                found: sample.flight_count(),
                required: min_samples,
            });
        }

        let bigram_avg = sample
            .bigrams
            .iter()
            .filter_map(|(key, timings)| mean(timings).map(|avg| (key.clone(), avg)))
            .collect();

        Ok(Self {
            flight_avg: mean(&sample.flight).unwrap_or(0.0),
            flight_std: std_dev(&sample.flight),
            dwell_avg: mean(&sample.dwell).unwrap_or(0.0),
            dwell_std: std_dev(&sample.dwell),
            bigram_avg,
            rhythm_vector: sample.rhythm.clone(),
        })
    }

    /// Check the record invariants: finite non-negative statistics and a
    /// rhythm vector of exactly `rhythm_len` values.
    pub fn validate(&self, rhythm_len: usize) -> Result<(), BaselineError> {
        let scalars = [
            ("flight_avg", self.flight_avg),
            ("flight_std", self.flight_std),
            ("dwell_avg", self.dwell_avg),
            ("dwell_std", self.dwell_std),
        ];
        for (field, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(BaselineError::invalid(
                    field,
                    format!("expected a finite value >= 0, got {value}"),
                ));
            }
        }

        if let Some((key, value)) = self.bigram_avg.iter().find(|(_, v)| !v.is_finite()) {
            return Err(BaselineError::invalid(
                format!("bigram_avg.{key}"),
                format!("expected a finite value, got {value}"),
            ));
        }

        if self.rhythm_vector.len() != rhythm_len {
            return Err(BaselineError::invalid(
                "rhythm_vector",
                format!(
                    "expected {rhythm_len} values, got {}",
                    self.rhythm_vector.len()
                ),
            ));
        }
        if self.rhythm_vector.iter().any(|v| !v.is_finite()) {
            return Err(BaselineError::invalid(
                "rhythm_vector",
                "contains a non-finite value",
            ));
        }

        Ok(())
    }

    /// Build a baseline from a parsed JSON record, checking each field.
    pub fn from_value(value: &Value, rhythm_len: usize) -> Result<Self, BaselineError> {
        let record = value
            .as_object()
            .ok_or_else(|| BaselineError::invalid("record", "expected a JSON object"))?;

        let baseline = Self {
            flight_avg: number_field(record, "flight_avg")?,
            flight_std: number_field(record, "flight_std")?,
            dwell_avg: number_field(record, "dwell_avg")?,
            dwell_std: number_field(record, "dwell_std")?,
            bigram_avg: bigram_field(record)?,
            rhythm_vector: rhythm_field(record)?,
        };
        baseline.validate(rhythm_len)?;
        Ok(baseline)
    }
}

fn required<'a>(record: &'a Map<String, Value>, field: &str) -> Result<&'a Value, BaselineError> {
    record
        .get(field)
        .ok_or_else(|| BaselineError::invalid(field, "missing"))
}

fn number_field(record: &Map<String, Value>, field: &str) -> Result<f64, BaselineError> {
    required(record, field)?
        .as_f64()
        .ok_or_else(|| BaselineError::invalid(field, "expected a number"))
}

fn bigram_field(record: &Map<String, Value>) -> Result<BTreeMap<String, f64>, BaselineError> {
    let map = required(record, "bigram_avg")?
        .as_object()
        .ok_or_else(|| BaselineError::invalid("bigram_avg", "expected an object"))?;

    map.iter()
        .map(|(key, value)| {
            value
                .as_f64()
                .map(|avg| (key.clone(), avg))
                .ok_or_else(|| {
                    BaselineError::invalid(format!("bigram_avg.{key}"), "expected a number")
                })
        })
        .collect()
}

fn rhythm_field(record: &Map<String, Value>) -> Result<Vec<f64>, BaselineError> {
    let values = required(record, "rhythm_vector")?
        .as_array()
        .ok_or_else(|| BaselineError::invalid("rhythm_vector", "expected an array"))?;

    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().ok_or_else(|| {
                BaselineError::invalid(format!("rhythm_vector[{i}]"), "expected a number")
            })
        })
        .collect()
}

/// Errors raised when creating, loading or saving a baseline.
#[derive(Debug)]
pub enum BaselineError {
    /// Too few flight intervals to build a profile
    InsufficientData { found: usize, required: usize },
    /// No profile has been registered yet
    NotFound(PathBuf),
    /// The record parsed but violates the schema
    Invalid { field: String, reason: String },
    /// The stored profile cannot be read or parsed at all
    Corrupt(String),
    /// The profile could not be written
    Write(String),
}

impl BaselineError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BaselineError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for BaselineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineError::InsufficientData { found, required } => write!(
                f,
                "Insufficient keystroke data: {found} flight intervals, need at least {required}"
            ),
            BaselineError::NotFound(path) => {
                write!(f, "No baseline profile found at {}", path.display())
            }
            BaselineError::Invalid { field, reason } => {
                write!(f, "Invalid baseline profile: {field}: {reason}")
            }
            BaselineError::Corrupt(e) => write!(f, "Corrupt baseline profile: {e}"),
            BaselineError::Write(e) => write!(f, "Failed to write baseline profile: {e}"),
        }
    }
}

impl std::error::Error for BaselineError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(flight: Vec<f64>, dwell: Vec<f64>) -> KeystrokeSample {
        let mut bigrams = BTreeMap::new();
        bigrams.insert("ze".to_string(), vec![0.10, 0.20]);
        bigrams.insert("er".to_string(), vec![0.15]);
        KeystrokeSample {
            rhythm: crate::core::features::rhythm_vector(&flight, 5),
            flight,
            dwell,
            bigrams,
        }
    }

    fn record() -> Value {
        json!({
            "flight_avg": 0.18,
            "flight_std": 0.04,
            "dwell_avg": 0.09,
            "dwell_std": 0.01,
            "bigram_avg": { "th": 0.12, "he": 0.2 },
            "rhythm_vector": [0.18, 0.18, 0.18, 0.18, 0.18]
        })
    }

    #[test]
    fn test_from_sample() {
        let baseline =
            Baseline::from_sample(&sample(vec![0.1, 0.2, 0.3], vec![0.08, 0.1]), 3).unwrap();
        assert!((baseline.flight_avg - 0.2).abs() < 1e-12);
        assert!((baseline.flight_std - 0.1).abs() < 1e-12);
        assert!((baseline.dwell_avg - 0.09).abs() < 1e-12);
        assert!((baseline.bigram_avg["ze"] - 0.15).abs() < 1e-12);
        assert_eq!(baseline.bigram_avg["er"], 0.15);
        assert_eq!(baseline.rhythm_vector.len(), 5);
        assert!(baseline.validate(5).is_ok());
    }

    #[test]
    fn test_from_sample_insufficient_data() {
        let result = Baseline::from_sample(&sample(vec![0.1, 0.2], vec![0.08]), 3);
        assert!(matches!(
            result,
            Err(BaselineError::InsufficientData {
                found: 2,
                required: 3
            })
        ));

        let empty = Baseline::from_sample(&KeystrokeSample::default(), 3);
        assert!(matches!(
            empty,
            Err(BaselineError::InsufficientData { found: 0, .. })
        ));
    }

    #[test]
    fn test_from_value() {
        let baseline = Baseline::from_value(&record(), 5).unwrap();
        assert_eq!(baseline.flight_avg, 0.18);
        assert_eq!(baseline.dwell_std, 0.01);
        assert_eq!(baseline.bigram_avg.len(), 2);
        assert_eq!(baseline.rhythm_vector, vec![0.18; 5]);
    }

    #[test]
    fn test_from_value_missing_dwell_std() {
        let mut value = record();
        value.as_object_mut().unwrap().remove("dwell_std");
        match Baseline::from_value(&value, 5) {
            Err(BaselineError::Invalid { field, .. }) => assert_eq!(field, "dwell_std"),
            other => panic!("expected invalid baseline, got {other:?}"),
        }
    }

    #[test]
    fn test_from_value_wrong_types() {
        let mut value = record();
        value["flight_avg"] = json!("0.18");
        assert!(matches!(
            Baseline::from_value(&value, 5),
            Err(BaselineError::Invalid { .. })
        ));

        let mut value = record();
        value["bigram_avg"] = json!({ "th": "fast" });
        match Baseline::from_value(&value, 5) {
            Err(BaselineError::Invalid { field, .. }) => assert_eq!(field, "bigram_avg.th"),
            other => panic!("expected invalid baseline, got {other:?}"),
        }

        let mut value = record();
        value["bigram_avg"] = json!([0.1]);
        assert!(matches!(
            Baseline::from_value(&value, 5),
            Err(BaselineError::Invalid { .. })
        ));

        assert!(matches!(
            Baseline::from_value(&json!([1, 2, 3]), 5),
            Err(BaselineError::Invalid { .. })
        ));
    }

    #[test]
    fn test_from_value_rhythm_length() {
        let mut value = record();
        value["rhythm_vector"] = json!([0.1, 0.2]);
        match Baseline::from_value(&value, 5) {
            Err(BaselineError::Invalid { field, .. }) => assert_eq!(field, "rhythm_vector"),
            other => panic!("expected invalid baseline, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_negative_std() {
        let mut baseline = Baseline::from_value(&record(), 5).unwrap();
        baseline.flight_std = -0.1;
        assert!(matches!(
            baseline.validate(5),
            Err(BaselineError::Invalid { .. })
        ));
    }
}
