//! Timing feature extraction from typed phrases.
//!
//! Turns the strokes of one phrase into flight times, dwell times, per-bigram
//! flight times and a fixed-length rhythm vector. Extraction never fails:
//! malformed strokes are skipped and an empty phrase yields an empty sample,
//! leaving minimum-sample policy to the caller.

use crate::collector::types::KeyStroke;
use crate::config::FeatureConfig;
use crate::core::stats::mean;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timing features of one typed phrase. All values are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeSample {
    /// Release of key i to press of key i+1, pauses removed
    pub flight: Vec<f64>,
    /// How long each key stayed down
    pub dwell: Vec<f64>,
    /// Flight times bucketed by the (lower-cased) character pair
    pub bigrams: BTreeMap<String, Vec<f64>>,
    /// Flight times binned by position into a fixed number of buckets
    pub rhythm: Vec<f64>,
}

impl KeystrokeSample {
    /// Number of usable flight intervals.
    pub fn flight_count(&self) -> usize {
        self.flight.len()
    }

    /// A sample without flight intervals carries no behavioral signal.
    pub fn is_empty(&self) -> bool {
        self.flight.is_empty()
    }

    /// Total number of bigram observations across all pairs.
    pub fn bigram_observations(&self) -> usize {
        self.bigrams.values().map(Vec::len).sum()
    }
}

/// Converts strokes into a [`KeystrokeSample`].
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Extract timing features from the strokes of one phrase.
    pub fn extract(&self, strokes: &[KeyStroke]) -> KeystrokeSample {
        let cutoff = self.config.pause_cutoff_secs;

        let dwell: Vec<f64> = strokes
            .iter()
            .filter_map(|s| seconds_between(s.pressed_at, s.released_at))
            .filter(|d| (0.0..=cutoff).contains(d))
            .collect();

        let mut flight = Vec::new();
        let mut bigrams: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for pair in strokes.windows(2) {
            let Some(gap) = seconds_between(pair[0].released_at, pair[1].pressed_at) else {
                continue;
            };
            // Rollover: the next key went down before this one came up.
            let gap = gap.max(0.0);
            if gap > cutoff {
                continue;
            }
            flight.push(gap);

            let key = bigram_key(pair[0].key, pair[1].key);
            if self.tracks_bigram(&key) {
                bigrams.entry(key).or_default().push(gap);
            }
        }

        let rhythm = rhythm_vector(&flight, self.config.rhythm_bins);

        KeystrokeSample {
            flight,
            dwell,
            bigrams,
            rhythm,
        }
    }

    fn tracks_bigram(&self, key: &str) -> bool {
        match &self.config.bigram_filter {
            Some(allowed) => allowed.iter().any(|b| b.to_lowercase() == key),
            None => true,
        }
    }
}

/// Bin flight times into `bins` buckets by proportional position.
///
/// Interval `i` of `len` lands in bucket `i * bins / len`, so the first bucket
/// holds the first `ceil(len / bins)` intervals. Each bucket is the mean of its
/// intervals; a bucket with no intervals takes the overall mean flight time.
pub fn rhythm_vector(flight: &[f64], bins: usize) -> Vec<f64> {
    if bins == 0 {
        return Vec::new();
    }

    let overall = mean(flight).unwrap_or(0.0);
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); bins];
    for (i, &value) in flight.iter().enumerate() {
        buckets[i * bins / flight.len()].push(value);
    }

    buckets
        .iter()
        .map(|bucket| mean(bucket).unwrap_or(overall))
        .collect()
}

fn bigram_key(first: char, second: char) -> String {
    first.to_lowercase().chain(second.to_lowercase()).collect()
}

/// Signed seconds from `from` to `to`, `None` if the span overflows.
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<f64> {
    (to - from)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Type `text` with a fixed dwell and a fixed release-to-press gap (ms).
    fn typed(text: &str, dwell_ms: i64, flight_ms: i64) -> Vec<KeyStroke> {
        let base = Utc::now();
        let mut at = base;
        text.chars()
            .map(|key| {
                let stroke = KeyStroke::new(key, at, at + Duration::milliseconds(dwell_ms));
                at = stroke.released_at + Duration::milliseconds(flight_ms);
                stroke
            })
            .collect()
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(FeatureConfig::default())
    }

    #[test]
    fn test_extract_empty() {
        let sample = extractor().extract(&[]);
        assert!(sample.is_empty());
        assert!(sample.dwell.is_empty());
        assert!(sample.bigrams.is_empty());
        assert_eq!(sample.rhythm, vec![0.0; 5]);
    }

    #[test]
    fn test_extract_single_key_has_dwell_only() {
        let sample = extractor().extract(&typed("a", 90, 0));
        assert!(sample.flight.is_empty());
        assert_eq!(sample.dwell, vec![0.09]);
    }

    #[test]
    fn test_extract_flight_and_dwell() {
        let sample = extractor().extract(&typed("hello", 80, 150));
        assert_eq!(sample.flight_count(), 4);
        assert!(sample.flight.iter().all(|&f| f == 0.15));
        assert_eq!(sample.dwell.len(), 5);
        assert!(sample.dwell.iter().all(|&d| d == 0.08));
    }

    #[test]
    fn test_bigrams_accumulate_and_fold_case() {
        let sample = extractor().extract(&typed("ThThe", 80, 120));
        // pairs: th, ht, th, he
        assert_eq!(sample.bigrams["th"], vec![0.12, 0.12]);
        assert_eq!(sample.bigrams["ht"], vec![0.12]);
        assert_eq!(sample.bigrams["he"], vec![0.12]);
        assert_eq!(sample.bigram_observations(), 4);
    }

    #[test]
    fn test_bigram_filter() {
        let extractor = FeatureExtractor::new(FeatureConfig {
            bigram_filter: Some(vec!["TH".to_string()]),
            ..FeatureConfig::default()
        });
        let sample = extractor.extract(&typed("the", 80, 120));
        assert_eq!(sample.bigrams.len(), 1);
        assert!(sample.bigrams.contains_key("th"));
        // filtered bigrams still count as flight time
        assert_eq!(sample.flight_count(), 2);
    }

    #[test]
    fn test_pause_cutoff_excludes_flight_and_bigram() {
        let base = Utc::now();
        let strokes = vec![
            KeyStroke::new('a', base, base + Duration::milliseconds(80)),
            KeyStroke::new(
                'b',
                base + Duration::milliseconds(200),
                base + Duration::milliseconds(280),
            ),
            // 4 s pause before 'c'
            KeyStroke::new(
                'c',
                base + Duration::milliseconds(4280),
                base + Duration::milliseconds(4360),
            ),
        ];
        let sample = extractor().extract(&strokes);
        assert_eq!(sample.flight, vec![0.12]);
        assert!(sample.bigrams.contains_key("ab"));
        assert!(!sample.bigrams.contains_key("bc"));
        assert_eq!(sample.dwell.len(), 3);
    }

    #[test]
    fn test_rollover_records_zero_flight() {
        let base = Utc::now();
        let strokes = vec![
            KeyStroke::new('i', base, base + Duration::milliseconds(120)),
            KeyStroke::new(
                'n',
                base + Duration::milliseconds(90),
                base + Duration::milliseconds(170),
            ),
        ];
        let sample = extractor().extract(&strokes);
        assert_eq!(sample.flight, vec![0.0]);
        assert_eq!(sample.bigrams["in"], vec![0.0]);
    }

    #[test]
    fn test_malformed_dwell_is_skipped() {
        let base = Utc::now();
        // released before pressed
        let strokes = vec![KeyStroke::new('x', base, base - Duration::milliseconds(10))];
        let sample = extractor().extract(&strokes);
        assert!(sample.dwell.is_empty());
        assert!(sample.is_empty());
    }

    #[test]
    fn test_rhythm_vector_proportional_bins() {
        let flight = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        let rhythm = rhythm_vector(&flight, 5);
        // buckets: [0,1] [2] [3,4] [5] [6]
        let expected = [0.15, 0.3, 0.45, 0.6, 0.7];
        assert_eq!(rhythm.len(), 5);
        for (got, want) in rhythm.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn test_rhythm_vector_empty_bins_take_overall_mean() {
        let flight = [0.1, 0.2, 0.3];
        let rhythm = rhythm_vector(&flight, 5);
        // buckets: [0] [1] [] [2] []
        let overall = 0.2;
        assert!((rhythm[0] - 0.1).abs() < 1e-12);
        assert!((rhythm[1] - 0.2).abs() < 1e-12);
        assert!((rhythm[2] - overall).abs() < 1e-12);
        assert!((rhythm[3] - 0.3).abs() < 1e-12);
        assert!((rhythm[4] - overall).abs() < 1e-12);
    }

    #[test]
    fn test_rhythm_vector_length_is_fixed() {
        for len in 0..12 {
            let flight: Vec<f64> = (0..len).map(|i| i as f64 * 0.01).collect();
            assert_eq!(rhythm_vector(&flight, 5).len(), 5);
        }
        assert!(rhythm_vector(&[0.1], 0).is_empty());
    }
}
