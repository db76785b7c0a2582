//! Configuration for the KeyTrust agent.
//!
//! Every tunable constant of the risk engine and the session lifecycle lives here.
//! A configuration is validated once, when it is loaded or when an agent is built
//! from it; the scoring code never re-checks it per call.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tolerance for the weight-sum check.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// File name of the persisted baseline inside `data_path`.
pub const BASELINE_FILE: &str = "baseline_profile.json";

/// File name of the append-only security event log inside `data_path`.
pub const SECURITY_LOG_FILE: &str = "security_log.jsonl";

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Risk formula weights and threshold parameters
    pub risk: RiskConfig,

    /// Feature extraction parameters
    pub features: FeatureConfig,

    /// Minimum number of flight intervals required to register a baseline
    pub min_samples: usize,

    /// Delay between continuous re-verification prompts
    #[serde(with = "duration_serde")]
    pub reverify_interval: Duration,

    /// How long a capture source may wait for the user to type
    #[serde(with = "duration_serde")]
    pub capture_timeout: Duration,

    /// Phrases shown to the user
    pub phrases: PhraseConfig,

    /// Directory holding the baseline profile and the security log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keytrust-agent");

        Self {
            risk: RiskConfig::default(),
            features: FeatureConfig::default(),
            min_samples: 3,
            reverify_interval: Duration::from_secs(30),
            capture_timeout: Duration::from_secs(90),
            phrases: PhraseConfig::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults. A file that exists is parsed and
    /// validated; it is never patched up with default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keytrust-agent")
            .join("config.json")
    }

    /// Path of the persisted baseline profile.
    pub fn baseline_path(&self) -> PathBuf {
        self.data_path.join(BASELINE_FILE)
    }

    /// Path of the security event log.
    pub fn security_log_path(&self) -> PathBuf {
        self.data_path.join(SECURITY_LOG_FILE)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Check every constraint the scoring and session code relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk.validate()?;
        self.features.validate()?;

        if self.min_samples == 0 {
            return Err(ConfigError::InvalidValue(
                "min_samples must be at least 1".to_string(),
            ));
        }
        if self.reverify_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "reverify_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Weights of the four risk components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// W1, flight time deviation
    pub flight: f64,
    /// W2, dwell time deviation
    pub dwell: f64,
    /// W3, bigram timing deviation
    pub bigram: f64,
    /// W4, rhythm vector distance
    pub rhythm: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            flight: 0.30,
            dwell: 0.20,
            bigram: 0.30,
            rhythm: 0.20,
        }
    }
}

impl RiskWeights {
    pub fn sum(&self) -> f64 {
        self.flight + self.dwell + self.bigram + self.rhythm
    }

    /// Weights must be finite, non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.flight, self.dwell, self.bigram, self.rhythm];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "risk weights must be finite and non-negative, got {all:?}"
            )));
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Risk scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    /// Multiplier applied to the baseline's flight standard deviation
    pub threshold_k: f64,
    /// Lower bound on the standard deviation used for the threshold
    pub floor_std: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            threshold_k: 2.5,
            floor_std: 0.02,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if !self.threshold_k.is_finite() || self.threshold_k <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "threshold_k must be positive, got {}",
                self.threshold_k
            )));
        }
        if !self.floor_std.is_finite() || self.floor_std <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "floor_std must be positive, got {}",
                self.floor_std
            )));
        }
        Ok(())
    }
}

/// Feature extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Flight intervals longer than this (seconds) are deliberate pauses
    pub pause_cutoff_secs: f64,
    /// Length N of the rhythm vector
    pub rhythm_bins: usize,
    /// Optional allow-list of bigrams to track; `None` tracks every pair
    pub bigram_filter: Option<Vec<String>>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            pause_cutoff_secs: 3.0,
            rhythm_bins: 5,
            bigram_filter: None,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pause_cutoff_secs.is_finite() || self.pause_cutoff_secs <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "pause_cutoff_secs must be positive, got {}",
                self.pause_cutoff_secs
            )));
        }
        if self.rhythm_bins == 0 {
            return Err(ConfigError::InvalidValue(
                "rhythm_bins must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Phrases the user is asked to type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseConfig {
    pub registration: String,
    pub verification: String,
    pub reverification: String,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            registration: "zero trust systems rely on continuous verification".to_string(),
            verification: "continuous authentication enhances security posture".to_string(),
            reverification: "trust no one verify always".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    /// Risk weights do not sum to 1.0
    WeightSum(f64),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::WeightSum(sum) => {
                write!(f, "Risk weights must sum to 1.0, got {sum}")
            }
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
