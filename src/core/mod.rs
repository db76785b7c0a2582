//! Core behavioral biometrics for the KeyTrust agent.
//!
//! This module contains:
//! - Timing feature extraction from typed phrases
//! - The registered baseline profile and its validation
//! - Risk scoring against the baseline
//!
//! Nothing in here performs I/O or knows about capture sources or event sinks.

pub mod baseline;
pub mod features;
pub mod risk;
pub mod stats;

// Re-export commonly used types
pub use baseline::{Baseline, BaselineError};
pub use features::{rhythm_vector, FeatureExtractor, KeystrokeSample};
pub use risk::{RiskAssessment, RiskBand, RiskEngine, RiskStatus};
