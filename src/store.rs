//! Persistence of the baseline profile.
//!
//! The profile is a single pretty-printed JSON file. Saves go through a
//! temporary file and a rename so a crash never leaves half a profile behind.

use crate::core::baseline::{Baseline, BaselineError};
use std::path::{Path, PathBuf};

/// Reads and writes the baseline profile file.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
    rhythm_len: usize,
}

impl BaselineStore {
    /// `rhythm_len` is the configured rhythm vector length every stored
    /// profile must match.
    pub fn new(path: impl Into<PathBuf>, rhythm_len: usize) -> Self {
        Self {
            path: path.into(),
            rhythm_len,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Validate and persist a baseline, replacing any previous profile.
    pub fn save(&self, baseline: &Baseline) -> Result<(), BaselineError> {
        baseline.validate(self.rhythm_len)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BaselineError::Write(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(baseline)
            .map_err(|e| BaselineError::Write(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| BaselineError::Write(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| BaselineError::Write(e.to_string()))?;

        tracing::info!(path = %self.path.display(), "baseline profile saved");
        Ok(())
    }

    /// Load and validate the stored baseline.
    pub fn load(&self) -> Result<Baseline, BaselineError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BaselineError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(BaselineError::Corrupt(e.to_string())),
        };

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| BaselineError::Corrupt(e.to_string()))?;

        let baseline = Baseline::from_value(&value, self.rhythm_len)?;
        tracing::debug!(path = %self.path.display(), "baseline profile loaded");
        Ok(baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn baseline() -> Baseline {
        let mut bigram_avg = BTreeMap::new();
        bigram_avg.insert("ze".to_string(), 0.1234567891234);
        bigram_avg.insert("ro".to_string(), 0.2);
        Baseline {
            flight_avg: 0.183_333_333_333_333_3,
            flight_std: 0.041_231_056_256_176_6,
            dwell_avg: 0.09,
            dwell_std: 0.012,
            bigram_avg,
            rhythm_vector: vec![0.17, 0.18, 0.19, 0.2, 0.1 + 0.2],
        }
    }

    #[test]
    fn test_save_then_load_is_equal() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path().join("profile").join("baseline.json"), 5);
        assert!(!store.exists());

        store.save(&baseline()).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), baseline());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path().join("baseline.json"), 5);
        assert!(matches!(store.load(), Err(BaselineError::NotFound(_))));
    }

    #[test]
    fn test_load_unparseable_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = BaselineStore::new(&path, 5);
        assert!(matches!(store.load(), Err(BaselineError::Corrupt(_))));
    }

    #[test]
    fn test_load_missing_field_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        std::fs::write(
            &path,
            r#"{"flight_avg":0.18,"flight_std":0.04,"dwell_avg":0.09,
                "bigram_avg":{},"rhythm_vector":[0.1,0.1,0.1,0.1,0.1]}"#,
        )
        .unwrap();
        let store = BaselineStore::new(&path, 5);
        match store.load() {
            Err(BaselineError::Invalid { field, .. }) => assert_eq!(field, "dwell_std"),
            other => panic!("expected invalid baseline, got {other:?}"),
        }
    }

    #[test]
    fn test_save_rejects_wrong_rhythm_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path().join("baseline.json"), 8);
        assert!(matches!(
            store.save(&baseline()),
            Err(BaselineError::Invalid { .. })
        ));
        assert!(!store.exists());
    }

    #[test]
    fn test_save_under_regular_file_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = BaselineStore::new(blocker.join("sub").join("baseline.json"), 5);
        assert!(matches!(
            store.save(&baseline()),
            Err(BaselineError::Write(_))
        ));
        assert!(!store.exists());
        // only the blocking file remains
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_rejects_other_rhythm_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        BaselineStore::new(&path, 5).save(&baseline()).unwrap();
        assert!(matches!(
            BaselineStore::new(&path, 6).load(),
            Err(BaselineError::Invalid { .. })
        ));
    }
}
