//! JSON file preference store.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::{PreferenceSnapshot, PreferenceStore};

/// Reads preferences from a JSON object file on every snapshot.
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn snapshot(&self) -> PreferenceSnapshot {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No preference file at {:?}, using defaults", self.path);
                return PreferenceSnapshot::default();
            }
            Err(e) => {
                warn!("Failed to read preferences {:?}: {}", self.path, e);
                return PreferenceSnapshot::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(document) => PreferenceSnapshot::from_json(&document),
            Err(e) => {
                warn!("Malformed preferences {:?}: {}", self.path, e);
                PreferenceSnapshot::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let store = JsonPreferenceStore::new("/nonexistent/adhan/preferences.json");
        assert_eq!(store.snapshot(), PreferenceSnapshot::default());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "not json at all").unwrap();

        let snapshot = JsonPreferenceStore::new(&path).snapshot();
        assert!(snapshot.is_enabled("fajr"));
        assert_eq!(snapshot.sound_or_default(), "athan_makkah");
    }

    #[test]
    fn test_reads_fresh_on_every_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        let store = JsonPreferenceStore::new(&path);

        std::fs::write(&path, r#"{"notificationToggles":{"fajr":true}}"#).unwrap();
        assert!(store.snapshot().is_enabled("fajr"));

        std::fs::write(&path, r#"{"notificationToggles":{"fajr":false}}"#).unwrap();
        assert!(!store.snapshot().is_enabled("fajr"));
    }
}
