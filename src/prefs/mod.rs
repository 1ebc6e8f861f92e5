//! Preference access for the alarm core.
//!
//! The owning application writes the preference store; the daemon only
//! reads it, and reads it fresh on every dispatcher activation. Malformed
//! or missing data never fails a read: absent toggles mean "enabled" and an
//! absent sound means [`DEFAULT_SOUND`].

mod store;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::warn;

pub use store::JsonPreferenceStore;

use crate::sound::DEFAULT_SOUND;
use crate::types::normalize_slot_key;

/// Preference key holding the selected sound identifier.
pub const SOUND_KEY: &str = "adhanSound";

/// Preference key holding the per-slot enablement map.
pub const TOGGLES_KEY: &str = "notificationToggles";

/// Point-in-time copy of the preferences the core consults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSnapshot {
    sound: Option<String>,
    toggles: HashMap<String, bool>,
}

impl PreferenceSnapshot {
    /// Builds a snapshot from explicit values. Toggle keys are normalized.
    #[must_use]
    pub fn new<K: AsRef<str>>(
        sound: Option<String>,
        toggles: impl IntoIterator<Item = (K, bool)>,
    ) -> Self {
        Self {
            sound,
            toggles: toggles
                .into_iter()
                .map(|(k, v)| (normalize_slot_key(k.as_ref()), v))
                .collect(),
        }
    }

    /// Parses a snapshot out of a JSON preference document.
    ///
    /// `notificationToggles` may be an object or a string containing one.
    /// Non-boolean toggle values count as enabled.
    #[must_use]
    pub fn from_json(document: &Value) -> Self {
        let sound = document
            .get(SOUND_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let toggles = match document.get(TOGGLES_KEY) {
            Some(Value::Object(map)) => parse_toggles(map),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => parse_toggles(&map),
                _ => {
                    warn!("Ignoring malformed {} string", TOGGLES_KEY);
                    HashMap::new()
                }
            },
            Some(Value::Null) | None => HashMap::new(),
            Some(_) => {
                warn!("Ignoring {} of unexpected type", TOGGLES_KEY);
                HashMap::new()
            }
        };

        Self { sound, toggles }
    }

    /// Returns whether alerts are enabled for a slot name.
    ///
    /// The name is normalized first, so `"Fajr (Test)"` reads the `fajr`
    /// toggle. Slots without a toggle are enabled.
    #[must_use]
    pub fn is_enabled(&self, slot_name: &str) -> bool {
        self.toggles
            .get(&normalize_slot_key(slot_name))
            .copied()
            .unwrap_or(true)
    }

    /// Returns the explicitly selected sound, if any.
    #[must_use]
    pub fn sound(&self) -> Option<&str> {
        self.sound.as_deref()
    }

    /// Returns the selected sound or [`DEFAULT_SOUND`].
    #[must_use]
    pub fn sound_or_default(&self) -> &str {
        self.sound().unwrap_or(DEFAULT_SOUND)
    }
}

fn parse_toggles(map: &serde_json::Map<String, Value>) -> HashMap<String, bool> {
    map.iter()
        .map(|(key, value)| {
            let enabled = value.as_bool().unwrap_or(true);
            (normalize_slot_key(key), enabled)
        })
        .collect()
}

/// Read-only access to the preference store.
pub trait PreferenceStore: Send + Sync {
    /// Reads the current preferences. Never fails; unreadable data yields
    /// defaults.
    fn snapshot(&self) -> PreferenceSnapshot;
}

/// In-memory preference store for testing.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    snapshot: Mutex<PreferenceSnapshot>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored preferences.
    pub fn set(&self, snapshot: PreferenceSnapshot) {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Sets a single slot toggle.
    pub fn set_enabled(&self, slot_name: &str, enabled: bool) {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .toggles
            .insert(normalize_slot_key(slot_name), enabled);
    }

    /// Sets the selected sound.
    pub fn set_sound(&self, sound: Option<&str>) {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sound = sound.map(str::to_string);
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn snapshot(&self) -> PreferenceSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
