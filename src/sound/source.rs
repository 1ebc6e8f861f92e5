//! Sound source management.
//!
//! Adhan recordings live as plain audio files in a sounds directory, named
//! after their identifier (`athan_makkah.mp3`). This module resolves
//! identifiers to files and exposes the known recording catalog.

use std::path::{Path, PathBuf};

use super::error::SoundError;
use crate::types::SoundInfo;

/// Sound played when neither the caller nor the preferences name one.
pub const DEFAULT_SOUND: &str = "athan_makkah";

/// Supported audio file extensions, in lookup order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "aiff", "flac", "ogg"];

/// Known Adhan recordings as `(identifier, label)` pairs.
pub const ADHAN_SOUNDS: &[(&str, &str)] = &[
    ("adhan", "Default Adhan"),
    ("athan_abed_albase6", "Abed Albasset"),
    ("athan_ahmad_nuyne3", "Ahmad Nuyne"),
    ("athan_alfajer_malek_chebae", "Al-Fajer - Malek Chebae"),
    ("athan_hamad_deghreri", "Hamad Deghreri"),
    ("athan_hamdan_almalki", "Hamdan Al-Malki"),
    ("athan_ibrahim_alarkani", "Ibrahim Al-Arkani"),
    ("athan_majed_alhamathani", "Majed Al-Hamathani"),
    ("athan_makkah", "Makkah Adhan"),
    ("athan_mansoor_azzahrani", "Mansoor Al-Zahrani"),
    ("athan_mishary_alafasi", "Mishary Al-Afasi"),
    ("athan_mohammad_almenshawy", "Mohammad Al-Menshawy"),
    ("athan_mohammad_ref3at", "Mohammad Refaat"),
    ("athan_nasser_alqatami", "Nasser Al-Qatami"),
    ("athan_suhaib_khatba", "Suhaib Khatba"),
];

/// Returns the catalog label of a sound identifier.
#[must_use]
pub fn label_for(name: &str) -> Option<&'static str> {
    ADHAN_SOUNDS
        .iter()
        .find(|(id, _)| *id == name)
        .map(|(_, label)| *label)
}

/// A playable sound file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundSource {
    name: String,
    path: PathBuf,
}

impl SoundSource {
    /// Creates a new sound source without touching the filesystem.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Returns the sound identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolves sound identifiers against a sounds directory.
#[derive(Debug, Clone)]
pub struct SoundLibrary {
    dir: PathBuf,
}

impl SoundLibrary {
    /// Creates a library rooted at `dir`. The directory may not exist yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the sounds directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Finds the playable file for a sound identifier.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::InvalidName` for identifiers that are not plain
    /// file stems and `SoundError::FileNotFound` when no supported file exists.
    pub fn find(&self, name: &str) -> Result<SoundSource, SoundError> {
        validate_name(name)?;

        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
            .map(|path| SoundSource::new(name, path))
            .ok_or_else(|| SoundError::FileNotFound(name.to_string()))
    }

    /// Scans the sounds directory for supported audio files.
    ///
    /// Returns an empty vector if the directory does not exist.
    #[must_use]
    pub fn discover(&self) -> Vec<SoundSource> {
        let mut sounds = Vec::new();

        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let file_path = entry.path();
                let Some(ext) = file_path.extension() else {
                    continue;
                };
                let ext_str = ext.to_string_lossy().to_lowercase();
                if !SUPPORTED_EXTENSIONS.contains(&ext_str.as_str()) {
                    continue;
                }
                if let Some(stem) = file_path.file_stem() {
                    sounds.push(SoundSource::new(stem.to_string_lossy(), file_path.clone()));
                }
            }
        }

        sounds.sort_by(|a, b| a.name().cmp(b.name()));
        sounds.dedup_by(|a, b| a.name() == b.name());
        sounds
    }

    /// Lists the catalog with installed marks, followed by any extra
    /// recordings found in the sounds directory.
    #[must_use]
    pub fn catalog(&self) -> Vec<SoundInfo> {
        let discovered = self.discover();

        let mut infos: Vec<SoundInfo> = ADHAN_SOUNDS
            .iter()
            .map(|(name, label)| SoundInfo {
                name: (*name).to_string(),
                label: (*label).to_string(),
                installed: discovered.iter().any(|s| s.name() == *name),
            })
            .collect();

        infos.extend(
            discovered
                .iter()
                .filter(|s| label_for(s.name()).is_none())
                .map(|s| SoundInfo {
                    name: s.name().to_string(),
                    label: s.name().to_string(),
                    installed: true,
                }),
        );

        infos
    }
}

fn validate_name(name: &str) -> Result<(), SoundError> {
    let invalid = name.is_empty()
        || name.contains(['/', '\\'])
        || name.contains("..")
        || name.starts_with('.');
    if invalid {
        return Err(SoundError::InvalidName(name.to_string()));
    }
    Ok(())
}
