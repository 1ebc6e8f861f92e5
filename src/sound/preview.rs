//! Sound preview outside any alarm session.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use super::error::SoundError;
use super::source::{SoundLibrary, SoundSource};
use super::{AudioOutput, AudioTrack};

/// Plays one sound at a time for auditioning, independent of alarms.
///
/// A preview never touches the alarm session, its notification or the
/// alarm volume channel.
pub struct Previewer {
    library: SoundLibrary,
    output: Option<Arc<dyn AudioOutput>>,
    current: Mutex<Option<Box<dyn AudioTrack>>>,
}

impl Previewer {
    #[must_use]
    pub fn new(library: SoundLibrary, output: Option<Arc<dyn AudioOutput>>) -> Self {
        Self {
            library,
            output,
            current: Mutex::new(None),
        }
    }

    /// Starts previewing `name`, replacing any running preview.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::FileNotFound` for an unknown sound and a device
    /// error when no audio output is available.
    pub fn play(&self, name: &str) -> Result<SoundSource, SoundError> {
        let source = self.library.find(name).map_err(|e| match e {
            SoundError::InvalidName(name) => SoundError::FileNotFound(name),
            other => other,
        })?;
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| SoundError::DeviceNotAvailable("no audio output".to_string()))?;

        self.stop();

        let mut track = output.load(&source, 1.0)?;
        track.play_from_start(Box::new(|| debug!("Preview finished")))?;
        *self.lock() = Some(track);

        info!("Previewing sound '{}'", source.name());
        Ok(source)
    }

    /// Stops the running preview. Returns true if one was playing.
    pub fn stop(&self) -> bool {
        let track = self.lock().take();
        match track {
            Some(mut track) => {
                track.stop();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn AudioTrack>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Previewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Previewer")
            .field("library", &self.library)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{AudioEvent, MockAudioOutput};
    use tempfile::TempDir;

    fn previewer(files: &[&str]) -> (TempDir, MockAudioOutput, Previewer) {
        let dir = TempDir::new().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), b"fake audio").unwrap();
        }
        let output = MockAudioOutput::new();
        let previewer = Previewer::new(
            SoundLibrary::new(dir.path()),
            Some(Arc::new(output.clone()) as Arc<dyn AudioOutput>),
        );
        (dir, output, previewer)
    }

    #[test]
    fn test_unknown_sound_is_rejected() {
        let (_dir, output, previewer) = previewer(&[]);
        let err = previewer.play("athan_unknown").unwrap_err();
        assert_eq!(err.to_string(), "Sound file not found: athan_unknown");
        assert!(output.events().is_empty());
    }

    #[test]
    fn test_path_like_name_reads_as_not_found() {
        let (_dir, _output, previewer) = previewer(&[]);
        let err = previewer.play("../secret").unwrap_err();
        assert!(matches!(err, SoundError::FileNotFound(_)));
    }

    #[test]
    fn test_preview_replaces_previous_preview() {
        let (_dir, output, previewer) = previewer(&["adhan.mp3", "athan_makkah.mp3"]);
        previewer.play("adhan").unwrap();
        previewer.play("athan_makkah").unwrap();

        assert_eq!(
            output.events(),
            vec![
                AudioEvent::Load("adhan".into()),
                AudioEvent::Play("adhan".into()),
                AudioEvent::Release("adhan".into()),
                AudioEvent::Load("athan_makkah".into()),
                AudioEvent::Play("athan_makkah".into()),
            ]
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (_dir, output, previewer) = previewer(&["adhan.mp3"]);
        previewer.play("adhan").unwrap();
        assert!(previewer.stop());
        assert!(!previewer.stop());
        assert_eq!(output.live_tracks(), 0);
    }

    #[test]
    fn test_no_output_device() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("adhan.mp3"), b"x").unwrap();
        let previewer = Previewer::new(SoundLibrary::new(dir.path()), None);
        let err = previewer.play("adhan").unwrap_err();
        assert!(err.is_device_error());
    }
}
