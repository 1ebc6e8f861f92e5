//! Sound playback system for the Adhan daemon.
//!
//! This module provides audio delivery capabilities, including:
//!
//! - Sound identifier resolution against a sounds directory
//! - Replayable audio tracks with a completion callback
//! - The alarm volume channel and its audible floor
//! - Sound preview outside any alarm session
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   SoundLibrary   │────▶│  sounds dir      │
//! └────────┬─────────┘     │  (<name>.mp3)    │
//!          │ SoundSource   └──────────────────┘
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │   AudioOutput    │────▶│  audio thread    │
//! │   (load)         │     │  (OutputStream)  │
//! └────────┬─────────┘     └──────────────────┘
//!          │ Box<dyn AudioTrack>
//!          ▼
//!   play_from_start / stop
//! ```

mod error;
mod player;
mod preview;
mod source;
mod volume;

use std::sync::{Arc, Mutex};

pub use error::SoundError;
pub use player::{try_create_output, RodioAudioOutput};
pub use preview::Previewer;
pub use source::{
    label_for, SoundLibrary, SoundSource, ADHAN_SOUNDS, DEFAULT_SOUND, SUPPORTED_EXTENSIONS,
};
pub use volume::{ensure_audible_floor, AlarmVolume, SoftwareAlarmVolume};

/// Callback invoked once when a track reaches its natural end.
pub type FinishedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A loaded, replayable sound bound to the audio output.
///
/// The track owns its output resource until `stop` is called or it is
/// dropped.
pub trait AudioTrack: Send {
    /// Starts playback from the beginning.
    ///
    /// `on_finished` runs on an audio-side thread when playback ends
    /// naturally. It does not run when the track is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the sound cannot be decoded again.
    fn play_from_start(&mut self, on_finished: FinishedCallback) -> Result<(), SoundError>;

    /// Stops playback and releases the output resource. Idempotent.
    fn stop(&mut self);
}

/// Audio output device abstraction.
///
/// Implemented by [`RodioAudioOutput`] and [`MockAudioOutput`].
pub trait AudioOutput: Send + Sync {
    /// Loads a sound at the given gain (0.0 to 1.0) without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded, or if the
    /// device cannot provide an output sink.
    fn load(&self, source: &SoundSource, gain: f32) -> Result<Box<dyn AudioTrack>, SoundError>;
}

// ============================================================================
// Mock
// ============================================================================

/// Observable audio event recorded by [`MockAudioOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Load(String),
    Play(String),
    Release(String),
}

#[derive(Default)]
struct MockAudioState {
    events: Vec<AudioEvent>,
    gains: Vec<f32>,
    pending_finish: Option<FinishedCallback>,
    fail_load: bool,
    live_tracks: usize,
}

/// Mock audio output for testing.
///
/// Natural completion is simulated with [`MockAudioOutput::finish_playback`].
#[derive(Clone, Default)]
pub struct MockAudioOutput {
    state: Arc<Mutex<MockAudioState>>,
}

impl std::fmt::Debug for MockAudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAudioOutput").finish_non_exhaustive()
    }
}

impl MockAudioOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.state.lock().unwrap().fail_load = fail;
    }

    #[must_use]
    pub fn events(&self) -> Vec<AudioEvent> {
        self.state.lock().unwrap().events.clone()
    }

    #[must_use]
    pub fn gains(&self) -> Vec<f32> {
        self.state.lock().unwrap().gains.clone()
    }

    #[must_use]
    pub fn play_count(&self) -> usize {
        self.count(|e| matches!(e, AudioEvent::Play(_)))
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.count(|e| matches!(e, AudioEvent::Release(_)))
    }

    /// Number of loaded tracks that have not been released.
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.state.lock().unwrap().live_tracks
    }

    /// Returns true if a playing track is waiting for its end.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().pending_finish.is_some()
    }

    /// Ends the current playback naturally, running its completion callback.
    ///
    /// Returns false if nothing was playing.
    pub fn finish_playback(&self) -> bool {
        let callback = self.state.lock().unwrap().pending_finish.take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    fn count(&self, predicate: impl Fn(&AudioEvent) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl AudioOutput for MockAudioOutput {
    fn load(&self, source: &SoundSource, gain: f32) -> Result<Box<dyn AudioTrack>, SoundError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_load {
            return Err(SoundError::DecodeError("Mock failure".to_string()));
        }
        state.events.push(AudioEvent::Load(source.name().to_string()));
        state.gains.push(gain);
        state.live_tracks += 1;

        Ok(Box::new(MockTrack {
            name: source.name().to_string(),
            state: Arc::clone(&self.state),
            released: false,
        }))
    }
}

struct MockTrack {
    name: String,
    state: Arc<Mutex<MockAudioState>>,
    released: bool,
}

impl AudioTrack for MockTrack {
    fn play_from_start(&mut self, on_finished: FinishedCallback) -> Result<(), SoundError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(AudioEvent::Play(self.name.clone()));
        state.pending_finish = Some(on_finished);
        Ok(())
    }

    fn stop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = self.state.lock().unwrap();
        state.events.push(AudioEvent::Release(self.name.clone()));
        state.pending_finish = None;
        state.live_tracks -= 1;
    }
}

impl Drop for MockTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str) -> SoundSource {
        SoundSource::new(name, format!("/sounds/{}.mp3", name))
    }

    #[test]
    fn test_mock_records_load_play_release() {
        let output = MockAudioOutput::new();
        let mut track = output.load(&source("adhan"), 0.5).unwrap();
        track.play_from_start(Box::new(|| {})).unwrap();
        track.stop();
        track.stop();

        assert_eq!(
            output.events(),
            vec![
                AudioEvent::Load("adhan".into()),
                AudioEvent::Play("adhan".into()),
                AudioEvent::Release("adhan".into()),
            ]
        );
        assert_eq!(output.gains(), vec![0.5]);
        assert_eq!(output.live_tracks(), 0);
    }

    #[test]
    fn test_mock_releases_on_drop() {
        let output = MockAudioOutput::new();
        let track = output.load(&source("adhan"), 1.0).unwrap();
        assert_eq!(output.live_tracks(), 1);
        drop(track);
        assert_eq!(output.live_tracks(), 0);
        assert_eq!(output.release_count(), 1);
    }

    #[test]
    fn test_mock_finish_runs_callback_once() {
        let output = MockAudioOutput::new();
        let mut track = output.load(&source("adhan"), 1.0).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        track
            .play_from_start(Box::new(move || tx.send(()).unwrap()))
            .unwrap();

        assert!(output.is_playing());
        assert!(output.finish_playback());
        assert!(rx.try_recv().is_ok());
        assert!(!output.finish_playback());
    }

    #[test]
    fn test_mock_stop_discards_pending_callback() {
        let output = MockAudioOutput::new();
        let mut track = output.load(&source("adhan"), 1.0).unwrap();
        track.play_from_start(Box::new(|| panic!("must not run"))).unwrap();
        track.stop();
        assert!(!output.finish_playback());
    }

    #[test]
    fn test_mock_load_failure() {
        let output = MockAudioOutput::new();
        output.set_fail_load(true);
        assert!(output.load(&source("adhan"), 1.0).is_err());
        assert!(output.events().is_empty());
    }
}
