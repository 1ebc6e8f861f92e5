//! Audio delivery state machine.
//!
//! One playback session exists at a time:
//!
//! ```text
//! Idle ──start──▶ Preparing ──loaded──▶ Playing ──end, loop < MAX──▶ Playing
//!                    │                     │
//!                    │ dismiss / error      ├─end, loop == MAX──▶ Completed ──▶ Idle
//!                    ▼                     │
//!               Dismissed / Completed ◀────┘ dismiss
//! ```
//!
//! Leaving a session always releases its audio track. Completion callbacks
//! arrive from the audio thread tagged with the session id; callbacks for
//! a session that is no longer current are ignored. A session that ends on
//! its own also runs the hook registered with
//! [`AudioDeliveryService::on_completed`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::prefs::PreferenceStore;
use crate::sound::{
    ensure_audible_floor, AlarmVolume, AudioOutput, AudioTrack, FinishedCallback, SoundError,
    SoundLibrary, SoundSource, DEFAULT_SOUND,
};
use crate::types::{DeliveryState, SessionOutcome, SessionSnapshot, Slot};

/// Number of replays after the first natural completion.
pub const MAX_LOOPS: u32 = 1;

// ============================================================================
// DeliveryError
// ============================================================================

/// Delivery-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// No candidate sound could be loaded
    #[error("No playable Adhan sound (tried: {})", tried.join(", "))]
    SoundUnavailable { tried: Vec<String> },

    /// Audio output failure
    #[error(transparent)]
    Audio(#[from] SoundError),
}

impl DeliveryError {
    /// Returns true if the failure is a missing sound or device rather
    /// than a playback fault.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        match self {
            Self::SoundUnavailable { .. } => true,
            Self::Audio(e) => e.is_device_error() || e.is_file_error(),
        }
    }

    /// Returns a user-facing suggestion for resolving the error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SoundUnavailable { .. } => {
                "Install the Adhan recordings into the sounds directory (see `adhan sounds`)."
            }
            Self::Audio(e) => e.suggestion(),
        }
    }
}

// ============================================================================
// AudioDeliveryService
// ============================================================================

struct ActiveSession {
    id: u64,
    slot: Slot,
    sound: Option<String>,
    loop_count: u32,
    track: Option<Box<dyn AudioTrack>>,
}

/// Observer run after a playing session reaches its natural end.
pub type CompletionHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct DeliveryInner {
    state: DeliveryState,
    session: Option<ActiveSession>,
    next_session_id: u64,
    last_outcome: Option<SessionOutcome>,
    on_completed: Option<CompletionHook>,
}

impl DeliveryInner {
    fn current_mut(&mut self, id: u64) -> Option<&mut ActiveSession> {
        self.session.as_mut().filter(|session| session.id == id)
    }

    /// Runs the exit action of the current session and returns to Idle.
    fn finish(&mut self, outcome: SessionOutcome) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Some(mut track) = session.track.take() {
            track.stop();
        }

        self.state = outcome.state();
        match &outcome {
            SessionOutcome::Completed { error: Some(e) } => {
                warn!("{} Adhan ended with error: {}", session.slot, e);
            }
            _ => info!(
                "{} Adhan {} after {} loop(s)",
                session.slot,
                self.state.as_str(),
                session.loop_count
            ),
        }

        self.last_outcome = Some(outcome);
        self.state = DeliveryState::Idle;
        debug!("Delivery state -> idle");
    }
}

type SharedInner = Arc<Mutex<DeliveryInner>>;

fn lock(inner: &Mutex<DeliveryInner>) -> MutexGuard<'_, DeliveryInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Plays the Adhan for one slot at a time.
pub struct AudioDeliveryService {
    library: SoundLibrary,
    output: Option<Arc<dyn AudioOutput>>,
    volume: Arc<dyn AlarmVolume>,
    preferences: Arc<dyn PreferenceStore>,
    inner: SharedInner,
}

impl AudioDeliveryService {
    pub fn new(
        library: SoundLibrary,
        output: Option<Arc<dyn AudioOutput>>,
        volume: Arc<dyn AlarmVolume>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            library,
            output,
            volume,
            preferences,
            inner: Arc::new(Mutex::new(DeliveryInner::default())),
        }
    }

    /// Registers `hook` to run whenever a playing session completes on its
    /// own. Dismissed and superseded sessions never run it.
    ///
    /// The hook runs on the audio thread without the session lock held.
    pub fn on_completed(&self, hook: impl Fn() + Send + Sync + 'static) {
        lock(&self.inner).on_completed = Some(Arc::new(hook));
    }

    /// Starts a session for `slot`, ending any active session first.
    ///
    /// The sound is the first playable of: `sound`, the selected
    /// preference, [`DEFAULT_SOUND`].
    ///
    /// # Errors
    ///
    /// Returns an error if nothing could be played. The session is then
    /// already completed with the error recorded.
    pub fn start(&self, slot: Slot, sound: Option<&str>) -> Result<(), DeliveryError> {
        let id = {
            let mut inner = lock(&self.inner);
            if inner.session.is_some() {
                info!("Superseding active Adhan with {}", slot);
                inner.finish(SessionOutcome::Dismissed);
            }
            inner.next_session_id += 1;
            let id = inner.next_session_id;
            inner.session = Some(ActiveSession {
                id,
                slot,
                sound: None,
                loop_count: 0,
                track: None,
            });
            inner.state = DeliveryState::Preparing;
            debug!("Delivery state -> preparing ({})", slot);
            id
        };

        let result = self.prepare_and_play(id, sound);
        if let Err(e) = &result {
            let mut inner = lock(&self.inner);
            if inner.current_mut(id).is_some() {
                inner.finish(SessionOutcome::Completed {
                    error: Some(e.to_string()),
                });
            }
        }
        result
    }

    fn prepare_and_play(&self, id: u64, sound: Option<&str>) -> Result<(), DeliveryError> {
        let output = self.output.as_ref().ok_or_else(|| {
            SoundError::DeviceNotAvailable("no audio output".to_string())
        })?;

        let (source, mut track) = self.load_first_playable(output.as_ref(), sound)?;

        let mut inner = lock(&self.inner);
        let Some(session) = inner.current_mut(id) else {
            debug!("Session {} ended while preparing", id);
            track.stop();
            return Ok(());
        };

        track.play_from_start(completion_callback(&self.inner, id))?;
        session.sound = Some(source.name().to_string());
        session.track = Some(track);
        inner.state = DeliveryState::Playing;
        info!("Playing '{}'", source.name());
        Ok(())
    }

    fn load_first_playable(
        &self,
        output: &dyn AudioOutput,
        explicit: Option<&str>,
    ) -> Result<(SoundSource, Box<dyn AudioTrack>), DeliveryError> {
        let preferences = self.preferences.snapshot();
        let mut tried: Vec<String> = Vec::new();
        for name in [explicit, preferences.sound(), Some(DEFAULT_SOUND)]
            .into_iter()
            .flatten()
        {
            if tried.iter().any(|t| t == name) {
                continue;
            }
            tried.push(name.to_string());

            let source = match self.library.find(name) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Sound '{}' unavailable: {}", name, e);
                    continue;
                }
            };

            ensure_audible_floor(self.volume.as_ref());
            let gain = self.volume.gain();
            match output.load(&source, gain) {
                Ok(track) => {
                    debug!("Loaded '{}' at gain {:.2}", name, gain);
                    return Ok((source, track));
                }
                Err(e) if e.should_try_next_candidate() => {
                    warn!("Sound '{}' not playable: {}", name, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DeliveryError::SoundUnavailable { tried })
    }

    /// Ends the active session as dismissed.
    ///
    /// Returns false (and does nothing) if no session is active.
    pub fn dismiss(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.session.is_none() {
            debug!("Nothing to dismiss");
            return false;
        }
        inner.finish(SessionOutcome::Dismissed);
        true
    }

    /// Current state of the machine.
    #[must_use]
    pub fn state(&self) -> DeliveryState {
        lock(&self.inner).state
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = lock(&self.inner);
        let session = inner.session.as_ref();
        SessionSnapshot {
            state: inner.state,
            slot: session.map(|s| s.slot),
            sound: session.and_then(|s| s.sound.clone()),
            loop_count: session.map_or(0, |s| s.loop_count),
            last_outcome: inner.last_outcome.clone(),
        }
    }

    /// Releases the active session, if any.
    pub fn shutdown(&self) {
        if self.dismiss() {
            info!("Released active Adhan on shutdown");
        }
    }
}

impl Drop for AudioDeliveryService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AudioDeliveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDeliveryService")
            .field("library", &self.library)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn completion_callback(inner: &SharedInner, id: u64) -> FinishedCallback {
    let weak: Weak<Mutex<DeliveryInner>> = Arc::downgrade(inner);
    Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            on_playback_finished(&inner, id);
        }
    })
}

fn on_playback_finished(shared: &SharedInner, id: u64) {
    let mut inner = lock(shared);
    let Some(session) = inner.current_mut(id) else {
        debug!("Ignoring completion of stale session {}", id);
        return;
    };

    if session.loop_count < MAX_LOOPS {
        session.loop_count += 1;
        let replay = match session.track.as_mut() {
            Some(track) => track.play_from_start(completion_callback(shared, id)),
            None => Ok(()),
        };
        match replay {
            Ok(()) => {
                debug!("Replaying Adhan (loop {})", session.loop_count);
                return;
            }
            Err(e) => inner.finish(SessionOutcome::Completed {
                error: Some(e.to_string()),
            }),
        }
    } else {
        inner.finish(SessionOutcome::Completed { error: None });
    }

    let hook = inner.on_completed.clone();
    drop(inner);
    if let Some(hook) = hook {
        hook();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferenceStore;
    use crate::sound::{AudioEvent, MockAudioOutput, SoftwareAlarmVolume};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        output: MockAudioOutput,
        volume: Arc<SoftwareAlarmVolume>,
        prefs: Arc<MemoryPreferenceStore>,
        service: AudioDeliveryService,
    }

    fn create_fixture(installed: &[&str], level: u32) -> Fixture {
        let dir = TempDir::new().unwrap();
        for name in installed {
            std::fs::write(dir.path().join(format!("{}.mp3", name)), b"mp3").unwrap();
        }
        let output = MockAudioOutput::new();
        let volume = Arc::new(SoftwareAlarmVolume::new(level, 7));
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let service = AudioDeliveryService::new(
            SoundLibrary::new(dir.path()),
            Some(Arc::new(output.clone())),
            volume.clone(),
            prefs.clone(),
        );
        Fixture {
            _dir: dir,
            output,
            volume,
            prefs,
            service,
        }
    }

    mod start_tests {
        use super::*;

        #[test]
        fn test_start_plays_default_sound() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.service.start(Slot::Fajr, None).unwrap();

            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.state, DeliveryState::Playing);
            assert_eq!(snapshot.slot, Some(Slot::Fajr));
            assert_eq!(snapshot.sound.as_deref(), Some(DEFAULT_SOUND));
            assert_eq!(snapshot.loop_count, 0);
            assert_eq!(f.output.play_count(), 1);
        }

        #[test]
        fn test_explicit_sound_wins() {
            let f = create_fixture(&[DEFAULT_SOUND, "athan_madina"], 5);
            f.prefs.set_sound(Some(DEFAULT_SOUND));
            f.service.start(Slot::Asr, Some("athan_madina")).unwrap();

            assert_eq!(f.service.snapshot().sound.as_deref(), Some("athan_madina"));
        }

        #[test]
        fn test_preference_sound_used() {
            let f = create_fixture(&[DEFAULT_SOUND, "athan_egypt"], 5);
            f.prefs.set_sound(Some("athan_egypt"));
            f.service.start(Slot::Dhuhr, None).unwrap();

            assert_eq!(f.service.snapshot().sound.as_deref(), Some("athan_egypt"));
        }

        #[test]
        fn test_missing_selection_falls_back_to_default() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.prefs.set_sound(Some("not_installed"));
            f.service.start(Slot::Isha, Some("also_missing")).unwrap();

            assert_eq!(f.service.snapshot().sound.as_deref(), Some(DEFAULT_SOUND));
        }

        #[test]
        fn test_no_sound_completes_with_error() {
            let f = create_fixture(&[], 5);
            let err = f.service.start(Slot::Fajr, None).unwrap_err();

            assert!(err.is_resource_error());
            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.state, DeliveryState::Idle);
            assert!(matches!(
                snapshot.last_outcome,
                Some(SessionOutcome::Completed { error: Some(_) })
            ));
            assert_eq!(f.output.live_tracks(), 0);
        }

        #[test]
        fn test_undecodable_candidates_all_tried() {
            let f = create_fixture(&[DEFAULT_SOUND, "athan_madina"], 5);
            f.prefs.set_sound(Some("athan_madina"));
            f.output.set_fail_load(true);

            let err = f.service.start(Slot::Fajr, None).unwrap_err();
            match err {
                DeliveryError::SoundUnavailable { tried } => {
                    assert_eq!(tried, vec!["athan_madina", DEFAULT_SOUND]);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_no_output_completes_with_error() {
            let dir = TempDir::new().unwrap();
            let service = AudioDeliveryService::new(
                SoundLibrary::new(dir.path()),
                None,
                Arc::new(SoftwareAlarmVolume::new(5, 7)),
                Arc::new(MemoryPreferenceStore::new()),
            );
            let err = service.start(Slot::Fajr, None).unwrap_err();
            assert!(matches!(err, DeliveryError::Audio(SoundError::DeviceNotAvailable(_))));
            assert_eq!(service.state(), DeliveryState::Idle);
        }

        #[test]
        fn test_start_while_playing_releases_prior_first() {
            let f = create_fixture(&[DEFAULT_SOUND, "athan_madina"], 5);
            f.service.start(Slot::Fajr, None).unwrap();
            f.service.start(Slot::Dhuhr, Some("athan_madina")).unwrap();

            assert_eq!(
                f.output.events(),
                vec![
                    AudioEvent::Load(DEFAULT_SOUND.into()),
                    AudioEvent::Play(DEFAULT_SOUND.into()),
                    AudioEvent::Release(DEFAULT_SOUND.into()),
                    AudioEvent::Load("athan_madina".into()),
                    AudioEvent::Play("athan_madina".into()),
                ]
            );
            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.slot, Some(Slot::Dhuhr));
            assert_eq!(f.output.live_tracks(), 1);
        }

        #[test]
        fn test_superseded_session_recorded_as_dismissed() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.service.start(Slot::Fajr, None).unwrap();
            f.service.start(Slot::Isha, None).unwrap();

            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.last_outcome, Some(SessionOutcome::Dismissed));
            assert_eq!(snapshot.slot, Some(Slot::Isha));
            assert_eq!(f.output.release_count(), 1);
        }
    }

    mod volume_tests {
        use super::*;

        #[test]
        fn test_muted_channel_raised_to_one_step() {
            let f = create_fixture(&[DEFAULT_SOUND], 0);
            f.service.start(Slot::Fajr, None).unwrap();

            assert_eq!(f.volume.level(), 1);
            assert_eq!(f.output.gains(), vec![1.0 / 7.0]);
        }

        #[test]
        fn test_muted_channel_kept_when_nothing_resolves() {
            let f = create_fixture(&[], 0);
            assert!(f.service.start(Slot::Fajr, None).is_err());

            assert_eq!(f.volume.level(), 0);
            assert!(f.output.gains().is_empty());
        }

        #[test]
        fn test_audible_level_untouched() {
            let f = create_fixture(&[DEFAULT_SOUND], 3);
            f.service.start(Slot::Fajr, None).unwrap();

            assert_eq!(f.volume.level(), 3);
        }
    }

    mod loop_tests {
        use super::*;

        #[test]
        fn test_loops_exactly_once_then_completes() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.service.start(Slot::Maghrib, None).unwrap();

            assert!(f.output.finish_playback());
            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.state, DeliveryState::Playing);
            assert_eq!(snapshot.loop_count, 1);
            assert_eq!(f.output.play_count(), 2);

            assert!(f.output.finish_playback());
            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.state, DeliveryState::Idle);
            assert_eq!(
                snapshot.last_outcome,
                Some(SessionOutcome::Completed { error: None })
            );
            assert_eq!(f.output.play_count(), 2);
            assert_eq!(f.output.live_tracks(), 0);
            assert!(!f.output.finish_playback());
        }
    }

    mod completion_hook_tests {
        use super::*;
        use std::sync::atomic::{AtomicU32, Ordering};

        fn counting_hook(service: &AudioDeliveryService) -> Arc<AtomicU32> {
            let count = Arc::new(AtomicU32::new(0));
            let counter = count.clone();
            service.on_completed(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            count
        }

        #[test]
        fn test_hook_runs_once_on_natural_completion() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            let count = counting_hook(&f.service);
            f.service.start(Slot::Isha, None).unwrap();

            f.output.finish_playback();
            assert_eq!(count.load(Ordering::SeqCst), 0);
            f.output.finish_playback();
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_hook_skipped_on_dismiss_and_supersede() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            let count = counting_hook(&f.service);
            f.service.start(Slot::Fajr, None).unwrap();
            f.service.start(Slot::Dhuhr, None).unwrap();
            f.service.dismiss();

            assert!(!f.output.finish_playback());
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_hook_skipped_when_nothing_played() {
            let f = create_fixture(&[], 5);
            let count = counting_hook(&f.service);
            assert!(f.service.start(Slot::Fajr, None).is_err());

            assert_eq!(count.load(Ordering::SeqCst), 0);
        }
    }

    mod preparing_tests {
        use super::*;
        use std::sync::OnceLock;

        /// Output whose load dismisses the session that requested it.
        struct DismissOnLoad {
            output: MockAudioOutput,
            service: OnceLock<Weak<AudioDeliveryService>>,
        }

        impl AudioOutput for DismissOnLoad {
            fn load(
                &self,
                source: &SoundSource,
                gain: f32,
            ) -> Result<Box<dyn AudioTrack>, SoundError> {
                let track = self.output.load(source, gain)?;
                if let Some(service) = self.service.get().and_then(Weak::upgrade) {
                    assert_eq!(service.state(), DeliveryState::Preparing);
                    assert!(service.dismiss());
                }
                Ok(track)
            }
        }

        #[test]
        fn test_dismiss_while_preparing_releases_loaded_track() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join(format!("{}.mp3", DEFAULT_SOUND)), b"mp3").unwrap();
            let output = MockAudioOutput::new();
            let dismissing = Arc::new(DismissOnLoad {
                output: output.clone(),
                service: OnceLock::new(),
            });
            let service = Arc::new(AudioDeliveryService::new(
                SoundLibrary::new(dir.path()),
                Some(dismissing.clone()),
                Arc::new(SoftwareAlarmVolume::new(5, 7)),
                Arc::new(MemoryPreferenceStore::new()),
            ));
            dismissing.service.set(Arc::downgrade(&service)).unwrap();

            service.start(Slot::Asr, None).unwrap();

            let snapshot = service.snapshot();
            assert_eq!(snapshot.state, DeliveryState::Idle);
            assert_eq!(snapshot.last_outcome, Some(SessionOutcome::Dismissed));
            assert_eq!(
                output.events(),
                vec![
                    AudioEvent::Load(DEFAULT_SOUND.into()),
                    AudioEvent::Release(DEFAULT_SOUND.into()),
                ]
            );
            assert_eq!(output.play_count(), 0);
            assert_eq!(output.live_tracks(), 0);
        }
    }

    mod dismiss_tests {
        use super::*;

        #[test]
        fn test_dismiss_while_playing() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.service.start(Slot::Fajr, None).unwrap();

            assert!(f.service.dismiss());
            let snapshot = f.service.snapshot();
            assert_eq!(snapshot.state, DeliveryState::Idle);
            assert_eq!(snapshot.last_outcome, Some(SessionOutcome::Dismissed));
            assert_eq!(f.output.live_tracks(), 0);
        }

        #[test]
        fn test_dismiss_is_idempotent() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            assert!(!f.service.dismiss());
            f.service.start(Slot::Fajr, None).unwrap();
            assert!(f.service.dismiss());
            assert!(!f.service.dismiss());
            assert_eq!(f.output.release_count(), 1);
        }

        #[test]
        fn test_dismiss_during_loop_wins() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.service.start(Slot::Fajr, None).unwrap();
            f.output.finish_playback();
            f.service.dismiss();

            assert_eq!(f.service.snapshot().last_outcome, Some(SessionOutcome::Dismissed));
            assert!(!f.output.finish_playback());
        }

        #[test]
        fn test_drop_releases_track() {
            let f = create_fixture(&[DEFAULT_SOUND], 5);
            f.service.start(Slot::Fajr, None).unwrap();
            let output = f.output.clone();
            drop(f);
            assert_eq!(output.live_tracks(), 0);
        }
    }
}
