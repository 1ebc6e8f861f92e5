//! Shared harness for the integration tests.
//!
//! Builds a daemon out of in-memory collaborators: a fixed clock, mock
//! audio, a recording notification backend and a temporary sounds directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::time::Duration;

use adhan::daemon::{
    signal_channel, AlarmScheduler, AudioDeliveryService, BootRecoveryHandler, Dispatcher,
    DispatcherParts, FixedClock, MockCapabilities, RecordingWakeLock, SignalReceiver,
};
use adhan::notification::{MockNotificationBackend, NotificationPresenter};
use adhan::prefs::MemoryPreferenceStore;
use adhan::sound::{
    AudioOutput, MockAudioOutput, Previewer, SoftwareAlarmVolume, SoundLibrary, DEFAULT_SOUND,
};

/// Creates a temporary socket path for testing.
pub fn create_temp_socket_path() -> PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("adhan_test.sock");
    // Keep the directory so it's not deleted
    std::mem::forget(dir);
    path
}

/// A daemon wired to test doubles.
pub struct TestDaemon {
    pub dir: TempDir,
    pub clock: Arc<FixedClock>,
    pub prefs: Arc<MemoryPreferenceStore>,
    pub output: MockAudioOutput,
    pub volume: Arc<SoftwareAlarmVolume>,
    pub notifications: Arc<MockNotificationBackend>,
    pub wake_lock: Arc<RecordingWakeLock>,
    pub capabilities: Arc<MockCapabilities>,
    pub dispatcher: Arc<Dispatcher>,
    pub signals: SignalReceiver,
}

/// Options for [`TestDaemon::build`].
pub struct Options {
    /// Sounds present in the sounds directory
    pub installed: Vec<&'static str>,
    /// Initial alarm volume step (out of 7)
    pub volume_level: u32,
    /// Whether exact timers are permitted
    pub exact: bool,
    /// Local wall-clock start time (year, month, day, hour, minute)
    pub now: (i32, u32, u32, u32, u32),
}

impl Default for Options {
    fn default() -> Self {
        Self {
            installed: vec![DEFAULT_SOUND],
            volume_level: 5,
            exact: true,
            now: (2026, 3, 14, 12, 0),
        }
    }
}

impl TestDaemon {
    pub fn new() -> Self {
        Self::build(Options::default())
    }

    pub fn build(options: Options) -> Self {
        let dir = TempDir::new().unwrap();
        let sounds = dir.path().join("sounds");
        std::fs::create_dir_all(&sounds).unwrap();
        for name in &options.installed {
            std::fs::write(sounds.join(format!("{}.mp3", name)), b"mp3").unwrap();
        }

        let (year, month, day, hour, minute) = options.now;
        let clock = Arc::new(FixedClock::at(year, month, day, hour, minute, 0));
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let output = MockAudioOutput::new();
        let volume = Arc::new(SoftwareAlarmVolume::new(options.volume_level, 7));
        let notifications = Arc::new(MockNotificationBackend::new());
        let wake_lock = Arc::new(RecordingWakeLock::new());
        let capabilities = Arc::new(MockCapabilities::new(options.exact, true));
        let (tx, signals) = signal_channel();
        let library = SoundLibrary::new(&sounds);
        let audio: Arc<dyn AudioOutput> = Arc::new(output.clone());

        let presenter = Arc::new(NotificationPresenter::new(notifications.clone()));
        presenter.ensure_channel(DEFAULT_SOUND);

        let dispatcher = Arc::new(Dispatcher::new(DispatcherParts {
            scheduler: Arc::new(AlarmScheduler::new(
                clock.clone(),
                capabilities.clone(),
                tx,
            )),
            delivery: Arc::new(AudioDeliveryService::new(
                library.clone(),
                Some(audio.clone()),
                volume.clone(),
                prefs.clone(),
            )),
            presenter,
            preferences: prefs.clone(),
            boot: BootRecoveryHandler::new(dir.path().join("reschedule_pending.json")),
            wake_lock: wake_lock.clone(),
            clock: clock.clone(),
            capabilities: capabilities.clone(),
            previewer: Previewer::new(library.clone(), Some(audio)),
            library,
            guard_timeout: Duration::from_secs(60),
        }));

        Self {
            dir,
            clock,
            prefs,
            output,
            volume,
            notifications,
            wake_lock,
            capabilities,
            dispatcher,
            signals,
        }
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.dir.path().join("sounds")
    }
}
