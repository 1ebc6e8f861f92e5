//! Audio output implementation using rodio.
//!
//! rodio's `OutputStream` is not `Send`, so it lives on a dedicated thread
//! for the lifetime of [`RodioAudioOutput`]. The daemon only holds the
//! stream handle and a shutdown channel; dropping the output ends the
//! thread and closes the device.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Sender};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::error::SoundError;
use super::source::SoundSource;
use super::{AudioOutput, AudioTrack, FinishedCallback};

/// An audio output that plays through the default rodio device.
pub struct RodioAudioOutput {
    /// Handle to the output stream for creating sinks.
    stream_handle: OutputStreamHandle,
    /// Dropping this sender stops the audio thread.
    _shutdown: Sender<()>,
}

impl RodioAudioOutput {
    /// Opens the default output device on a dedicated audio thread.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if no audio output device
    /// is available.
    pub fn new() -> Result<Self, SoundError> {
        let (handle_tx, handle_rx) = bounded::<Result<OutputStreamHandle, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        std::thread::Builder::new()
            .name("adhan-audio".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if handle_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    // Blocks until every shutdown sender is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    debug!("Audio output stream closed");
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| SoundError::DeviceNotAvailable(e.to_string()))?;

        let stream_handle = handle_rx
            .recv()
            .map_err(|e| SoundError::DeviceNotAvailable(e.to_string()))?
            .map_err(SoundError::DeviceNotAvailable)?;

        debug!("Audio output stream initialized");

        Ok(Self {
            stream_handle,
            _shutdown: shutdown_tx,
        })
    }
}

impl AudioOutput for RodioAudioOutput {
    fn load(&self, source: &SoundSource, gain: f32) -> Result<Box<dyn AudioTrack>, SoundError> {
        let bytes: Arc<[u8]> = std::fs::read(source.path())
            .map_err(|e| SoundError::FileNotFound(format!("{}: {}", source.path().display(), e)))?
            .into();

        // Decode once up front so a corrupt file fails the load, not the replay.
        Decoder::new(Cursor::new(Arc::clone(&bytes)))
            .map_err(|e| SoundError::DecodeError(format!("{}: {}", source.name(), e)))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| SoundError::StreamError(e.to_string()))?;
        sink.pause();
        sink.set_volume(gain.clamp(0.0, 1.0));

        debug!("Loaded sound '{}' at gain {:.2}", source.name(), gain);

        Ok(Box::new(RodioTrack {
            name: source.name().to_string(),
            bytes,
            sink: Arc::new(sink),
            stopped: Arc::new(AtomicBool::new(false)),
        }))
    }
}

impl std::fmt::Debug for RodioAudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioAudioOutput").finish_non_exhaustive()
    }
}

/// A sound decoded from in-memory bytes into its own sink.
struct RodioTrack {
    name: String,
    bytes: Arc<[u8]>,
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
}

impl AudioTrack for RodioTrack {
    fn play_from_start(&mut self, on_finished: FinishedCallback) -> Result<(), SoundError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SoundError::PlaybackError(format!(
                "track '{}' already released",
                self.name
            )));
        }

        let decoder = Decoder::new(Cursor::new(Arc::clone(&self.bytes)))
            .map_err(|e| SoundError::DecodeError(format!("{}: {}", self.name, e)))?;

        self.sink.append(decoder);
        self.sink.play();

        let sink = Arc::clone(&self.sink);
        let stopped = Arc::clone(&self.stopped);
        let name = self.name.clone();
        std::thread::Builder::new()
            .name("adhan-playback".to_string())
            .spawn(move || {
                sink.sleep_until_end();
                if stopped.load(Ordering::SeqCst) {
                    return;
                }
                debug!("Playback of '{}' reached the end", name);
                on_finished();
            })
            .map_err(|e| SoundError::PlaybackError(e.to_string()))?;

        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.stop();
        debug!("Released sound '{}'", self.name);
    }
}

impl Drop for RodioTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens the audio output, returning None if audio is unavailable.
///
/// If audio initialization fails, a warning is logged and None is returned.
#[must_use]
pub fn try_create_output() -> Option<Arc<RodioAudioOutput>> {
    match RodioAudioOutput::new() {
        Ok(output) => Some(Arc::new(output)),
        Err(e) => {
            warn!("Audio not available, Adhan playback disabled: {}", e);
            None
        }
    }
}
