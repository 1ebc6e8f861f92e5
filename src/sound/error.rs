//! Sound system error types.
//!
//! This module defines the error types for Adhan audio playback. A missing
//! or undecodable sound never aborts the alarm cadence; callers downgrade
//! these errors to a completed session with the error recorded.

use thiserror::Error;

/// Errors that can occur in the sound playback system.
#[derive(Debug, Error)]
pub enum SoundError {
    /// Audio device is not available (e.g., no speakers connected).
    #[error("Audio device not available: {0}")]
    DeviceNotAvailable(String),

    /// No playable file exists for the sound identifier.
    #[error("Sound file not found: {0}")]
    FileNotFound(String),

    /// Sound identifier is not a plain file stem.
    #[error("Invalid sound name: {0}")]
    InvalidName(String),

    /// Failed to decode the audio file.
    #[error("Failed to decode sound file: {0}")]
    DecodeError(String),

    /// Failed to create the audio output stream or sink.
    #[error("Failed to create audio stream: {0}")]
    StreamError(String),

    /// Generic sound playback error.
    #[error("Sound playback error: {0}")]
    PlaybackError(String),
}

impl SoundError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::StreamError(_))
    }

    /// Returns true if this error is related to the audio file.
    #[must_use]
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::InvalidName(_) | Self::DecodeError(_)
        )
    }

    /// Returns true if another sound may still play after this failure.
    #[must_use]
    pub fn should_try_next_candidate(&self) -> bool {
        self.is_file_error()
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DeviceNotAvailable(_) => "Connect an audio output device",
            Self::FileNotFound(_) => "Run `adhan sounds` to list installed sounds",
            Self::InvalidName(_) => "Use a sound name such as athan_makkah",
            Self::DecodeError(_) => "The sound file may be corrupted",
            Self::StreamError(_) => "Check the system audio settings",
            Self::PlaybackError(_) => "Restart the daemon",
        }
    }
}
