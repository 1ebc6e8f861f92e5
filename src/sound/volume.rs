//! Alarm volume channel.
//!
//! The alarm channel has integer steps `0..=max_level`. Before an Adhan
//! starts, a muted channel is raised to a single step so the alert is
//! audible; any other level is left alone.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;

/// Volume control for the alarm audio channel.
pub trait AlarmVolume: Send + Sync {
    /// Current step.
    fn level(&self) -> u32;

    /// Highest step; 0 means the channel cannot produce sound.
    fn max_level(&self) -> u32;

    /// Sets the current step, clamped to `max_level`.
    fn set_level(&self, level: u32);

    /// Linear gain of the current step in `0.0..=1.0`.
    fn gain(&self) -> f32 {
        let max = self.max_level();
        if max == 0 {
            return 0.0;
        }
        self.level().min(max) as f32 / max as f32
    }
}

/// Alarm volume kept in process memory and applied as playback gain.
#[derive(Debug)]
pub struct SoftwareAlarmVolume {
    level: AtomicU32,
    max_level: u32,
}

impl SoftwareAlarmVolume {
    #[must_use]
    pub fn new(level: u32, max_level: u32) -> Self {
        Self {
            level: AtomicU32::new(level.min(max_level)),
            max_level,
        }
    }
}

impl AlarmVolume for SoftwareAlarmVolume {
    fn level(&self) -> u32 {
        self.level.load(Ordering::SeqCst)
    }

    fn max_level(&self) -> u32 {
        self.max_level
    }

    fn set_level(&self, level: u32) {
        self.level
            .store(level.min(self.max_level), Ordering::SeqCst);
    }
}

/// Raises a muted alarm channel to one step.
///
/// Returns true if the level was changed.
pub fn ensure_audible_floor(volume: &dyn AlarmVolume) -> bool {
    if volume.level() == 0 && volume.max_level() > 0 {
        volume.set_level(1);
        info!("Alarm volume was muted, raised to 1/{}", volume.max_level());
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muted_channel_is_raised_to_one() {
        let volume = SoftwareAlarmVolume::new(0, 7);
        assert!(ensure_audible_floor(&volume));
        assert_eq!(volume.level(), 1);
    }

    #[test]
    fn test_audible_level_is_untouched() {
        let volume = SoftwareAlarmVolume::new(3, 7);
        assert!(!ensure_audible_floor(&volume));
        assert_eq!(volume.level(), 3);
    }

    #[test]
    fn test_zero_max_is_untouched() {
        let volume = SoftwareAlarmVolume::new(0, 0);
        assert!(!ensure_audible_floor(&volume));
        assert_eq!(volume.level(), 0);
        assert_eq!(volume.gain(), 0.0);
    }

    #[test]
    fn test_gain_scales_with_level() {
        let volume = SoftwareAlarmVolume::new(7, 7);
        assert_eq!(volume.gain(), 1.0);
        volume.set_level(0);
        assert_eq!(volume.gain(), 0.0);
    }

    #[test]
    fn test_level_is_clamped_to_max() {
        let volume = SoftwareAlarmVolume::new(12, 7);
        assert_eq!(volume.level(), 7);
        volume.set_level(99);
        assert_eq!(volume.level(), 7);
    }
}
