//! Next-occurrence computation for a fired alarm.

use chrono::{DateTime, TimeDelta, TimeZone};

use crate::types::Slot;

/// Interval between two occurrences of the same slot.
#[must_use]
pub fn recurrence() -> TimeDelta {
    TimeDelta::hours(24)
}

/// Returns the next trigger instant for `slot` after it fired at `now`.
///
/// The result is always `now + 24h`, regardless of the slot.
#[must_use]
pub fn next<Tz: TimeZone>(_slot: Slot, now: &DateTime<Tz>) -> DateTime<Tz> {
    now.clone() + recurrence()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_next_is_exactly_one_day_later() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 5, 12, 7).unwrap();
        let next = next(Slot::Fajr, &now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 15, 5, 12, 7).unwrap());
    }

    #[test]
    fn test_next_crosses_year_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 20, 0, 0).unwrap();
        assert_eq!(
            next(Slot::Isha, &now),
            Utc.with_ymd_and_hms(2027, 1, 1, 20, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_is_slot_independent() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let targets: Vec<_> = Slot::ALL.iter().map(|slot| next(*slot, &now)).collect();
        assert!(targets.windows(2).all(|w| w[0] == w[1]));
    }
}
