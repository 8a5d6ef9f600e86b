//! Time slot indexing - Maps wall-clock time to numbered slots within a day.
//!
//! A slot is addressed by the start of its local day plus an index. Its
//! instant is `base_date + slot_index * slot_size`. Times are naive local
//! wall-clock values; the pure functions take `now` explicitly and the
//! `*_current_*` helpers read the local clock.

use crate::errors::{Error, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Minutes in one day, the largest allowed slot size
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Converts a whole number of minutes into a slot size.
///
/// # Errors
/// Returns `Error::InvalidSlotSize` unless `1 <= minutes <= 1440`.
pub fn slot_size_from_minutes(minutes: i64) -> Result<TimeDelta> {
    if !(1..=MINUTES_PER_DAY).contains(&minutes) {
        return Err(Error::InvalidSlotSize { minutes });
    }
    TimeDelta::try_minutes(minutes).ok_or(Error::InvalidSlotSize { minutes })
}

fn check_slot_size(slot_size: TimeDelta) -> Result<()> {
    if slot_size <= TimeDelta::zero() || slot_size > TimeDelta::days(1) {
        return Err(Error::InvalidSlotSize {
            minutes: slot_size.num_minutes(),
        });
    }
    Ok(())
}

/// Midnight at the start of `instant`'s day.
#[must_use]
pub fn start_of_day(instant: NaiveDateTime) -> NaiveDateTime {
    instant.date().and_time(NaiveTime::MIN)
}

/// Number of whole slots that fit in a day.
#[must_use]
pub fn periods_per_day(slot_size: TimeDelta) -> i32 {
    let slot_ms = slot_size.num_milliseconds();
    if slot_ms <= 0 {
        return 0;
    }
    i32::try_from(TimeDelta::days(1).num_milliseconds() / slot_ms).unwrap_or(i32::MAX)
}

/// Index of the slot containing `instant`: whole slots elapsed since midnight.
#[must_use]
pub fn slot_index_at(instant: NaiveDateTime, slot_size: TimeDelta) -> i32 {
    let slot_ms = slot_size.num_milliseconds();
    if slot_ms <= 0 {
        return 0;
    }
    let elapsed = (instant - start_of_day(instant)).num_milliseconds();
    i32::try_from(elapsed / slot_ms).unwrap_or(i32::MAX)
}

/// One slot of one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSlot {
    base_date: NaiveDateTime,
    slot_index: i32,
    slot_size: TimeDelta,
}

impl TimeSlot {
    /// Builds the slot `slot_index` of `day`.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotSize` for a size outside one minute to one
    /// day, and `Error::InvalidSlotIndex` for an index outside the day.
    pub fn new(day: NaiveDate, slot_index: i32, slot_size: TimeDelta) -> Result<Self> {
        check_slot_size(slot_size)?;
        if !(0..periods_per_day(slot_size)).contains(&slot_index) {
            return Err(Error::InvalidSlotIndex { index: slot_index });
        }
        Ok(Self {
            base_date: day.and_time(NaiveTime::MIN),
            slot_index,
            slot_size,
        })
    }

    /// The slot containing `instant`.
    ///
    /// When the slot size does not divide the day, the tail of the day is a
    /// short slot numbered `periods_per_day(slot_size)`.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotSize` for a size outside one minute to one
    /// day.
    pub fn containing(instant: NaiveDateTime, slot_size: TimeDelta) -> Result<Self> {
        check_slot_size(slot_size)?;
        Ok(Self {
            base_date: start_of_day(instant),
            slot_index: slot_index_at(instant, slot_size),
            slot_size,
        })
    }

    /// Start of the slot's day.
    #[must_use]
    pub const fn base_date(&self) -> NaiveDateTime {
        self.base_date
    }

    /// The slot's day.
    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.base_date.date()
    }

    /// Position of the slot within its day.
    #[must_use]
    pub const fn slot_index(&self) -> i32 {
        self.slot_index
    }

    /// Length of the slot.
    #[must_use]
    pub const fn slot_size(&self) -> TimeDelta {
        self.slot_size
    }

    /// When the slot starts.
    #[must_use]
    pub fn instant(&self) -> NaiveDateTime {
        self.base_date + self.slot_size * self.slot_index
    }

    /// When the slot ends (exclusive). The short tail slot ends at midnight.
    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        (self.instant() + self.slot_size).min(self.base_date + TimeDelta::days(1))
    }

    /// Whether `now` falls inside this slot.
    #[must_use]
    pub fn covers(&self, now: NaiveDateTime) -> bool {
        self.base_date == start_of_day(now)
            && slot_index_at(now, self.slot_size) == self.slot_index
    }

    /// Whether the local clock is currently inside this slot.
    #[must_use]
    pub fn covers_current_time(&self) -> bool {
        self.covers(Local::now().naive_local())
    }
}

/// The slot the local clock is in right now.
pub fn slot_of_current_time(slot_size: TimeDelta) -> Result<TimeSlot> {
    TimeSlot::containing(Local::now().naive_local(), slot_size)
}

/// Every slot of `day`, in order.
pub fn slots_for_day(day: NaiveDate, slot_size: TimeDelta) -> Result<Vec<TimeSlot>> {
    check_slot_size(slot_size)?;
    (0..periods_per_day(slot_size))
        .map(|index| TimeSlot::new(day, index, slot_size))
        .collect()
}

/// Every slot of `days` consecutive days starting at `from_day`.
pub fn slots_in_range(
    from_day: NaiveDate,
    days: u32,
    slot_size: TimeDelta,
) -> Result<Vec<TimeSlot>> {
    let mut slots = Vec::new();
    for day in from_day.iter_days().take(days as usize) {
        slots.extend(slots_for_day(day, slot_size)?);
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        day.and_hms_opt(hour, minute, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    #[test]
    fn test_slot_size_from_minutes_bounds() {
        assert!(slot_size_from_minutes(30).is_ok());
        assert!(slot_size_from_minutes(1440).is_ok());
        assert!(matches!(
            slot_size_from_minutes(0),
            Err(Error::InvalidSlotSize { minutes: 0 })
        ));
        assert!(matches!(
            slot_size_from_minutes(1441),
            Err(Error::InvalidSlotSize { minutes: 1441 })
        ));
    }

    #[test]
    fn test_periods_per_day() {
        assert_eq!(periods_per_day(TimeDelta::minutes(30)), 48);
        assert_eq!(periods_per_day(TimeDelta::minutes(60)), 24);
        // Sizes that do not divide the day round down
        assert_eq!(periods_per_day(TimeDelta::minutes(7)), 205);
        assert_eq!(periods_per_day(TimeDelta::zero()), 0);
    }

    #[test]
    fn test_slot_index_at() {
        let size = TimeDelta::minutes(30);
        assert_eq!(slot_index_at(at(day(), 0, 0), size), 0);
        assert_eq!(slot_index_at(at(day(), 0, 29), size), 0);
        assert_eq!(slot_index_at(at(day(), 2, 30), size), 5);
        assert_eq!(slot_index_at(at(day(), 23, 59), size), 47);
    }

    #[test]
    fn test_instant_round_trip() {
        let size = TimeDelta::minutes(30);
        let slot = TimeSlot::new(day(), 5, size).unwrap();
        assert_eq!(slot.instant(), at(day(), 2, 30));
        assert_eq!(slot.end(), at(day(), 3, 0));
        assert_eq!(slot.base_date(), at(day(), 0, 0));

        let again = TimeSlot::containing(at(day(), 2, 45), size).unwrap();
        assert_eq!(again, slot);
    }

    #[test]
    fn test_new_rejects_out_of_range_index() {
        let size = TimeDelta::minutes(30);
        assert!(matches!(
            TimeSlot::new(day(), 48, size),
            Err(Error::InvalidSlotIndex { index: 48 })
        ));
        assert!(matches!(
            TimeSlot::new(day(), -1, size),
            Err(Error::InvalidSlotIndex { index: -1 })
        ));
        assert!(matches!(
            TimeSlot::new(day(), 0, TimeDelta::zero()),
            Err(Error::InvalidSlotSize { .. })
        ));
    }

    #[test]
    fn test_containing_tail_of_uneven_day() {
        let size = TimeDelta::minutes(1000);
        assert_eq!(periods_per_day(size), 1);

        let slot = TimeSlot::containing(at(day(), 20, 0), size).unwrap();
        assert_eq!(slot.slot_index(), 1);
        assert_eq!(slot.day(), day());
        assert_eq!(slot.instant(), at(day(), 16, 40));
        assert_eq!(slot.end(), at(day().succ_opt().unwrap(), 0, 0));
        assert!(slot.covers(at(day(), 23, 59)));
        assert!(!slot.covers(at(day(), 16, 39)));
    }

    #[test]
    fn test_covers() {
        let size = TimeDelta::minutes(30);
        let slot = TimeSlot::new(day(), 5, size).unwrap();

        assert!(slot.covers(at(day(), 2, 30)));
        assert!(slot.covers(at(day(), 2, 59)));
        assert!(!slot.covers(at(day(), 3, 0)));
        // Same index on another day is a different slot
        assert!(!slot.covers(at(day().succ_opt().unwrap(), 2, 40)));
    }

    #[test]
    fn test_current_slot_covers_now() {
        let size = TimeDelta::minutes(1440);
        let slot = slot_of_current_time(size).unwrap();
        assert_eq!(slot.slot_index(), 0);
        assert!(slot.covers_current_time());
    }

    #[test]
    fn test_slots_in_range() {
        let size = TimeDelta::minutes(360);
        let slots = slots_in_range(day(), 2, size).unwrap();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].day(), day());
        assert_eq!(slots[4].day(), day().succ_opt().unwrap());
        assert_eq!(slots[4].slot_index(), 0);
        assert_eq!(slots[7].instant(), at(day().succ_opt().unwrap(), 18, 0));
    }
}
