//! Bookable slot generation.
//!
//! A doctor publishes one recurring daily window (e.g. 09:00–12:00). Slot
//! listings project that window onto each of the next
//! [`BOOKING_HORIZON_DAYS`] calendar days, cut it into
//! [`SLOT_DURATION_MINUTES`] steps, and drop steps that are already in the
//! past or collide with a scheduled appointment.
//!
//! The output is advisory: a slot shown here may be taken by the time the
//! patient submits. The booking transaction re-checks.

use std::fmt;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    BOOKING_HORIZON_DAYS, DAY_KEY_FORMAT, DAY_LABEL_FORMAT, SLOT_DURATION_MINUTES,
    SLOT_TIME_FORMAT,
};
use crate::error::CoreError;
use crate::interval::TimeRange;

/// A recurring daily availability window, as local time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, CoreError> {
        if start >= end {
            return Err(CoreError::InvalidInput("start time must be before end time"));
        }
        Ok(Self { start, end })
    }

    /// Recover the time-of-day window from timestamps stored on an arbitrary
    /// reference date, read in the clinic's time zone.
    pub fn from_timestamps<Tz: TimeZone>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tz: &Tz,
    ) -> Self {
        Self {
            start: start.with_timezone(tz).time(),
            end: end.with_timezone(tz).time(),
        }
    }
}

/// One bookable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// e.g. `"9:00 AM - 9:30 AM"`
    pub formatted: String,
    /// e.g. `"Monday, March 2"`
    pub day: String,
}

/// All slots for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
    /// `yyyy-mm-dd`
    pub date: String,
    pub display_date: String,
    pub slots: Vec<Slot>,
}

/// Generate the slot listing for the next [`BOOKING_HORIZON_DAYS`] days,
/// starting with `now`'s calendar day in `now`'s time zone.
///
/// `booked` must contain the doctor's scheduled appointments. Fails with
/// [`CoreError::NoAvailabilityConfigured`] when the doctor has no window.
pub fn generate_slots<Tz>(
    window: Option<&DailyWindow>,
    booked: &[TimeRange],
    now: &DateTime<Tz>,
) -> Result<Vec<DaySlots>, CoreError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let window = window.ok_or(CoreError::NoAvailabilityConfigured)?;
    let tz = now.timezone();
    let step = Duration::minutes(SLOT_DURATION_MINUTES);
    let today = now.date_naive();

    let mut days = Vec::with_capacity(BOOKING_HORIZON_DAYS as usize);
    for offset in 0..BOOKING_HORIZON_DAYS {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };

        let mut slots = Vec::new();
        if let (Some(day_start), Some(day_end)) = (
            project(&tz, date, window.start),
            project(&tz, date, window.end),
        ) {
            let mut current = day_start;
            while current.clone() + step <= day_end {
                let next = current.clone() + step;

                // past steps are skipped, not shortened
                if current < *now {
                    current = next;
                    continue;
                }

                let candidate =
                    TimeRange::new(current.with_timezone(&Utc), next.with_timezone(&Utc))?;
                if !booked.iter().any(|b| b.overlaps(&candidate)) {
                    slots.push(Slot {
                        start_time: candidate.start(),
                        end_time: candidate.end(),
                        formatted: format!(
                            "{} - {}",
                            current.format(SLOT_TIME_FORMAT),
                            next.format(SLOT_TIME_FORMAT)
                        ),
                        day: current.format(DAY_LABEL_FORMAT).to_string(),
                    });
                }

                current = next;
            }
        }

        let display_date = slots
            .first()
            .map(|s| s.day.clone())
            .unwrap_or_else(|| date.format(DAY_LABEL_FORMAT).to_string());

        days.push(DaySlots {
            date: date.format(DAY_KEY_FORMAT).to_string(),
            display_date,
            slots,
        });
    }

    Ok(days)
}

/// Place a local time-of-day on `date`. Returns `None` when the local time
/// does not exist on that date (DST gap).
fn project<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, m, 0).unwrap()
    }

    fn window(h1: u32, m1: u32, h2: u32, m2: u32) -> DailyWindow {
        DailyWindow::new(hm(h1, m1), hm(h2, m2)).unwrap()
    }

    fn starts(day: &DaySlots) -> Vec<String> {
        day.slots
            .iter()
            .map(|s| s.start_time.format("%H:%M").to_string())
            .collect()
    }

    #[test]
    fn no_window_fails() {
        let err = generate_slots(None, &[], &utc(2, 8, 0)).unwrap_err();
        assert_eq!(err, CoreError::NoAvailabilityConfigured);
    }

    #[test]
    fn booked_slot_is_excluded() {
        let booked = [TimeRange::new(utc(2, 10, 0), utc(2, 10, 30)).unwrap()];
        let days = generate_slots(Some(&window(9, 0, 12, 0)), &booked, &utc(2, 8, 0)).unwrap();

        assert_eq!(days.len(), 4);
        assert_eq!(days[0].date, "2026-03-02");
        assert_eq!(
            starts(&days[0]),
            vec!["09:00", "09:30", "10:30", "11:00", "11:30"]
        );
        // other days are untouched by the booking
        assert_eq!(days[1].slots.len(), 6);
        assert_eq!(days[3].date, "2026-03-05");
    }

    #[test]
    fn labels_follow_clock_format() {
        let days = generate_slots(Some(&window(9, 0, 12, 0)), &[], &utc(2, 8, 0)).unwrap();
        let first = &days[0].slots[0];
        assert_eq!(first.formatted, "9:00 AM - 9:30 AM");
        assert_eq!(first.day, "Monday, March 2");
        assert_eq!(days[0].display_date, "Monday, March 2");
        assert_eq!(days[0].slots[5].formatted, "11:30 AM - 12:00 PM");
    }

    #[test]
    fn past_slots_are_skipped() {
        let now = utc(2, 9, 45);
        let days = generate_slots(Some(&window(9, 0, 12, 0)), &[], &now).unwrap();
        assert_eq!(starts(&days[0]), vec!["10:00", "10:30", "11:00", "11:30"]);
        for day in &days {
            for slot in &day.slots {
                assert!(slot.start_time >= now);
            }
        }
    }

    #[test]
    fn day_after_window_is_empty_but_labelled() {
        let days = generate_slots(Some(&window(9, 0, 12, 0)), &[], &utc(2, 13, 0)).unwrap();
        assert!(days[0].slots.is_empty());
        assert_eq!(days[0].display_date, "Monday, March 2");
        assert_eq!(days[1].slots.len(), 6);
    }

    #[test]
    fn final_step_may_end_exactly_at_window_end() {
        let days = generate_slots(Some(&window(9, 0, 10, 0)), &[], &utc(2, 8, 0)).unwrap();
        assert_eq!(starts(&days[0]), vec!["09:00", "09:30"]);

        // a trailing partial step is not offered
        let days = generate_slots(Some(&window(9, 0, 10, 15)), &[], &utc(2, 8, 0)).unwrap();
        assert_eq!(starts(&days[0]), vec!["09:00", "09:30"]);
    }

    #[test]
    fn slots_are_thirty_minutes_and_disjoint() {
        let booked = [TimeRange::new(utc(3, 9, 15), utc(3, 9, 45)).unwrap()];
        let days = generate_slots(Some(&window(8, 0, 17, 0)), &booked, &utc(2, 11, 10)).unwrap();
        for day in &days {
            for pair in day.slots.windows(2) {
                assert!(pair[0].end_time <= pair[1].start_time);
            }
            for slot in &day.slots {
                assert_eq!(slot.end_time - slot.start_time, Duration::minutes(30));
                let range = TimeRange::new(slot.start_time, slot.end_time).unwrap();
                assert!(!booked[0].overlaps(&range));
            }
        }
        // 09:00 and 09:30 both collide with the 09:15-09:45 booking
        assert!(!starts(&days[1]).contains(&"09:00".to_string()));
        assert!(!starts(&days[1]).contains(&"09:30".to_string()));
    }

    #[test]
    fn window_is_projected_in_clinic_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = utc(2, 6, 0).with_timezone(&tz); // 08:00 local
        let days = generate_slots(Some(&window(9, 0, 10, 0)), &[], &now).unwrap();

        let first = &days[0].slots[0];
        assert_eq!(first.start_time, utc(2, 7, 0));
        assert_eq!(first.formatted, "9:00 AM - 9:30 AM");
    }

    #[test]
    fn window_recovered_from_reference_date() {
        let tz = FixedOffset::east_opt(-5 * 3600).unwrap();
        let start = Utc.with_ymd_and_hms(1970, 1, 1, 14, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(1970, 1, 1, 17, 30, 0).unwrap();
        let w = DailyWindow::from_timestamps(start, end, &tz);
        assert_eq!(w.start, hm(9, 0));
        assert_eq!(w.end, hm(12, 30));
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let w = window(9, 0, 12, 0);
        let a = generate_slots(Some(&w), &[], &utc(2, 8, 0)).unwrap();
        let b = generate_slots(Some(&w), &[], &utc(2, 8, 0)).unwrap();
        assert_eq!(a, b);
    }
}
