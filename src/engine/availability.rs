use std::fmt::Debug;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::limits::*;
use crate::model::*;

use super::error::ValidationError;

// ── Availability validation ──────────────────────────────────────

/// Sort working intervals by `(day, start)` and reject malformed or overlapping blocks.
///
/// Sorting happens before any check, so the reported error depends only on the
/// set of intervals, not on the order they were submitted in.
pub fn validate_and_sort_availability(
    mut intervals: Vec<WorkingInterval>,
) -> Result<Vec<WorkingInterval>, ValidationError> {
    if intervals.len() > MAX_WORKING_INTERVALS {
        return Err(ValidationError::TooManyIntervals(intervals.len()));
    }
    intervals.sort_by_key(|w| (w.day, w.start, w.end));

    if let Some(bad) = intervals.iter().find(|w| w.start >= w.end) {
        return Err(ValidationError::InvalidRange {
            day: bad.day,
            start: bad.start,
            end: bad.end,
        });
    }

    // Sorted by start and scanned up to the first hit, so each block only needs
    // comparing with its predecessor on the same day.
    for pair in intervals.windows(2) {
        let (prev, w) = (&pair[0], &pair[1]);
        if prev.day == w.day && w.start < prev.end {
            return Err(ValidationError::OverlappingRanges {
                day: w.day,
                first: Slot::new(prev.start, prev.end),
                second: Slot::new(w.start, w.end),
            });
        }
    }

    Ok(intervals)
}

// ── Slot calculation ─────────────────────────────────────────────

/// Remove `busy` from `range`, returning the ordered free remainder.
pub fn subtract<T: Ord + Copy + Debug>(range: &Span<T>, busy: &[Span<T>]) -> Vec<Span<T>> {
    let mut hits: Vec<&Span<T>> = busy.iter().filter(|b| b.overlaps(range)).collect();
    hits.sort_by_key(|b| b.start);

    let mut free = Vec::new();
    let mut cursor = range.start;
    for b in hits {
        if cursor < b.start {
            free.push(Span::new(cursor, b.start));
        }
        cursor = cursor.max(b.end);
    }
    if cursor < range.end {
        free.push(Span::new(cursor, range.end));
    }
    free
}

/// Free sub-slots of a single working block.
///
/// Only busy slots lying entirely inside the block count against it. A lesson that
/// starts before or runs past the declared hours is out of scope for that block.
pub fn sweep(working: &Slot, busy: &[Slot]) -> Vec<Slot> {
    let inside: Vec<Slot> = busy.iter().filter(|b| working.contains(b)).copied().collect();
    subtract(working, &inside)
}

/// Free slots for `day` given an owner's working intervals and that day's busy slots.
pub fn free_slots(day: Day, working: &[WorkingInterval], busy: &[Slot]) -> Vec<Slot> {
    let mut blocks: Vec<Slot> = working
        .iter()
        .filter(|w| w.day == day)
        .filter_map(WorkingInterval::slot)
        .collect();
    blocks.sort_by_key(|s| s.start);
    blocks.iter().flat_map(|b| sweep(b, busy)).collect()
}

/// True if `wanted` sits wholly inside one of the free slots.
pub fn fits_in(free: &[Slot], wanted: &Slot) -> bool {
    free.iter().any(|s| s.contains(wanted))
}

// ── Calendar arithmetic ──────────────────────────────────────────

fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate, ValidationError> {
    let moved = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    moved.ok_or(ValidationError::DateOutOfRange { date })
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// The Sunday that opens the week containing `date`.
pub fn week_start(date: NaiveDate) -> Result<NaiveDate, ValidationError> {
    shift(date, -i64::from(Day::of(date).offset()))
}

/// Sunday through Saturday of the week containing `date`.
pub fn week_dates(date: NaiveDate) -> Result<[NaiveDate; 7], ValidationError> {
    let start = week_start(date)?;
    let mut dates = [start; 7];
    for (i, d) in dates.iter_mut().enumerate() {
        *d = shift(start, i as i64)?;
    }
    Ok(dates)
}

/// `[date 00:00, next day 00:00)` in UTC.
pub fn day_range(date: NaiveDate) -> Result<TimeRange, ValidationError> {
    Ok(TimeRange::new(midnight(date), midnight(shift(date, 1)?)))
}

/// `[Sunday 00:00, next Sunday 00:00)` in UTC for the week containing `date`.
pub fn week_range(date: NaiveDate) -> Result<TimeRange, ValidationError> {
    let start = week_start(date)?;
    Ok(TimeRange::new(midnight(start), midnight(shift(start, 7)?)))
}

/// Project an absolute range onto the clock of `date`.
///
/// `None` unless the range starts on `date` and ends on it, or exactly at the
/// following midnight. The start rounds down and the end rounds up to whole
/// minutes, so the slot always covers the range.
pub fn project_onto(range: &TimeRange, date: NaiveDate) -> Option<Slot> {
    if range.start.date_naive() != date {
        return None;
    }
    let start = ClockTime::from_time(range.start.time());
    let end = if range.end.date_naive() == date {
        ClockTime::from_time_ceil(range.end.time())
    } else if Some(range.end) == date.succ_opt().map(midnight) {
        ClockTime::END_OF_DAY
    } else {
        return None;
    };
    (start < end).then(|| Slot::new(start, end))
}

/// Project every range that falls on `date`, dropping the rest.
pub fn busy_on(ranges: impl IntoIterator<Item = TimeRange>, date: NaiveDate) -> Vec<Slot> {
    ranges
        .into_iter()
        .filter_map(|r| project_onto(&r, date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn slot(a: &str, b: &str) -> Slot {
        Slot::new(t(a), t(b))
    }

    fn wi(day: Day, a: &str, b: &str) -> WorkingInterval {
        WorkingInterval::new(day, t(a), t(b))
    }

    // ── validate_and_sort_availability ───────────────────

    #[test]
    fn touching_intervals_are_valid() {
        let hours = vec![wi(Day::Monday, "10:00", "11:00"), wi(Day::Monday, "09:00", "10:00")];
        let sorted = validate_and_sort_availability(hours).unwrap();
        assert_eq!(
            sorted,
            vec![wi(Day::Monday, "09:00", "10:00"), wi(Day::Monday, "10:00", "11:00")]
        );
    }

    #[test]
    fn one_minute_overlap_is_rejected() {
        let hours = vec![wi(Day::Monday, "09:00", "10:01"), wi(Day::Monday, "10:00", "11:00")];
        let err = validate_and_sort_availability(hours).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OverlappingRanges {
                day: Day::Monday,
                first: slot("09:00", "10:01"),
                second: slot("10:00", "11:00"),
            }
        );
    }

    #[test]
    fn same_hours_on_different_days_do_not_conflict() {
        let hours = vec![wi(Day::Tuesday, "09:00", "12:00"), wi(Day::Monday, "09:00", "12:00")];
        let sorted = validate_and_sort_availability(hours).unwrap();
        assert_eq!(sorted[0].day, Day::Monday);
        assert_eq!(sorted[1].day, Day::Tuesday);
    }

    #[test]
    fn overlap_hidden_behind_long_block_is_found() {
        // Submitted out of order; 16-18 must be reported against 09-17.
        let hours = vec![
            wi(Day::Friday, "16:00", "18:00"),
            wi(Day::Friday, "09:00", "17:00"),
        ];
        let err = validate_and_sort_availability(hours).unwrap_err();
        assert!(matches!(err, ValidationError::OverlappingRanges { day: Day::Friday, .. }));
    }

    #[test]
    fn start_not_before_end_is_invalid() {
        let err = validate_and_sort_availability(vec![wi(Day::Sunday, "12:00", "12:00")])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidRange { day: Day::Sunday, start: t("12:00"), end: t("12:00") }
        );
        let err = validate_and_sort_availability(vec![wi(Day::Sunday, "13:00", "12:00")])
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }

    #[test]
    fn validation_is_idempotent() {
        let hours = vec![
            wi(Day::Saturday, "08:00", "09:00"),
            wi(Day::Monday, "13:00", "17:00"),
            wi(Day::Monday, "07:00", "12:00"),
            wi(Day::Sunday, "10:00", "24:00"),
        ];
        let once = validate_and_sort_availability(hours).unwrap();
        let twice = validate_and_sort_availability(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn error_does_not_depend_on_input_order() {
        let a = wi(Day::Wednesday, "09:00", "11:00");
        let b = wi(Day::Wednesday, "10:00", "12:00");
        let c = wi(Day::Thursday, "09:00", "10:00");
        let e1 = validate_and_sort_availability(vec![a, b, c]).unwrap_err();
        let e2 = validate_and_sort_availability(vec![c, b, a]).unwrap_err();
        let e3 = validate_and_sort_availability(vec![b, c, a]).unwrap_err();
        assert_eq!(e1, e2);
        assert_eq!(e2, e3);
    }

    #[test]
    fn too_many_intervals_rejected() {
        let hours = vec![wi(Day::Monday, "09:00", "10:00"); MAX_WORKING_INTERVALS + 1];
        assert!(matches!(
            validate_and_sort_availability(hours),
            Err(ValidationError::TooManyIntervals(_))
        ));
    }

    // ── free_slots ───────────────────────────────────────

    #[test]
    fn free_slots_punches_out_busy_blocks() {
        let working = vec![wi(Day::Monday, "09:00", "17:00")];
        let busy = vec![slot("13:00", "14:00"), slot("10:00", "11:00")];
        assert_eq!(
            free_slots(Day::Monday, &working, &busy),
            vec![slot("09:00", "10:00"), slot("11:00", "13:00"), slot("14:00", "17:00")]
        );
    }

    #[test]
    fn free_slots_without_busy_is_whole_block() {
        let working = vec![wi(Day::Monday, "09:00", "17:00")];
        assert_eq!(free_slots(Day::Monday, &working, &[]), vec![slot("09:00", "17:00")]);
    }

    #[test]
    fn fully_booked_day_has_no_slots() {
        let working = vec![wi(Day::Monday, "09:00", "17:00")];
        assert!(free_slots(Day::Monday, &working, &[slot("09:00", "17:00")]).is_empty());
    }

    #[test]
    fn busy_spilling_outside_hours_is_ignored() {
        let working = vec![wi(Day::Monday, "09:00", "12:00")];
        let busy = vec![slot("08:30", "09:30"), slot("11:30", "12:30")];
        assert_eq!(free_slots(Day::Monday, &working, &busy), vec![slot("09:00", "12:00")]);
    }

    #[test]
    fn overlapping_busy_blocks_advance_cursor_monotonically() {
        let working = vec![wi(Day::Monday, "09:00", "17:00")];
        let busy = vec![slot("10:00", "12:00"), slot("11:00", "11:30"), slot("11:45", "13:00")];
        assert_eq!(
            free_slots(Day::Monday, &working, &busy),
            vec![slot("09:00", "10:00"), slot("13:00", "17:00")]
        );
    }

    #[test]
    fn multiple_blocks_on_one_day() {
        let working = vec![
            wi(Day::Tuesday, "14:00", "18:00"),
            wi(Day::Tuesday, "08:00", "12:00"),
            wi(Day::Wednesday, "08:00", "12:00"),
        ];
        let busy = vec![slot("08:00", "09:00"), slot("15:00", "16:00")];
        assert_eq!(
            free_slots(Day::Tuesday, &working, &busy),
            vec![slot("09:00", "12:00"), slot("14:00", "15:00"), slot("16:00", "18:00")]
        );
    }

    #[test]
    fn no_hours_on_day_means_no_slots() {
        let working = vec![wi(Day::Tuesday, "08:00", "12:00")];
        assert!(free_slots(Day::Monday, &working, &[]).is_empty());
    }

    #[test]
    fn subtract_clips_partial_overlaps() {
        let range = Span::new(100, 200);
        assert_eq!(subtract(&range, &[Span::new(50, 150)]), vec![Span::new(150, 200)]);
        assert_eq!(subtract(&range, &[Span::new(150, 250)]), vec![Span::new(100, 150)]);
        assert_eq!(subtract(&range, &[Span::new(300, 400)]), vec![range]);
        assert!(subtract(&range, &[Span::new(0, 1000)]).is_empty());
    }

    #[test]
    fn fits_in_requires_full_containment() {
        let free = vec![slot("09:00", "10:00"), slot("11:00", "13:00")];
        assert!(fits_in(&free, &slot("11:00", "12:00")));
        assert!(fits_in(&free, &slot("09:00", "10:00")));
        assert!(!fits_in(&free, &slot("09:30", "11:30")));
    }

    // ── calendar ─────────────────────────────────────────

    #[test]
    fn week_starts_on_sunday() {
        // 2026-10-21 is a Wednesday.
        let wed = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(week_start(wed), Ok(sunday));
        assert_eq!(week_start(sunday), Ok(sunday));
        let dates = week_dates(wed).unwrap();
        assert_eq!(dates[0], sunday);
        assert_eq!(dates[6], NaiveDate::from_ymd_opt(2026, 10, 24).unwrap());
        let range = week_range(wed).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2026, 10, 25, 0, 0, 0).unwrap());
    }

    #[test]
    fn projection_onto_day() {
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        let r = TimeRange::new(
            Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 4, 11, 30, 0).unwrap(),
        );
        assert_eq!(project_onto(&r, date), Some(slot("10:00", "11:30")));

        let to_midnight = TimeRange::new(
            Utc.with_ymd_and_hms(2030, 3, 4, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 5, 0, 0, 0).unwrap(),
        );
        assert_eq!(project_onto(&to_midnight, date), Some(slot("23:00", "24:00")));

        let overnight = TimeRange::new(
            Utc.with_ymd_and_hms(2030, 3, 4, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 5, 1, 0, 0).unwrap(),
        );
        assert_eq!(project_onto(&overnight, date), None);
        assert_eq!(project_onto(&r, date.succ_opt().unwrap()), None);
    }

    #[test]
    fn calendar_edges_are_errors_not_panics() {
        let last = NaiveDate::MAX;
        assert_eq!(day_range(last), Err(ValidationError::DateOutOfRange { date: last }));
        assert!(week_range(last).is_err());
        assert!(week_dates(last).is_err());
        assert!(day_range(last.pred_opt().unwrap()).is_ok());
    }

    #[test]
    fn projection_covers_partial_minutes() {
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        let at = |h, m, s| Utc.with_ymd_and_hms(2030, 3, 4, h, m, s).unwrap();
        let r = TimeRange::new(at(10, 0, 30), at(11, 0, 30));
        assert_eq!(project_onto(&r, date), Some(slot("10:00", "11:01")));

        let short = TimeRange::new(at(10, 0, 10), at(10, 0, 50));
        assert_eq!(project_onto(&short, date), Some(slot("10:00", "10:01")));

        let late = TimeRange::new(at(23, 0, 0), at(23, 59, 59));
        assert_eq!(project_onto(&late, date), Some(slot("23:00", "24:00")));
    }

    #[test]
    fn partial_minute_busy_tail_is_not_free() {
        let working = slot("09:00", "17:00");
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        let lesson = TimeRange::new(
            Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 4, 11, 0, 30).unwrap(),
        );
        let busy = busy_on([lesson], date);
        assert_eq!(sweep(&working, &busy), vec![slot("09:00", "10:00"), slot("11:01", "17:00")]);
    }
}
