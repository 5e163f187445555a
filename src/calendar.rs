use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, SubsecRound, Utc};

use crate::model::work_schedule::WorkSchedule;

/// Calendar-day bounds in UTC for one local day: `[start, end]`, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Window of the local day containing `now`; `None` at the edges of the calendar range.
    pub fn containing(now: DateTime<Utc>, offset: FixedOffset) -> Option<Self> {
        let local = now.naive_utc().checked_add_offset(offset)?;
        Self::for_date(local.date(), offset)
    }

    /// Window of a local calendar date; `end` is the last millisecond of that day.
    pub fn for_date(date: NaiveDate, offset: FixedOffset) -> Option<Self> {
        let start = date
            .and_time(NaiveTime::MIN)
            .checked_sub_signed(Duration::seconds(offset.local_minus_utc() as i64))?
            .and_utc();
        let end = start
            .checked_add_signed(Duration::days(1))?
            .checked_sub_signed(Duration::milliseconds(1))?;
        Some(Self { date, start, end })
    }

    /// Weekday of the local date, 0 = Sunday.
    pub fn weekday(&self) -> u8 {
        self.date.weekday().num_days_from_sunday() as u8
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// True when `[from, to]` shares at least one instant with this day.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        from <= self.end && to >= self.start
    }
}

/// `now` as persisted: instants are stored as `DATETIME(3)`, and truncating here keeps
/// MySQL from rounding a last-millisecond instant into the next day.
pub fn stored_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(3)
}

/// Resolves whether a day is a working day.
///
/// A special working day always wins, then a holiday, then the weekly schedule.
/// A day flagged as both special and holiday is therefore a working day.
pub fn is_working_day(
    schedule: &WorkSchedule,
    weekday: u8,
    special_working_day: bool,
    holiday: bool,
) -> bool {
    if special_working_day {
        true
    } else if holiday {
        false
    } else {
        schedule.is_work_day(weekday)
    }
}

/// Parses `+HH:MM`, `-HH:MM` or `Z` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours = two_digits(hours)?;
    let minutes = two_digits(minutes)?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn two_digits(raw: &str) -> Option<i32> {
    if raw.len() != 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn offset(raw: &str) -> FixedOffset {
        parse_utc_offset(raw).unwrap()
    }

    #[test]
    fn window_in_utc() {
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 15, 30, 0).unwrap();
        let window = DayWindow::containing(now, offset("+00:00")).unwrap();
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2026, 1, 7).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 1, 7, 0, 0, 0).unwrap());
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2026, 1, 7, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
        assert!(window.contains(now));
    }

    #[test]
    fn window_follows_local_day_east_of_utc() {
        // 20:00 UTC on the 6th is already 02:00 on the 7th at +06:00
        let now = Utc.with_ymd_and_hms(2026, 1, 6, 20, 0, 0).unwrap();
        let window = DayWindow::containing(now, offset("+06:00")).unwrap();
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2026, 1, 7).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 1, 6, 18, 0, 0).unwrap());
        assert_eq!(window.weekday(), 3);
    }

    #[test]
    fn window_follows_local_day_west_of_utc() {
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 2, 0, 0).unwrap();
        let window = DayWindow::containing(now, offset("-05:00")).unwrap();
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2026, 1, 6).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 1, 6, 5, 0, 0).unwrap());
    }

    #[test]
    fn overlap_is_inclusive_on_both_ends() {
        let window =
            DayWindow::for_date(NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(), offset("Z")).unwrap();
        assert!(window.overlaps(window.end, window.end + Duration::days(3)));
        assert!(window.overlaps(window.start - Duration::days(3), window.start));
        assert!(!window.overlaps(window.end + Duration::milliseconds(1), window.end + Duration::days(1)));
        assert!(!window.overlaps(window.start - Duration::days(1), window.start - Duration::milliseconds(1)));
    }

    #[test]
    fn dates_at_the_calendar_edges_have_no_window() {
        assert!(DayWindow::for_date(NaiveDate::MAX, offset("Z")).is_none());
        assert!(DayWindow::for_date(NaiveDate::MIN, offset("+14:00")).is_none());
        assert!(DayWindow::for_date(NaiveDate::MIN, offset("-05:00")).is_some());

        let last_instant = NaiveDate::MAX.and_hms_opt(23, 59, 59).unwrap().and_utc();
        assert!(DayWindow::containing(last_instant, offset("Z")).is_none());
        assert!(DayWindow::containing(last_instant, offset("+01:00")).is_none());
    }

    #[test]
    fn last_millisecond_is_stored_inside_the_day() {
        let window =
            DayWindow::for_date(NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(), offset("+06:00")).unwrap();
        let late = window.end + Duration::microseconds(900);
        assert_eq!(DayWindow::containing(late, offset("+06:00")), Some(window));

        let stored = stored_instant(late);
        assert_eq!(stored, window.end);
        assert!(window.contains(stored));
    }

    #[test]
    fn special_day_beats_holiday_beats_schedule() {
        let weekdays = WorkSchedule::default();
        let saturday = 6;
        let wednesday = 3;

        assert!(is_working_day(&weekdays, wednesday, false, false));
        assert!(!is_working_day(&weekdays, saturday, false, false));
        assert!(!is_working_day(&weekdays, wednesday, false, true));
        assert!(is_working_day(&weekdays, saturday, true, false));
        assert!(is_working_day(&weekdays, wednesday, true, true));
        assert!(is_working_day(&weekdays, saturday, true, true));
    }

    #[test]
    fn empty_schedule_only_works_on_special_days() {
        let none = WorkSchedule {
            work_days: BTreeSet::new(),
            ..WorkSchedule::default()
        };
        assert!((0..7).all(|d| !is_working_day(&none, d, false, false)));
        assert!(is_working_day(&none, 0, true, false));
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(offset("+06:00").local_minus_utc(), 6 * 3600);
        assert_eq!(offset("-03:30").local_minus_utc(), -(3 * 3600 + 1800));
        assert_eq!(offset("Z").local_minus_utc(), 0);
        assert!(parse_utc_offset("06:00").is_none());
        assert!(parse_utc_offset("+6").is_none());
        assert!(parse_utc_offset("+15:00").is_none());
        assert!(parse_utc_offset("").is_none());
        assert!(parse_utc_offset("+-05:00").is_none());
        assert!(parse_utc_offset("+05:-30").is_none());
        assert!(parse_utc_offset("++5:00").is_none());
        assert!(parse_utc_offset("+5:00").is_none());
    }
}
