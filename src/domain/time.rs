use chrono::{Datelike, Duration, NaiveDate};

pub const MINUTES_PER_SLOT: u32 = 10;
pub const MIN_VISIBLE_HEIGHT_PERCENT: f64 = 1.5;

/// Operating-day window. Hours past 24 belong to the next calendar day, so a
/// window of 5..29 runs from 05:00 to 03:00 the following morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Proportional timeline window (05:00 through 05:00+24h next day at 29).
pub const TIMELINE_WINDOW: DayWindow = DayWindow {
    start_hour: 5,
    end_hour: 29,
};

/// Slot-grid window (04:00 through 03:00 next day).
pub const SLOT_GRID_WINDOW: DayWindow = DayWindow {
    start_hour: 4,
    end_hour: 27,
};

impl DayWindow {
    pub fn total_minutes(&self) -> u32 {
        (self.end_hour - self.start_hour) * 60
    }

    pub fn slot_count(&self) -> usize {
        (self.total_minutes() / MINUTES_PER_SLOT) as usize
    }

    /// Minutes since the window start, treating times before `start_hour` as
    /// belonging to the next calendar day.
    pub fn day_minute(&self, time: &str) -> Result<u32, String> {
        let mut minutes = minutes_of_day(time)?;
        if minutes < self.start_hour * 60 {
            minutes += 24 * 60;
        }
        Ok(minutes - self.start_hour * 60)
    }

    pub fn slot_index(&self, time: &str) -> Result<usize, String> {
        let minute = self.day_minute(time)?;
        let index = (minute / MINUTES_PER_SLOT) as usize;
        Ok(index.min(self.slot_count().saturating_sub(1)))
    }

    /// Top offset of a start time as a percentage of the window height.
    pub fn position_percent(&self, time: &str) -> Result<f64, String> {
        let minute = self.day_minute(time)?;
        Ok(f64::from(minute) / f64::from(self.total_minutes()) * 100.0)
    }

    /// Height of a `[start, end)` range as a percentage, clamped so short
    /// entries stay visible.
    pub fn height_percent(&self, start: &str, end: &str) -> Result<f64, String> {
        let duration = duration_minutes(start, end)?;
        let raw = f64::from(duration) / f64::from(self.total_minutes()) * 100.0;
        Ok(raw.max(MIN_VISIBLE_HEIGHT_PERCENT))
    }
}

pub fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    minutes_of_day(value).map(|_| ()).map_err(|_| format!("{field_name} must be HH:MM"))
}

/// Minutes since midnight for a strict `HH:MM` string.
pub fn minutes_of_day(value: &str) -> Result<u32, String> {
    let mut split = value.split(':');
    let (Some(hour_str), Some(minute_str), None) = (split.next(), split.next(), split.next())
    else {
        return Err(format!("invalid time '{value}'"));
    };
    if hour_str.len() != 2 || minute_str.len() != 2 {
        return Err(format!("invalid time '{value}'"));
    }
    let hour = hour_str
        .parse::<u32>()
        .map_err(|_| format!("invalid time '{value}'"))?;
    let minute = minute_str
        .parse::<u32>()
        .map_err(|_| format!("invalid time '{value}'"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("invalid time '{value}'"));
    }
    Ok(hour * 60 + minute)
}

/// Duration in minutes from `start` to `end`, wrapping past midnight when the
/// end is at or before the start. Equal times mean a full day.
pub fn duration_minutes(start: &str, end: &str) -> Result<u32, String> {
    let start_minutes = minutes_of_day(start)?;
    let end_minutes = minutes_of_day(end)?;
    if end_minutes <= start_minutes {
        Ok(end_minutes + 24 * 60 - start_minutes)
    } else {
        Ok(end_minutes - start_minutes)
    }
}

pub fn add_minutes(time: &str, minutes: u32) -> Result<String, String> {
    let total = (minutes_of_day(time)? + minutes) % (24 * 60);
    Ok(format!("{:02}:{:02}", total / 60, total % 60))
}

/// ISO week id in `YYYY-Www` form, weeks starting Monday.
pub fn week_id_for(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sunday of the ISO week containing `date`.
pub fn week_end(date: NaiveDate) -> NaiveDate {
    week_start(date) + Duration::days(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn minutes_of_day_parses_strict_hhmm() {
        assert_eq!(minutes_of_day("00:00"), Ok(0));
        assert_eq!(minutes_of_day("23:59"), Ok(23 * 60 + 59));
        assert!(minutes_of_day("24:00").is_err());
        assert!(minutes_of_day("9:30").is_err());
        assert!(minutes_of_day("09:30:00").is_err());
        assert!(minutes_of_day("late").is_err());
    }

    #[test]
    fn duration_wraps_past_midnight() {
        assert_eq!(duration_minutes("23:30", "00:30"), Ok(60));
        assert_eq!(duration_minutes("09:00", "10:30"), Ok(90));
        assert_eq!(duration_minutes("10:00", "10:00"), Ok(24 * 60));
    }

    #[test]
    fn early_morning_sorts_after_late_evening() {
        for window in [TIMELINE_WINDOW, SLOT_GRID_WINDOW] {
            let late = window.day_minute("23:00").expect("valid");
            let early = window.day_minute("02:30").expect("valid");
            assert!(early > late);
        }
    }

    #[test]
    fn slot_index_matches_ten_minute_grid() {
        assert_eq!(SLOT_GRID_WINDOW.slot_count(), 138);
        assert_eq!(SLOT_GRID_WINDOW.slot_index("04:00"), Ok(0));
        assert_eq!(SLOT_GRID_WINDOW.slot_index("04:10"), Ok(1));
        assert_eq!(SLOT_GRID_WINDOW.slot_index("23:00"), Ok(114));
        assert_eq!(SLOT_GRID_WINDOW.slot_index("02:50"), Ok(137));
        // 03:00 falls outside the window and clamps to the last slot.
        assert_eq!(SLOT_GRID_WINDOW.slot_index("03:30"), Ok(137));
    }

    #[test]
    fn timeline_position_and_height() {
        let top = TIMELINE_WINDOW.position_percent("05:00").expect("valid");
        assert!(top.abs() < f64::EPSILON);
        let noon = TIMELINE_WINDOW.position_percent("17:00").expect("valid");
        assert!((noon - 50.0).abs() < 1e-9);

        let hour = TIMELINE_WINDOW.height_percent("09:00", "10:00").expect("valid");
        assert!((hour - 100.0 / 24.0).abs() < 1e-9);
        let tiny = TIMELINE_WINDOW.height_percent("09:00", "09:10").expect("valid");
        assert!((tiny - MIN_VISIBLE_HEIGHT_PERCENT).abs() < f64::EPSILON);
    }

    #[test]
    fn week_id_uses_iso_weeks_starting_monday() {
        assert_eq!(week_id_for(date("2026-01-19")), "2026-W04");
        assert_eq!(week_id_for(date("2026-01-25")), "2026-W04");
        assert_eq!(week_start(date("2026-01-21")), date("2026-01-19"));
        assert_eq!(week_end(date("2026-01-21")), date("2026-01-25"));
        // Jan 1 2027 belongs to ISO week 53 of 2026.
        assert_eq!(week_id_for(date("2027-01-01")), "2026-W53");
    }

    proptest! {
        #[test]
        fn duration_is_always_in_one_day(start_m in 0u32..1440, end_m in 0u32..1440) {
            let start = format!("{:02}:{:02}", start_m / 60, start_m % 60);
            let end = format!("{:02}:{:02}", end_m / 60, end_m % 60);
            let duration = duration_minutes(&start, &end).expect("valid inputs");
            prop_assert!(duration >= 1 && duration <= 1440);
            prop_assert_eq!((start_m + duration) % 1440, end_m % 1440);
        }

        #[test]
        fn add_minutes_inverts_duration(start_m in 0u32..1440, span in 1u32..1440) {
            let start = format!("{:02}:{:02}", start_m / 60, start_m % 60);
            let end = add_minutes(&start, span).expect("valid input");
            prop_assert_eq!(duration_minutes(&start, &end).expect("valid"), span);
        }
    }
}
