//! Epidemiological week calculator.
//!
//! Epi week 1 of a year starts on the year's first Sunday. Days that fall
//! before that Sunday belong to the last epi week of the previous year, so
//! the epi year returned here can differ from the calendar year of the input.
//! Anything keyed by epi week must use [`EpiWeek::year`], never the calendar
//! year of the date.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::Serialize;

use crate::error::{Result, VematError};

// ---

/// An (epi-year, epi-week) pair. Weeks run 1..=53 with no upper clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EpiWeek {
    // ---
    pub year: i32,
    pub week: u32,
}

impl EpiWeek {
    /// Grouping key, e.g. `2024-EW07`.
    pub fn key(&self) -> String {
        format!("{}-EW{:02}", self.year, self.week)
    }

    /// Display label used by dashboards, e.g. `SE 7/2024`.
    pub fn label(&self) -> String {
        format!("SE {}/{}", self.week, self.year)
    }
}

impl fmt::Display for EpiWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-EW{:02}", self.year, self.week)
    }
}

/// Compute the epi week of a calendar day.
pub fn epi_week(date: NaiveDate) -> EpiWeek {
    // ---
    let first_sunday = first_sunday_of(date.year());

    if date < first_sunday {
        // Dec 31 is always on or after that year's first Sunday, so this
        // recurses at most once.
        if let Some(prev_year_last_day) = NaiveDate::from_ymd_opt(date.year() - 1, 12, 31) {
            return epi_week(prev_year_last_day);
        }
    }

    let days = (date - first_sunday).num_days().max(0);
    EpiWeek {
        year: date.year(),
        week: (days / 7) as u32 + 1,
    }
}

/// Epi week of an instant, taken on its UTC calendar day.
pub fn epi_week_of(ts: DateTime<Utc>) -> EpiWeek {
    epi_week(ts.date_naive())
}

/// Parse `YYYY-MM-DD` or an RFC 3339 timestamp and compute its epi week.
pub fn epi_week_from_str(input: &str) -> Result<EpiWeek> {
    // ---
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(epi_week(date));
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| epi_week_of(ts.with_timezone(&Utc)))
        .map_err(|e| VematError::invalid(format!("unparseable date '{}': {}", input, e)))
}

/// First Sunday on or after Jan 1 of `year`.
fn first_sunday_of(year: i32) -> NaiveDate {
    // ---
    let mut day = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN);
    while day.weekday() != Weekday::Sun {
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    day
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ew(year: i32, week: u32) -> EpiWeek {
        EpiWeek { year, week }
    }

    #[test]
    fn test_jan_first_on_sunday_is_week_one() {
        // ---
        // 2023-01-01 is a Sunday
        assert_eq!(epi_week(ymd(2023, 1, 1)), ew(2023, 1));
        assert_eq!(epi_week(ymd(2023, 1, 7)), ew(2023, 1));
        assert_eq!(epi_week(ymd(2023, 1, 8)), ew(2023, 2));
    }

    #[test]
    fn test_early_january_rolls_back_to_previous_year() {
        // ---
        // 2024-01-01 is a Monday; first Sunday is Jan 7
        assert_eq!(epi_week(ymd(2024, 1, 1)), ew(2023, 53));
        assert_eq!(epi_week(ymd(2024, 1, 6)), ew(2023, 53));
        assert_eq!(epi_week(ymd(2024, 1, 7)), ew(2024, 1));

        // 2025-01-01 is a Wednesday; first Sunday is Jan 5
        assert_eq!(epi_week(ymd(2025, 1, 4)), ew(2024, 52));
        assert_eq!(epi_week(ymd(2025, 1, 5)), ew(2025, 1));
        assert_eq!(epi_week(ymd(2025, 1, 11)), ew(2025, 1));
        assert_eq!(epi_week(ymd(2025, 1, 12)), ew(2025, 2));
    }

    #[test]
    fn test_mid_year_and_year_end() {
        // ---
        assert_eq!(epi_week(ymd(2024, 3, 10)), ew(2024, 10));
        assert_eq!(epi_week(ymd(2024, 6, 15)), ew(2024, 23));
        assert_eq!(epi_week(ymd(2022, 12, 31)), ew(2022, 52));
        assert_eq!(epi_week(ymd(2025, 12, 31)), ew(2025, 52));
        assert_eq!(epi_week(ymd(2026, 1, 1)), ew(2025, 52));
        assert_eq!(epi_week(ymd(2026, 1, 4)), ew(2026, 1));
    }

    #[test]
    fn test_year_boundary_shares_week_unless_jan_first_is_sunday() {
        // ---
        for year in 1990..2100 {
            let dec31 = epi_week(ymd(year, 12, 31));
            let jan1_date = ymd(year + 1, 1, 1);
            let jan1 = epi_week(jan1_date);

            if jan1_date.weekday() == Weekday::Sun {
                assert_ne!(dec31, jan1, "year {}", year);
                assert_eq!(jan1, ew(year + 1, 1));
            } else {
                assert_eq!(dec31, jan1, "year {}", year);
            }
        }
    }

    #[test]
    fn test_first_sunday_opens_new_week() {
        // ---
        for year in 1990..2100 {
            let sunday = first_sunday_of(year);
            assert_eq!(sunday.weekday(), Weekday::Sun);
            assert!(sunday.day() <= 7);

            let before = epi_week(sunday - Duration::days(1));
            let at = epi_week(sunday);
            assert_ne!(before, at, "year {}", year);
            assert_eq!(at, ew(year, 1));
        }
    }

    #[test]
    fn test_monotonic_within_year() {
        // ---
        let mut day = ymd(2024, 1, 1);
        let mut prev = epi_week(day);
        while day < ymd(2024, 12, 31) {
            day = day.succ_opt().unwrap();
            let cur = epi_week(day);
            assert!(cur >= prev, "{} went backwards", day);
            prev = cur;
        }
    }

    #[test]
    fn test_timestamp_uses_utc_day() {
        // ---
        let late = Utc.with_ymd_and_hms(2024, 1, 6, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap();
        assert_eq!(epi_week_of(late), ew(2023, 53));
        assert_eq!(epi_week_of(next), ew(2024, 1));
    }

    #[test]
    fn test_parse_inputs() {
        // ---
        assert_eq!(epi_week_from_str("2024-01-07").unwrap(), ew(2024, 1));
        assert_eq!(
            epi_week_from_str("2024-01-07T10:00:00Z").unwrap(),
            ew(2024, 1)
        );
        // 2024-01-07T02:00+05:00 is still Jan 6 in UTC
        assert_eq!(
            epi_week_from_str("2024-01-07T02:00:00+05:00").unwrap(),
            ew(2023, 53)
        );

        let err = epi_week_from_str("not-a-date").unwrap_err();
        assert!(matches!(err, VematError::InvalidArgument(_)));
        assert!(epi_week_from_str("2024-02-30").is_err());
    }

    #[test]
    fn test_key_and_label_format() {
        // ---
        let week = ew(2024, 7);
        assert_eq!(week.key(), "2024-EW07");
        assert_eq!(week.to_string(), "2024-EW07");
        assert_eq!(week.label(), "SE 7/2024");
        assert_eq!(ew(2023, 53).key(), "2023-EW53");
    }
}
