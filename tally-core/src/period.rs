//! Period resolution: symbolic time windows ("last week") to concrete date ranges.
//!
//! Everything here is a pure function of the supplied `now` (no clock reads),
//! so callers can pin an instant and get reproducible ranges.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Symbolic time-window selector. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeriodToken {
    #[default]
    Today,
    Yesterday,
    Week,
    LastWeek,
    Month,
    LastMonth,
    Year,
    LastYear,
    Custom,
}

impl PeriodToken {
    /// Lenient parse of a period word. Unknown or empty input degrades to
    /// `Today` — ambiguous natural-language phrases must not fail.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "today" => PeriodToken::Today,
            "yesterday" => PeriodToken::Yesterday,
            "week" | "this_week" => PeriodToken::Week,
            "last_week" => PeriodToken::LastWeek,
            "month" | "this_month" => PeriodToken::Month,
            "last_month" => PeriodToken::LastMonth,
            "year" | "this_year" => PeriodToken::Year,
            "last_year" => PeriodToken::LastYear,
            "custom" => PeriodToken::Custom,
            _ => PeriodToken::Today,
        }
    }

    /// Short English label for replies ("this week", "last month", ...).
    pub fn label(&self) -> &'static str {
        match self {
            PeriodToken::Today => "today",
            PeriodToken::Yesterday => "yesterday",
            PeriodToken::Week => "this week",
            PeriodToken::LastWeek => "last week",
            PeriodToken::Month => "this month",
            PeriodToken::LastMonth => "last month",
            PeriodToken::Year => "this year",
            PeriodToken::LastYear => "last year",
            PeriodToken::Custom => "that period",
        }
    }
}

/// Half-open range of naive local time: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Whether a calendar day falls inside the range (time-of-day ignored).
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.contains(day.and_time(NaiveTime::MIN))
    }

    /// The full day `[00:00, next midnight)`.
    pub fn single_day(day: NaiveDate) -> Self {
        DateRange {
            start: midnight(day),
            end: midnight(next_day(day)),
        }
    }
}

/// Resolve a symbolic token against `now`. `Custom` without explicit bounds
/// falls back to `Today`; use [`resolve_explicit`] when bounds are known.
pub fn resolve(token: PeriodToken, now: NaiveDateTime) -> DateRange {
    let today = now.date();
    match token {
        PeriodToken::Today | PeriodToken::Custom => DateRange::single_day(today),
        PeriodToken::Yesterday => DateRange::single_day(prev_day(today)),
        PeriodToken::Week => DateRange {
            start: midnight(week_start(today)),
            end: now,
        },
        PeriodToken::LastWeek => {
            let this_monday = week_start(today);
            DateRange {
                start: midnight(this_monday - Days::new(7)),
                end: midnight(this_monday),
            }
        }
        PeriodToken::Month => DateRange {
            start: midnight(month_start(today)),
            end: now,
        },
        PeriodToken::LastMonth => {
            let this_month = month_start(today);
            DateRange {
                start: midnight(prev_month_start(today)),
                end: midnight(this_month),
            }
        }
        PeriodToken::Year => DateRange {
            start: midnight(year_start(today.year())),
            end: now,
        },
        PeriodToken::LastYear => DateRange {
            start: midnight(year_start(today.year() - 1)),
            end: midnight(year_start(today.year())),
        },
    }
}

/// Resolve an explicit day or start/end pair, both taken as whole calendar
/// days. With neither supplied this degrades to `today`.
pub fn resolve_explicit(
    now: NaiveDateTime,
    day: Option<NaiveDate>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> DateRange {
    if let Some(d) = day {
        return DateRange::single_day(d);
    }
    match (start, end) {
        (Some(s), Some(e)) => DateRange {
            start: midnight(s),
            end: midnight(next_day(e)),
        },
        (Some(s), None) => DateRange {
            start: midnight(s),
            end: now,
        },
        _ => resolve(PeriodToken::Today, now),
    }
}

fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

fn next_day(d: NaiveDate) -> NaiveDate {
    d.checked_add_days(Days::new(1)).unwrap_or(d)
}

fn prev_day(d: NaiveDate) -> NaiveDate {
    d.checked_sub_days(Days::new(1)).unwrap_or(d)
}

fn week_start(d: NaiveDate) -> NaiveDate {
    d - Days::new(u64::from(d.weekday().num_days_from_monday()))
}

fn month_start(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap_or(d)
}

fn prev_month_start(d: NaiveDate) -> NaiveDate {
    let (y, m) = if d.month() == 1 {
        (d.year() - 1, 12)
    } else {
        (d.year(), d.month() - 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(d)
}

fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_today_is_full_day() {
        let now = at(2025, 7, 15, 10, 0);
        let r = resolve(PeriodToken::Today, now);
        assert_eq!(r.start, at(2025, 7, 15, 0, 0));
        assert_eq!(r.end, at(2025, 7, 16, 0, 0));
        assert!(r.contains(now));
    }

    #[test]
    fn test_yesterday_shifts_one_day() {
        let now = at(2025, 7, 15, 10, 0);
        let r = resolve(PeriodToken::Yesterday, now);
        assert!(r.contains_day(NaiveDate::from_ymd_opt(2025, 7, 14).unwrap()));
        assert!(!r.contains_day(now.date()));
    }

    #[test]
    fn test_week_starts_monday() {
        // 2025-07-15 is a Tuesday
        let now = at(2025, 7, 15, 10, 0);
        let r = resolve(PeriodToken::Week, now);
        assert_eq!(r.start.date().weekday(), Weekday::Mon);
        assert_eq!(r.start.date(), NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
        assert_eq!(r.end, now);
    }

    #[test]
    fn test_last_week_spans_exactly_seven_days() {
        let now = at(2025, 7, 15, 10, 0);
        let r = resolve(PeriodToken::LastWeek, now);
        assert_eq!(r.start.date().weekday(), Weekday::Mon);
        assert_eq!((r.end - r.start).num_days(), 7);
        // ends where the current week begins
        assert_eq!(r.end.date(), NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
    }

    #[test]
    fn test_last_month_across_january() {
        let now = at(2025, 1, 10, 9, 30);
        let r = resolve(PeriodToken::LastMonth, now);
        assert_eq!(r.start.date(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(r.end.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_year_to_date() {
        let now = at(2025, 7, 15, 10, 0);
        let r = resolve(PeriodToken::Year, now);
        assert_eq!(r.start.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(r.end, now);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let now = at(2025, 7, 15, 10, 0);
        for token in [
            PeriodToken::Today,
            PeriodToken::Yesterday,
            PeriodToken::Week,
            PeriodToken::LastWeek,
            PeriodToken::Month,
            PeriodToken::LastMonth,
            PeriodToken::Year,
            PeriodToken::LastYear,
        ] {
            assert_eq!(resolve(token, now), resolve(token, now));
        }
    }

    #[test]
    fn test_unknown_token_parses_to_today() {
        assert_eq!(PeriodToken::parse("fortnight"), PeriodToken::Today);
        assert_eq!(PeriodToken::parse(""), PeriodToken::Today);
        assert_eq!(PeriodToken::parse("LAST_WEEK"), PeriodToken::LastWeek);
    }

    #[test]
    fn test_custom_without_bounds_falls_back_to_today() {
        let now = at(2025, 7, 15, 10, 0);
        assert_eq!(
            resolve(PeriodToken::Custom, now),
            resolve(PeriodToken::Today, now)
        );
        assert_eq!(
            resolve_explicit(now, None, None, None),
            resolve(PeriodToken::Today, now)
        );
    }

    #[test]
    fn test_explicit_range_covers_both_endpoints() {
        let now = at(2025, 7, 15, 10, 0);
        let s = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let e = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let r = resolve_explicit(now, None, Some(s), Some(e));
        assert!(r.contains_day(s));
        assert!(r.contains_day(e));
        assert!(!r.contains_day(NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()));
    }

    #[test]
    fn test_explicit_single_day() {
        let now = at(2025, 7, 15, 10, 0);
        let d = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let r = resolve_explicit(now, Some(d), None, None);
        assert_eq!(r, DateRange::single_day(d));
    }
}
