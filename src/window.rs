use chrono::{Datelike, Duration, Local, NaiveDate};

/// Number of days covered by the "last week" and "next week" windows.
pub const WEEK_DAYS: i64 = 7;
/// Look-back of the "last month" window.
pub const MONTH_DAYS: i64 = 30;

/// An inclusive window of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Between(NaiveDate, NaiveDate),
    From(NaiveDate),
    Unbounded,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            DateWindow::Between(start, end) => *start <= date && date <= *end,
            DateWindow::From(start) => *start <= date,
            DateWindow::Unbounded => true,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, DateWindow::Unbounded)
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

/// Window for a look-back phrase. Only the first matching phrase applies, in
/// the order "last week", "this week", "last month"; anything else filters
/// nothing.
pub fn lookback_window(phrase: &str, today: NaiveDate) -> DateWindow {
    let phrase = phrase.to_lowercase();

    if phrase.contains("last week") {
        DateWindow::Between(today - Duration::days(WEEK_DAYS), today)
    } else if phrase.contains("this week") {
        let start = start_of_week(today);
        DateWindow::Between(start, start + Duration::days(6))
    } else if phrase.contains("last month") {
        DateWindow::From(today - Duration::days(MONTH_DAYS))
    } else {
        DateWindow::Unbounded
    }
}

/// Window for scheduled items: the coming week for "next week" or "upcoming",
/// otherwise everything from today on.
pub fn upcoming_window(phrase: Option<&str>, today: NaiveDate) -> DateWindow {
    let phrase = phrase.map(str::to_lowercase).unwrap_or_default();

    if phrase.contains("next week") || phrase.contains("upcoming") {
        DateWindow::Between(today, today + Duration::days(WEEK_DAYS))
    } else {
        DateWindow::From(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn last_week_is_inclusive_on_both_ends() {
        let today = day(2026, 3, 12);
        let window = lookback_window("Scores from LAST WEEK", today);
        assert_eq!(window, DateWindow::Between(day(2026, 3, 5), today));
        assert!(window.contains(day(2026, 3, 5)));
        assert!(window.contains(today));
        assert!(!window.contains(day(2026, 3, 13)));
    }

    #[test]
    fn this_week_starts_on_monday() {
        // 2026-03-12 is a Thursday.
        let window = lookback_window("this week", day(2026, 3, 12));
        assert_eq!(window, DateWindow::Between(day(2026, 3, 9), day(2026, 3, 15)));

        let monday = lookback_window("this week", day(2026, 3, 9));
        assert_eq!(monday, DateWindow::Between(day(2026, 3, 9), day(2026, 3, 15)));
    }

    #[test]
    fn last_month_is_open_ended() {
        let today = day(2026, 3, 31);
        assert_eq!(lookback_window("last month", today), DateWindow::From(day(2026, 3, 1)));
    }

    #[test]
    fn first_matching_phrase_wins() {
        let today = day(2026, 3, 12);
        assert_eq!(
            lookback_window("last month or last week", today),
            DateWindow::Between(day(2026, 3, 5), today)
        );
    }

    #[test]
    fn unknown_phrase_passes_through() {
        assert!(lookback_window("this semester", day(2026, 3, 12)).is_unbounded());
    }

    #[test]
    fn upcoming_covers_the_next_seven_days() {
        let today = day(2026, 3, 12);
        assert_eq!(
            upcoming_window(Some("Next Week"), today),
            DateWindow::Between(today, day(2026, 3, 19))
        );
        assert_eq!(upcoming_window(Some("in april"), today), DateWindow::From(today));
        assert_eq!(upcoming_window(None, today), DateWindow::From(today));
    }
}
