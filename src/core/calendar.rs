//! Calendar helpers shared by the services.
//!
//! All day boundaries are UTC midnights.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// The instant a UTC day starts.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Half-open `[start, end)` range covering one UTC day.
#[must_use]
pub fn day_range(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(date);
    (start, start + chrono::Duration::days(1))
}

/// First day of the month containing `date`.
#[must_use]
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    // Subtracting (day - 1) days always lands on day 1 of the same month
    date - chrono::Duration::days(i64::from(date.day0()))
}

/// First day of the month after the one containing `date`.
#[must_use]
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    // Note: from_ymd_opt only returns None for invalid dates (e.g., Feb 30).
    // Day 1 of a month between 1 and 12 is always valid.
    #[allow(clippy::expect_used)]
    NaiveDate::from_ymd_opt(year, month, 1).expect("First day of next month is always valid")
}
