//! Week windowing and schedule aggregation.
//!
//! All day values are exchanged as canonical `YYYY-MM-DD` strings, whose
//! lexical order matches chronological order. That invariant is what makes
//! the repository's string range queries correct, so the only place a day
//! string may be produced or parsed is this module.

use std::{collections::HashMap, error::Error as StdError, fmt};

use itertools::Itertools as _;
use serde::Serialize;
use time::{Date, Duration, Month, Weekday};

use crate::{
    api,
    db::{self, shift::ShiftWithEmployee},
};

/// The Monday..Sunday window containing a reference date, shifted by whole
/// weeks. Positive offsets move into the future.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WeekRange {
    pub start: Date,
    pub end: Date,
    pub start_label: String,
    pub end_label: String,
    /// Canonical day keys for the start and end dates, suitable for
    /// inclusive range queries.
    pub range_key: (String, String),
}

pub fn week_range(today: Date, offset_weeks: i64) -> WeekRange {
    let back_to_monday =
        i64::from(today.weekday().number_days_from_monday());
    let monday =
        today - Duration::days(back_to_monday) + Duration::weeks(offset_weeks);
    let sunday = monday + Duration::days(6);

    WeekRange {
        start: monday,
        end: sunday,
        start_label: short_label(monday),
        end_label: short_label(sunday),
        range_key: (day_key(monday), day_key(sunday)),
    }
}

/// Canonical `YYYY-MM-DD` key for a calendar date.
pub fn day_key(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day(),
    )
}

/// Strict inverse of [`day_key`]. Anything else, including the legacy
/// `DD.MM.YYYY` form found in old records, is an error.
pub fn parse_day_key(s: &str) -> Result<Date, InvalidDayKey> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
    if !shape_ok {
        return Err(InvalidDayKey);
    }

    let year = s[0..4].parse::<i32>().map_err(|_| InvalidDayKey)?;
    let month = s[5..7].parse::<u8>().map_err(|_| InvalidDayKey)?;
    let day = s[8..10].parse::<u8>().map_err(|_| InvalidDayKey)?;

    let month = Month::try_from(month).map_err(|_| InvalidDayKey)?;
    Date::from_calendar_date(year, month, day).map_err(|_| InvalidDayKey)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidDayKey;

impl fmt::Display for InvalidDayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day is not in canonical YYYY-MM-DD form")
    }
}

impl StdError for InvalidDayKey {}

/// Display label like "Monday, 14 July". Never used for comparison or
/// storage.
pub fn day_label(date: Date) -> String {
    format!(
        "{}, {} {}",
        weekday_name(date.weekday()),
        date.day(),
        month_name(date.month()),
    )
}

fn short_label(date: Date) -> String {
    format!("{:02} {}", date.day(), month_abbr(date.month()))
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    }
}

fn month_name(month: Month) -> &'static str {
    match month {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    }
}

fn month_abbr(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

/// Groups joined shifts by their canonical day string. One keying scheme
/// only: raw day strings, never re-derived dates.
pub fn group_by_day(
    shifts: Vec<ShiftWithEmployee>,
) -> HashMap<String, Vec<ShiftWithEmployee>> {
    shifts
        .into_iter()
        .map(|s| (s.shift.day.clone(), s))
        .into_group_map()
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub start: String,
    pub end: String,
    pub start_label: String,
    pub end_label: String,
    /// Exactly 7 entries, Monday first, ascending calendar order.
    pub days: Vec<DayEntry>,
    /// The non-empty subsequence of `days`, order preserved.
    pub days_with_shifts: Vec<DayEntry>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub day_key: String,
    pub label: String,
    pub shifts: Vec<api::Shift>,
}

/// Builds the grouped week view served to schedule screens.
///
/// Shifts whose employee reference does not resolve are dropped here: a
/// grouped view never surfaces a dangling reference.
pub async fn week_view(
    db_client: &db::Client,
    today: Date,
    offset_weeks: i64,
) -> Result<WeekView, db::Error> {
    let range = week_range(today, offset_weeks);
    let (start_key, end_key) = range.range_key.clone();

    let shifts = db_client
        .get_shifts_by_date_range(&start_key, &end_key)
        .await?;
    let resolved = shifts
        .into_iter()
        .filter(|s| s.employee_name.is_some())
        .collect();
    let mut by_day = group_by_day(resolved);

    let days = (0..7)
        .map(|i| {
            let date = range.start + Duration::days(i);
            let key = day_key(date);
            let shifts = by_day
                .remove(&key)
                .unwrap_or_default()
                .into_iter()
                .map(api::Shift::from)
                .collect();
            DayEntry {
                day_key: key,
                label: day_label(date),
                shifts,
            }
        })
        .collect::<Vec<_>>();

    let days_with_shifts = days
        .iter()
        .filter(|d| !d.shifts.is_empty())
        .cloned()
        .collect();

    Ok(WeekView {
        start: start_key,
        end: end_key,
        start_label: range.start_label,
        end_label: range.end_label,
        days,
        days_with_shifts,
    })
}
