use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const BLOCKS_PER_YEAR: u8 = 13;
pub const BLOCK_LENGTH_DAYS: i64 = 28;

/// Signed day count from `a` to `b`.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Inclusive walk over `[start, end]`; empty when the range is inverted.
pub fn iter_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors((start <= end).then_some(start), move |d| {
        d.succ_opt().filter(|next| *next <= end)
    })
}

pub fn is_weekend(date: NaiveDate, weekend_definition: &[Weekday]) -> bool {
    weekend_definition.contains(&date.weekday())
}

/// Statutory dates observed every year regardless of configuration.
pub fn fixed_holidays(year: i32) -> [NaiveDate; 3] {
    [
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(year, 7, 4).unwrap(),
        NaiveDate::from_ymd_opt(year, 12, 25).unwrap(),
    ]
}

pub fn is_holiday(date: NaiveDate, configured: &[NaiveDate]) -> bool {
    configured.contains(&date) || fixed_holidays(date.year()).contains(&date)
}

/// Days in `[start, end]` that are not holidays.
pub fn working_days(start: NaiveDate, end: NaiveDate, configured_holidays: &[NaiveDate]) -> u32 {
    iter_days(start, end)
        .filter(|d| !is_holiday(*d, configured_holidays))
        .count() as u32
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (start, end) = month_span(year, month)?;
    Some((days_between(start, end) + 1) as u32)
}

/// First and last day of a calendar month. `month` is 1-based.
pub fn month_span(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

/// Month document id, zero-padded: "2025-02".
pub fn month_id(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

/// ISO-week document id: "2025-W07".
pub fn week_id(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// "2025-2026" for the year starting July 2025.
pub fn academic_year_id(start_year: i32) -> String {
    format!("{}-{}", start_year, start_year + 1)
}

/// Validates "YYYY-YYYY" with consecutive years; returns the start year.
pub fn parse_academic_year_id(id: &str) -> Option<i32> {
    let (first, second) = id.split_once('-')?;
    let first: i32 = first.parse().ok()?;
    let second: i32 = second.parse().ok()?;
    (second == first + 1).then_some(first)
}

/// The 13 block spans of an academic year, starting July 1.
pub fn block_spans(start_year: i32) -> Vec<(u8, NaiveDate, NaiveDate)> {
    let july_first = NaiveDate::from_ymd_opt(start_year, 7, 1)
        .expect("July 1 exists in every year");
    (0..BLOCKS_PER_YEAR)
        .map(|i| {
            let start = july_first + Duration::days(i64::from(i) * BLOCK_LENGTH_DAYS);
            let end = start + Duration::days(BLOCK_LENGTH_DAYS - 1);
            (i + 1, start, end)
        })
        .collect()
}
