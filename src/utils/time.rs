use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::str::FromStr;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Whole minutes between two instants, rounding half a minute up. Negative spans yield 0.
pub fn rounded_minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = end.signed_duration_since(start).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + MILLIS_PER_MINUTE / 2) / MILLIS_PER_MINUTE
}

pub fn parse_utc_offset(offset_str: &str) -> Result<FixedOffset> {
    FixedOffset::from_str(offset_str.trim())
        .map_err(|_| anyhow::anyhow!("Invalid UTC offset '{}'. Use +HH:MM or -HH:MM", offset_str))
}

pub fn parse_time_string(time_str: &str) -> Result<NaiveTime> {
    let time_str = time_str.trim();

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M") {
        return Ok(time);
    }

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M:%S") {
        return Ok(time);
    }

    Err(anyhow::anyhow!("Invalid time format. Use HH:MM or HH:MM:SS"))
}

/// Accepts `DD/MM/YYYY` (what users type) and `YYYY-MM-DD`.
pub fn parse_date_string(date_str: &str) -> Result<NaiveDate> {
    let date_str = date_str.trim();

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%d/%m/%Y") {
        return Ok(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow::anyhow!("Invalid date format. Use DD/MM/YYYY"))
}

/// Calendar day of `timestamp` in the given offset.
pub fn local_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// Instant at which `date` begins in the given offset.
pub fn start_of_local_day(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    local_to_utc(date, NaiveTime::MIN, offset)
}

pub fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

pub fn format_duration_minutes(minutes: i64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

pub fn format_time_local(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime.with_timezone(&offset).format("%H:%M").to_string()
}

pub fn format_datetime_local(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
