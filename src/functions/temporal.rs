// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Temporal constructors, truncation, component access and
//! `duration.between`
//!
//! Temporal values are chrono-backed. Constructors take no argument
//! (current instant, UTC), an ISO-8601 string, or a component map.

use super::{single, ScalarFn};
use crate::error::{GrafitoError, Result};
use crate::storage::value::parse_offset;
use crate::storage::{DurationValue, Value, ZonedTime};
use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveDateTime,
    NaiveTime, Timelike, Utc,
};
use std::collections::{BTreeMap, HashMap};

pub fn register(registry: &mut HashMap<&'static str, ScalarFn>) {
    registry.insert("date", date_fn);
    registry.insert("time", time_fn);
    registry.insert("localtime", localtime_fn);
    registry.insert("datetime", datetime_fn);
    registry.insert("localdatetime", localdatetime_fn);
    registry.insert("duration", duration_fn);
    registry.insert("duration.between", duration_between);
    registry.insert("date.truncate", |args| truncate_fn(args, "date.truncate"));
    registry.insert("datetime.truncate", |args| {
        truncate_fn(args, "datetime.truncate")
    });
    registry.insert("localdatetime.truncate", |args| {
        truncate_fn(args, "localdatetime.truncate")
    });
    registry.insert("time.truncate", |args| truncate_fn(args, "time.truncate"));
    registry.insert("localtime.truncate", |args| {
        truncate_fn(args, "localtime.truncate")
    });
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

fn date_fn(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::Date(now().date_naive())),
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| GrafitoError::QueryExecution(format!("invalid date string: {s}"))),
        [Value::Map(components)] => {
            let year = component_int(components, "year")?.unwrap_or(1970) as i32;
            let month = component_int(components, "month")?.unwrap_or(1) as u32;
            let day = component_int(components, "day")?.unwrap_or(1) as u32;
            NaiveDate::from_ymd_opt(year, month, day)
                .map(Value::Date)
                .ok_or_else(|| {
                    GrafitoError::QueryExecution(format!(
                        "invalid date components: {year}-{month}-{day}"
                    ))
                })
        }
        [Value::Date(d)] => Ok(Value::Date(*d)),
        [Value::DateTime(dt)] => Ok(Value::Date(dt.date_naive())),
        [Value::LocalDateTime(dt)] => Ok(Value::Date(dt.date())),
        [other] => Err(bad_argument("date", other)),
        _ => Err(too_many("date")),
    }
}

fn localtime_fn(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::LocalTime(now().time())),
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Value::LocalTime)
            .map_err(|_| GrafitoError::QueryExecution(format!("invalid time string: {s}"))),
        [Value::Map(components)] => Ok(Value::LocalTime(time_from_components(components)?)),
        [Value::LocalTime(t)] => Ok(Value::LocalTime(*t)),
        [Value::Time(t)] => Ok(Value::LocalTime(t.time)),
        [Value::LocalDateTime(dt)] => Ok(Value::LocalTime(dt.time())),
        [Value::DateTime(dt)] => Ok(Value::LocalTime(dt.time())),
        [other] => Err(bad_argument("localtime", other)),
        _ => Err(too_many("localtime")),
    }
}

fn time_fn(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::Time(ZonedTime {
            time: now().time(),
            offset: FixedOffset::east_opt(0).expect("utc offset"),
        })),
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => {
            let offset_at = s
                .rfind(['+', '-', 'Z'])
                .filter(|&i| i >= 5)
                .ok_or_else(|| {
                    GrafitoError::QueryExecution(format!("time string needs an offset: {s}"))
                })?;
            let (time_part, offset_part) = s.split_at(offset_at);
            let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M"))
                .map_err(|_| GrafitoError::QueryExecution(format!("invalid time string: {s}")))?;
            let offset = parse_offset(offset_part).ok_or_else(|| {
                GrafitoError::QueryExecution(format!("invalid offset in time string: {s}"))
            })?;
            Ok(Value::Time(ZonedTime { time, offset }))
        }
        [Value::Map(components)] => {
            let time = time_from_components(components)?;
            let offset = map_offset(components)?;
            Ok(Value::Time(ZonedTime { time, offset }))
        }
        [Value::Time(t)] => Ok(Value::Time(*t)),
        [other] => Err(bad_argument("time", other)),
        _ => Err(too_many("time")),
    }
}

fn localdatetime_fn(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::LocalDateTime(now().naive_utc())),
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .map(Value::LocalDateTime)
            .map_err(|_| {
                GrafitoError::QueryExecution(format!("invalid local datetime string: {s}"))
            }),
        [Value::Map(components)] => {
            let Value::Date(date) = date_fn(&[Value::Map(components.clone())])? else {
                unreachable!("date constructor returns a date");
            };
            let time = time_from_components(components)?;
            Ok(Value::LocalDateTime(date.and_time(time)))
        }
        [Value::LocalDateTime(dt)] => Ok(Value::LocalDateTime(*dt)),
        [Value::DateTime(dt)] => Ok(Value::LocalDateTime(dt.naive_local())),
        [Value::Date(d)] => Ok(Value::LocalDateTime(
            d.and_hms_opt(0, 0, 0).expect("midnight exists"),
        )),
        [other] => Err(bad_argument("localdatetime", other)),
        _ => Err(too_many("localdatetime")),
    }
}

fn datetime_fn(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::DateTime(now())),
        [Value::Null] => Ok(Value::Null),
        [Value::String(s)] => DateTime::parse_from_rfc3339(s)
            .map(Value::DateTime)
            .map_err(|_| GrafitoError::QueryExecution(format!("invalid datetime string: {s}"))),
        [Value::Map(components)] => {
            let Value::LocalDateTime(naive) = localdatetime_fn(&[Value::Map(components.clone())])?
            else {
                unreachable!("localdatetime constructor returns a value");
            };
            let offset = map_offset(components)?;
            match naive.and_local_timezone(offset) {
                chrono::LocalResult::Single(dt) => Ok(Value::DateTime(dt)),
                _ => Err(GrafitoError::QueryExecution(
                    "datetime components out of range".to_string(),
                )),
            }
        }
        [Value::DateTime(dt)] => Ok(Value::DateTime(*dt)),
        [Value::LocalDateTime(dt)] => match dt.and_local_timezone(utc()) {
            chrono::LocalResult::Single(out) => Ok(Value::DateTime(out)),
            _ => Err(GrafitoError::QueryExecution(
                "datetime out of range".to_string(),
            )),
        },
        [Value::Date(d)] => {
            let naive = d.and_hms_opt(0, 0, 0).expect("midnight exists");
            Ok(Value::DateTime(DateTime::from_naive_utc_and_offset(
                naive,
                utc(),
            )))
        }
        [other] => Err(bad_argument("datetime", other)),
        _ => Err(too_many("datetime")),
    }
}

fn duration_fn(args: &[Value]) -> Result<Value> {
    match single(args, "duration")? {
        Value::Null => Ok(Value::Null),
        Value::String(s) => DurationValue::parse(s).map(Value::Duration),
        Value::Map(components) => {
            let int = |key: &str| component_int(components, key).map(|v| v.unwrap_or(0));
            Ok(Value::Duration(DurationValue {
                months: int("years")? * 12 + int("months")?,
                days: int("weeks")? * 7 + int("days")?,
                seconds: int("hours")? * 3600 + int("minutes")? * 60 + int("seconds")?,
                nanos: (int("milliseconds")? * 1_000_000 + int("nanoseconds")?) as i32,
            }))
        }
        Value::Duration(d) => Ok(Value::Duration(*d)),
        other => Err(bad_argument("duration", other)),
    }
}

/// Calendar-aware difference between two temporal values
fn duration_between(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(too_many("duration.between"));
    }
    if args[0].is_null() || args[1].is_null() {
        return Ok(Value::Null);
    }
    let from = as_naive_datetime(&args[0], "duration.between")?;
    let to = as_naive_datetime(&args[1], "duration.between")?;

    // Whole months first, then days, then the sub-day remainder.
    let mut months = (to.year() as i64 - from.year() as i64) * 12
        + (to.month() as i64 - from.month() as i64);
    let mut anchor = shift_months(from, months)?;
    if to >= from && anchor > to {
        months -= 1;
        anchor = shift_months(from, months)?;
    } else if to < from && anchor < to {
        months += 1;
        anchor = shift_months(from, months)?;
    }
    let remainder = to - anchor;
    let days = remainder.num_days();
    let sub_day = remainder - ChronoDuration::days(days);
    let seconds = sub_day.num_seconds();
    let nanos = (sub_day - ChronoDuration::seconds(seconds))
        .num_nanoseconds()
        .unwrap_or(0) as i32;
    Ok(Value::Duration(DurationValue {
        months,
        days,
        seconds,
        nanos,
    }))
}

fn shift_months(dt: NaiveDateTime, months: i64) -> Result<NaiveDateTime> {
    let months_abs = chrono::Months::new(months.unsigned_abs() as u32);
    let date = if months >= 0 {
        dt.date().checked_add_months(months_abs)
    } else {
        dt.date().checked_sub_months(months_abs)
    };
    date.map(|d| d.and_time(dt.time()))
        .ok_or_else(|| GrafitoError::QueryExecution("date arithmetic overflow".to_string()))
}

fn as_naive_datetime(value: &Value, name: &str) -> Result<NaiveDateTime> {
    match value {
        Value::Date(d) => Ok(d.and_hms_opt(0, 0, 0).expect("midnight exists")),
        Value::LocalDateTime(dt) => Ok(*dt),
        Value::DateTime(dt) => Ok(dt.naive_utc()),
        Value::LocalTime(t) => Ok(NaiveDate::from_ymd_opt(1970, 1, 1)
            .expect("epoch exists")
            .and_time(*t)),
        Value::Time(t) => Ok(NaiveDate::from_ymd_opt(1970, 1, 1)
            .expect("epoch exists")
            .and_time(t.time)),
        other => Err(bad_argument(name, other)),
    }
}

/// `<type>.truncate(unit, value)`
fn truncate_fn(args: &[Value], name: &str) -> Result<Value> {
    if args.len() != 2 {
        return Err(GrafitoError::QueryExecution(format!(
            "{name}() expects (unit, value)"
        )));
    }
    if args[1].is_null() {
        return Ok(Value::Null);
    }
    let Value::String(unit) = &args[0] else {
        return Err(bad_argument(name, &args[0]));
    };
    let unit = unit.to_ascii_lowercase();
    match &args[1] {
        Value::Date(d) => Ok(Value::Date(truncate_date(*d, &unit)?)),
        Value::LocalDateTime(dt) => {
            if matches!(unit.as_str(), "hour" | "minute" | "second" | "millisecond") {
                Ok(Value::LocalDateTime(dt.date().and_time(truncate_time(dt.time(), &unit)?)))
            } else {
                let date = truncate_date(dt.date(), &unit)?;
                Ok(Value::LocalDateTime(
                    date.and_hms_opt(0, 0, 0).expect("midnight exists"),
                ))
            }
        }
        Value::DateTime(dt) => {
            let naive = dt.naive_local();
            let truncated = if matches!(unit.as_str(), "hour" | "minute" | "second" | "millisecond")
            {
                naive.date().and_time(truncate_time(naive.time(), &unit)?)
            } else {
                truncate_date(naive.date(), &unit)?
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight exists")
            };
            match truncated.and_local_timezone(*dt.offset()) {
                chrono::LocalResult::Single(out) => Ok(Value::DateTime(out)),
                _ => Err(GrafitoError::QueryExecution(
                    "datetime truncation out of range".to_string(),
                )),
            }
        }
        Value::LocalTime(t) => Ok(Value::LocalTime(truncate_time(*t, &unit)?)),
        Value::Time(t) => Ok(Value::Time(ZonedTime {
            time: truncate_time(t.time, &unit)?,
            offset: t.offset,
        })),
        other => Err(bad_argument(name, other)),
    }
}

fn truncate_date(date: NaiveDate, unit: &str) -> Result<NaiveDate> {
    let out = match unit {
        "year" => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        "quarter" => {
            let month = ((date.month() - 1) / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1)
        }
        "month" => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        "week" => {
            let weekday = date.weekday().num_days_from_monday() as i64;
            date.checked_sub_signed(ChronoDuration::days(weekday))
        }
        "day" => Some(date),
        _ => {
            return Err(GrafitoError::QueryExecution(format!(
                "unknown truncation unit: {unit}"
            )))
        }
    };
    out.ok_or_else(|| GrafitoError::QueryExecution("date truncation out of range".to_string()))
}

fn truncate_time(time: NaiveTime, unit: &str) -> Result<NaiveTime> {
    let out = match unit {
        "hour" => NaiveTime::from_hms_opt(time.hour(), 0, 0),
        "minute" => NaiveTime::from_hms_opt(time.hour(), time.minute(), 0),
        "second" => NaiveTime::from_hms_opt(time.hour(), time.minute(), time.second()),
        "millisecond" => NaiveTime::from_hms_milli_opt(
            time.hour(),
            time.minute(),
            time.second(),
            time.nanosecond() / 1_000_000,
        ),
        "day" => NaiveTime::from_hms_opt(0, 0, 0),
        _ => {
            return Err(GrafitoError::QueryExecution(format!(
                "unknown truncation unit: {unit}"
            )))
        }
    };
    out.ok_or_else(|| GrafitoError::QueryExecution("time truncation out of range".to_string()))
}

/// Component access on temporal values, reached through property syntax
/// (`d.year`, `t.hour`, `dur.days`, …). Unknown components are NULL,
/// matching map-style access.
pub fn component(value: &Value, name: &str) -> Value {
    match value {
        Value::Date(d) => date_component(*d, name),
        Value::LocalDateTime(dt) => date_component(dt.date(), name)
            .non_null_or_else(|| time_component(dt.time(), name)),
        Value::DateTime(dt) => {
            let naive = dt.naive_local();
            let base = date_component(naive.date(), name)
                .non_null_or_else(|| time_component(naive.time(), name));
            match name {
                "offset" => Value::String(dt.offset().to_string()),
                "epochSeconds" => Value::Int(dt.timestamp()),
                "epochMillis" => Value::Int(dt.timestamp_millis()),
                _ => base,
            }
        }
        Value::LocalTime(t) => time_component(*t, name),
        Value::Time(t) => match name {
            "offset" => Value::String(t.offset.to_string()),
            _ => time_component(t.time, name),
        },
        Value::Duration(d) => duration_component(d, name),
        _ => Value::Null,
    }
}

trait NonNullOr {
    fn non_null_or_else(self, fallback: impl FnOnce() -> Value) -> Value;
}

impl NonNullOr for Value {
    fn non_null_or_else(self, fallback: impl FnOnce() -> Value) -> Value {
        if self.is_null() {
            fallback()
        } else {
            self
        }
    }
}

fn date_component(date: NaiveDate, name: &str) -> Value {
    match name {
        "year" => Value::Int(date.year() as i64),
        "quarter" => Value::Int(((date.month() - 1) / 3 + 1) as i64),
        "month" => Value::Int(date.month() as i64),
        "week" => Value::Int(date.iso_week().week() as i64),
        "day" => Value::Int(date.day() as i64),
        "ordinalDay" => Value::Int(date.ordinal() as i64),
        "dayOfWeek" => Value::Int(date.weekday().number_from_monday() as i64),
        _ => Value::Null,
    }
}

fn time_component(time: NaiveTime, name: &str) -> Value {
    match name {
        "hour" => Value::Int(time.hour() as i64),
        "minute" => Value::Int(time.minute() as i64),
        "second" => Value::Int(time.second() as i64),
        "millisecond" => Value::Int((time.nanosecond() / 1_000_000) as i64),
        "microsecond" => Value::Int((time.nanosecond() / 1_000) as i64),
        "nanosecond" => Value::Int(time.nanosecond() as i64),
        _ => Value::Null,
    }
}

fn duration_component(d: &DurationValue, name: &str) -> Value {
    match name {
        "years" => Value::Int(d.months / 12),
        "months" => Value::Int(d.months),
        "monthsOfYear" => Value::Int(d.months % 12),
        "weeks" => Value::Int(d.days / 7),
        "days" => Value::Int(d.days),
        "hours" => Value::Int(d.seconds / 3600),
        "minutes" => Value::Int(d.seconds / 60),
        "seconds" => Value::Int(d.seconds),
        "milliseconds" => Value::Int(d.seconds * 1000 + d.nanos as i64 / 1_000_000),
        "nanoseconds" => Value::Int(d.seconds * 1_000_000_000 + d.nanos as i64),
        _ => Value::Null,
    }
}

fn component_int(components: &BTreeMap<String, Value>, key: &str) -> Result<Option<i64>> {
    match components.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Int(i)) => Ok(Some(*i)),
        Some(other) => Err(GrafitoError::QueryExecution(format!(
            "temporal component '{key}' must be an integer, got {}",
            other.type_name()
        ))),
    }
}

fn time_from_components(components: &BTreeMap<String, Value>) -> Result<NaiveTime> {
    let hour = component_int(components, "hour")?.unwrap_or(0) as u32;
    let minute = component_int(components, "minute")?.unwrap_or(0) as u32;
    let second = component_int(components, "second")?.unwrap_or(0) as u32;
    let milli = component_int(components, "millisecond")?.unwrap_or(0) as u32;
    NaiveTime::from_hms_milli_opt(hour, minute, second, milli).ok_or_else(|| {
        GrafitoError::QueryExecution(format!(
            "invalid time components: {hour}:{minute}:{second}.{milli}"
        ))
    })
}

fn map_offset(components: &BTreeMap<String, Value>) -> Result<FixedOffset> {
    match components.get("timezone") {
        None | Some(Value::Null) => Ok(utc()),
        Some(Value::String(s)) => parse_offset(s).ok_or_else(|| {
            GrafitoError::QueryExecution(format!("invalid timezone offset: {s}"))
        }),
        Some(other) => Err(bad_argument("timezone", other)),
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).expect("utc offset")
}

fn bad_argument(name: &str, value: &Value) -> GrafitoError {
    GrafitoError::QueryExecution(format!(
        "{name}() cannot be built from {}",
        value.type_name()
    ))
}

fn too_many(name: &str) -> GrafitoError {
    GrafitoError::QueryExecution(format!("wrong number of arguments for {name}()"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_from_string_and_map() {
        let from_str = date_fn(&[Value::from("2024-03-15")]).unwrap();
        let mut map = BTreeMap::new();
        map.insert("year".to_string(), Value::Int(2024));
        map.insert("month".to_string(), Value::Int(3));
        map.insert("day".to_string(), Value::Int(15));
        let from_map = date_fn(&[Value::Map(map)]).unwrap();
        assert_eq!(from_str, from_map);
    }

    #[test]
    fn test_duration_between_months_and_days() {
        let a = date_fn(&[Value::from("2020-01-31")]).unwrap();
        let b = date_fn(&[Value::from("2020-03-01")]).unwrap();
        let Value::Duration(d) = duration_between(&[a, b]).unwrap() else {
            panic!("duration expected");
        };
        assert_eq!(d.months, 1);
        assert_eq!(d.days, 1);
    }

    #[test]
    fn test_truncate_to_month() {
        let d = date_fn(&[Value::from("2024-03-15")]).unwrap();
        let truncated = truncate_fn(&[Value::from("month"), d], "date.truncate").unwrap();
        assert_eq!(truncated, date_fn(&[Value::from("2024-03-01")]).unwrap());
    }

    #[test]
    fn test_component_access() {
        let d = date_fn(&[Value::from("2024-03-15")]).unwrap();
        assert_eq!(component(&d, "year"), Value::Int(2024));
        assert_eq!(component(&d, "quarter"), Value::Int(1));
        assert_eq!(component(&d, "nope"), Value::Null);
    }

    #[test]
    fn test_duration_components() {
        let d = Value::Duration(DurationValue::new(14, 10, 3_661, 0));
        assert_eq!(component(&d, "years"), Value::Int(1));
        assert_eq!(component(&d, "monthsOfYear"), Value::Int(2));
        assert_eq!(component(&d, "hours"), Value::Int(1));
    }
}
