// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system for graph properties
//!
//! Properties are JSON-typed: null, boolean, 64-bit integer, 64-bit float,
//! string, list, and string-keyed map. Temporal and spatial values are
//! first-class in the evaluator and serialize to tagged string/object forms
//! at rest (ISO-8601 strings for temporals, `{"x":…,"y":…}` or
//! `{"longitude":…,"latitude":…}` objects for points).

use crate::error::{GrafitoError, Result};
use crate::storage::types::{Node, Path, Relationship};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Calendar-aware duration: months, days and seconds are carried
/// separately so that `duration({months: 1})` added to a date lands on
/// the same day of the next month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationValue {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

impl DurationValue {
    pub fn new(months: i64, days: i64, seconds: i64, nanos: i32) -> Self {
        Self {
            months,
            days,
            seconds,
            nanos,
        }
    }

    /// Parse an ISO-8601 duration string such as `P1Y2M3DT4H5M6.7S`
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.first() != Some(&b'P') {
            return Err(GrafitoError::QueryExecution(format!(
                "Invalid duration literal: {text}"
            )));
        }
        let mut months: i64 = 0;
        let mut days: i64 = 0;
        let mut seconds: i64 = 0;
        let mut nanos: i32 = 0;
        let mut in_time = false;
        let mut num = String::new();
        let mut saw_component = false;
        for &b in &bytes[1..] {
            match b {
                b'T' => in_time = true,
                b'0'..=b'9' | b'.' | b'-' => num.push(b as char),
                unit => {
                    let value: f64 = num.parse().map_err(|_| {
                        GrafitoError::QueryExecution(format!("Invalid duration literal: {text}"))
                    })?;
                    num.clear();
                    saw_component = true;
                    match (unit, in_time) {
                        (b'Y', false) => months += value as i64 * 12,
                        (b'M', false) => months += value as i64,
                        (b'W', false) => days += value as i64 * 7,
                        (b'D', false) => days += value as i64,
                        (b'H', true) => seconds += value as i64 * 3600,
                        (b'M', true) => seconds += value as i64 * 60,
                        (b'S', true) => {
                            seconds += value.trunc() as i64;
                            nanos += (value.fract() * 1e9).round() as i32;
                        }
                        _ => {
                            return Err(GrafitoError::QueryExecution(format!(
                                "Invalid duration literal: {text}"
                            )))
                        }
                    }
                }
            }
        }
        if !saw_component || !num.is_empty() {
            return Err(GrafitoError::QueryExecution(format!(
                "Invalid duration literal: {text}"
            )));
        }
        Ok(Self {
            months,
            days,
            seconds,
            nanos,
        })
    }

    /// Total seconds ignoring the calendar components, used for ordering
    /// and numeric comparisons. Months are approximated at 30 days.
    pub fn comparable_seconds(&self) -> f64 {
        (self.months * 30 * 86_400 + self.days * 86_400 + self.seconds) as f64
            + self.nanos as f64 / 1e9
    }

    pub fn checked_add(&self, other: &DurationValue) -> DurationValue {
        DurationValue {
            months: self.months + other.months,
            days: self.days + other.days,
            seconds: self.seconds + other.seconds,
            nanos: self.nanos + other.nanos,
        }
    }

    pub fn negated(&self) -> DurationValue {
        DurationValue {
            months: -self.months,
            days: -self.days,
            seconds: -self.seconds,
            nanos: -self.nanos,
        }
    }
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let years = self.months / 12;
        let months = self.months % 12;
        write!(f, "P")?;
        if years != 0 {
            write!(f, "{years}Y")?;
        }
        if months != 0 {
            write!(f, "{months}M")?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.seconds != 0 || self.nanos != 0 || (years == 0 && months == 0 && self.days == 0) {
            let hours = self.seconds / 3600;
            let minutes = (self.seconds % 3600) / 60;
            let secs = self.seconds % 60;
            write!(f, "T")?;
            if hours != 0 {
                write!(f, "{hours}H")?;
            }
            if minutes != 0 {
                write!(f, "{minutes}M")?;
            }
            if self.nanos != 0 {
                write!(f, "{}S", secs as f64 + self.nanos as f64 / 1e9)?;
            } else {
                write!(f, "{secs}S")?;
            }
        }
        Ok(())
    }
}

/// Coordinate reference system for point values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    Cartesian,
    Wgs84,
}

/// Spatial point: Cartesian `(x, y)` or geographic `(longitude, latitude)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointValue {
    pub x: f64,
    pub y: f64,
    pub crs: Crs,
}

impl PointValue {
    pub fn cartesian(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            crs: Crs::Cartesian,
        }
    }

    pub fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self {
            x: longitude,
            y: latitude,
            crs: Crs::Wgs84,
        }
    }
}

/// Time of day with a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedTime {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

/// Property and expression values
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Date(NaiveDate),
    Time(ZonedTime),
    LocalTime(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    Duration(DurationValue),
    Point(PointValue),
    // Graph variants never appear at rest; they exist only in binding
    // frames and evaluator results.
    Node(Node),
    Relationship(Relationship),
    Path(Path),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: integers widen to floats
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Value::Relationship(rel) => Some(rel),
            _ => None,
        }
    }

    /// Name of the value's logical type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::List(_) => "LIST",
            Value::Map(_) => "MAP",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::LocalTime(_) => "LOCAL TIME",
            Value::DateTime(_) => "DATETIME",
            Value::LocalDateTime(_) => "LOCAL DATETIME",
            Value::Duration(_) => "DURATION",
            Value::Point(_) => "POINT",
            Value::Node(_) => "NODE",
            Value::Relationship(_) => "RELATIONSHIP",
            Value::Path(_) => "PATH",
        }
    }

    /// Encode for at-rest storage as JSON
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::String(s) => json!(s),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => json!(format!("{}{}", t.time.format("%H:%M:%S%.f"), t.offset)),
            Value::LocalTime(t) => json!(t.format("%H:%M:%S%.f").to_string()),
            Value::DateTime(dt) => json!(dt.to_rfc3339()),
            Value::LocalDateTime(dt) => json!(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Duration(d) => json!(d.to_string()),
            Value::Point(p) => match p.crs {
                Crs::Cartesian => json!({"x": p.x, "y": p.y}),
                Crs::Wgs84 => json!({"longitude": p.x, "latitude": p.y}),
            },
            // Graph values are projected to their property maps at rest.
            Value::Node(node) => Value::Map(node.properties.clone()).to_json(),
            Value::Relationship(rel) => Value::Map(rel.properties.clone()).to_json(),
            Value::Path(_) => serde_json::Value::Null,
        }
    }

    /// Decode a stored JSON value. Strings in strict ISO-8601 temporal
    /// forms and `{x,y}`/`{longitude,latitude}` objects decode back to
    /// their logical types; everything else maps structurally.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => {
                decode_temporal_string(s).unwrap_or_else(|| Value::String(s.clone()))
            }
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => {
                if let Some(point) = decode_point_object(entries) {
                    return point;
                }
                Value::Map(
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Render as a Cypher literal, used by the dump writer
    pub fn to_cypher_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => quote_string(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_cypher_literal).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_cypher_literal()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Point(p) => match p.crs {
                Crs::Cartesian => format!("point({{x: {}, y: {}}})", p.x, p.y),
                Crs::Wgs84 => format!("point({{longitude: {}, latitude: {}}})", p.x, p.y),
            },
            Value::Date(_) => format!("date({})", quote_json_string(self)),
            Value::Time(_) => format!("time({})", quote_json_string(self)),
            Value::LocalTime(_) => format!("localtime({})", quote_json_string(self)),
            Value::DateTime(_) => format!("datetime({})", quote_json_string(self)),
            Value::LocalDateTime(_) => format!("localdatetime({})", quote_json_string(self)),
            Value::Duration(_) => format!("duration({})", quote_json_string(self)),
            Value::Node(_) | Value::Relationship(_) | Value::Path(_) => "null".to_string(),
        }
    }

    /// Stable cross-type ordering for ORDER BY and min/max. NULL sorts
    /// after every other value; the executor applies nulls-last itself
    /// and never passes NULL here, but the rule holds regardless.
    pub fn order_cmp(&self, other: &Value) -> Ordering {
        let lr = self.order_rank();
        let rr = other.order_rank();
        if lr != rr {
            return lr.cmp(&rr);
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(_), _) | (Value::Float(_), _) => {
                let a = self.as_number().unwrap_or(f64::NAN);
                let b = other.as_number().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.order_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                let sa = serde_json::to_string(&Value::Map(a.clone()).to_json()).unwrap_or_default();
                let sb = serde_json::to_string(&Value::Map(b.clone()).to_json()).unwrap_or_default();
                sa.cmp(&sb)
            }
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::LocalTime(a), Value::LocalTime(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => {
                let ax = a.time - chrono::Duration::seconds(a.offset.local_minus_utc() as i64);
                let bx = b.time - chrono::Duration::seconds(b.offset.local_minus_utc() as i64);
                ax.cmp(&bx)
            }
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::LocalDateTime(a), Value::LocalDateTime(b)) => a.cmp(b),
            (Value::Duration(a), Value::Duration(b)) => a
                .comparable_seconds()
                .partial_cmp(&b.comparable_seconds())
                .unwrap_or(Ordering::Equal),
            (Value::Point(a), Value::Point(b)) => (a.x, a.y)
                .partial_cmp(&(b.x, b.y))
                .unwrap_or(Ordering::Equal),
            (Value::Node(a), Value::Node(b)) => a.id.cmp(&b.id),
            (Value::Relationship(a), Value::Relationship(b)) => a.id.cmp(&b.id),
            _ => Ordering::Equal,
        }
    }

    fn order_rank(&self) -> u8 {
        match self {
            Value::Map(_) => 0,
            Value::Node(_) => 1,
            Value::Relationship(_) => 2,
            Value::List(_) => 3,
            Value::Path(_) => 4,
            Value::String(_) => 5,
            Value::Bool(_) => 6,
            Value::Int(_) | Value::Float(_) => 7,
            Value::Duration(_) => 8,
            Value::Point(_) => 9,
            Value::Date(_) => 10,
            Value::LocalTime(_) => 11,
            Value::Time(_) => 12,
            Value::LocalDateTime(_) => 13,
            Value::DateTime(_) => 14,
            Value::Null => 15,
        }
    }
}

/// Value equality: integers and floats compare numerically, graph
/// entities compare by identity, everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::LocalTime(a), Value::LocalTime(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::LocalDateTime(a), Value::LocalDateTime(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Point(a), Value::Point(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a.id == b.id,
            (Value::Relationship(a), Value::Relationship(b)) => a.id == b.id,
            (Value::Path(a), Value::Path(b)) => {
                a.nodes.iter().map(|n| n.id).eq(b.nodes.iter().map(|n| n.id))
                    && a.relationships
                        .iter()
                        .map(|r| r.id)
                        .eq(b.relationships.iter().map(|r| r.id))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::String(s) => write!(f, "{s}"),
            Value::Node(node) => write!(f, "(#{})", node.id),
            Value::Relationship(rel) => write!(f, "[#{}:{}]", rel.id, rel.rel_type),
            Value::Path(path) => write!(f, "<path length {}>", path.relationships.len()),
            other => {
                let json = other.to_json();
                match json {
                    serde_json::Value::String(s) => write!(f, "{s}"),
                    json => write!(f, "{json}"),
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote_string(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn quote_json_string(v: &Value) -> String {
    match v.to_json() {
        serde_json::Value::String(s) => quote_string(&s),
        other => other.to_string(),
    }
}

/// Attempt to decode an ISO-8601 temporal string back to its logical type
fn decode_temporal_string(s: &str) -> Option<Value> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    if bytes[0] == b'P' && DurationValue::parse(s).is_ok() {
        return Some(Value::Duration(DurationValue::parse(s).ok()?));
    }
    let looks_like_date =
        bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-' && bytes[..4].iter().all(u8::is_ascii_digit);
    if looks_like_date {
        if bytes.len() == 10 {
            return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date);
        }
        if bytes.get(10) == Some(&b'T') {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(Value::DateTime(dt));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Value::LocalDateTime(dt));
            }
        }
        return None;
    }
    let looks_like_time = bytes.len() >= 8 && bytes[2] == b':' && bytes[5] == b':';
    if looks_like_time {
        if let Some(offset_at) = s.rfind(['+', '-', 'Z']).filter(|&i| i >= 8) {
            let (time_part, offset_part) = s.split_at(offset_at);
            if let (Ok(time), Some(offset)) = (
                NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f"),
                parse_offset(offset_part),
            ) {
                return Some(Value::Time(ZonedTime { time, offset }));
            }
        }
        return NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
            .ok()
            .map(Value::LocalTime);
    }
    None
}

pub(crate) fn parse_offset(s: &str) -> Option<FixedOffset> {
    if s == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = match s.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let rest = &s[1..];
    let (hours, minutes) = match rest.len() {
        5 if rest.as_bytes()[2] == b':' => (rest[..2].parse::<i32>().ok()?, rest[3..].parse::<i32>().ok()?),
        4 => (rest[..2].parse::<i32>().ok()?, rest[2..].parse::<i32>().ok()?),
        2 => (rest.parse::<i32>().ok()?, 0),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn decode_point_object(entries: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    let numeric = |key: &str| entries.get(key).and_then(serde_json::Value::as_f64);
    let extra_keys_ok = |allowed: &[&str]| entries.keys().all(|k| allowed.contains(&k.as_str()));
    if let (Some(x), Some(y)) = (numeric("x"), numeric("y")) {
        if extra_keys_ok(&["x", "y", "crs"]) {
            return Some(Value::Point(PointValue::cartesian(x, y)));
        }
    }
    if let (Some(lon), Some(lat)) = (numeric("longitude"), numeric("latitude")) {
        if extra_keys_ok(&["longitude", "latitude", "crs"]) {
            return Some(Value::Point(PointValue::wgs84(lon, lat)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_scalars() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(42),
            Value::Float(2.5),
            Value::String("hello".to_string()),
        ] {
            assert_eq!(Value::from_json(&value.to_json()), value);
        }
    }

    #[test]
    fn test_json_round_trip_collections() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), Value::List(vec![Value::Bool(false), Value::Null]));
        let value = Value::Map(map);
        assert_eq!(Value::from_json(&value.to_json()), value);
    }

    #[test]
    fn test_temporal_round_trip() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(Value::from_json(&date.to_json()), date);

        let ldt = Value::LocalDateTime(
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        );
        assert_eq!(Value::from_json(&ldt.to_json()), ldt);

        let dur = Value::Duration(DurationValue::new(14, 3, 3_600, 0));
        assert_eq!(Value::from_json(&dur.to_json()), dur);
    }

    #[test]
    fn test_point_round_trip() {
        let cart = Value::Point(PointValue::cartesian(1.0, 2.0));
        assert_eq!(Value::from_json(&cart.to_json()), cart);
        let geo = Value::Point(PointValue::wgs84(-122.4, 37.8));
        assert_eq!(Value::from_json(&geo.to_json()), geo);
    }

    #[test]
    fn test_numeric_cross_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Float(3.5));
    }

    #[test]
    fn test_order_cmp_numbers_before_null() {
        assert_eq!(Value::Int(1).order_cmp(&Value::Int(2)), Ordering::Less);
        assert_eq!(Value::Int(1).order_cmp(&Value::Null), Ordering::Less);
        assert_eq!(
            Value::String("b".into()).order_cmp(&Value::String("a".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn test_duration_parse_display() {
        let d = DurationValue::parse("P1Y2M3DT4H5M6S").unwrap();
        assert_eq!(d.months, 14);
        assert_eq!(d.days, 3);
        assert_eq!(d.seconds, 4 * 3600 + 5 * 60 + 6);
        let round = DurationValue::parse(&d.to_string()).unwrap();
        assert_eq!(round, d);
    }
}
