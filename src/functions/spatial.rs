// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Spatial functions: `point()` and `distance()`
//!
//! Cartesian points measure straight-line distance; geographic points
//! (`longitude`/`latitude`, WGS-84) measure the haversine great-circle
//! distance in meters.

use super::{arity, single, ScalarFn};
use crate::error::{GrafitoError, Result};
use crate::storage::{Crs, PointValue, Value};
use std::collections::HashMap;

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

pub fn register(registry: &mut HashMap<&'static str, ScalarFn>) {
    registry.insert("point", point_fn);
    registry.insert("distance", distance_fn);
    registry.insert("point.distance", distance_fn);
}

fn point_fn(args: &[Value]) -> Result<Value> {
    let value = single(args, "point")?;
    let entries = match value {
        Value::Null => return Ok(Value::Null),
        Value::Point(p) => return Ok(Value::Point(*p)),
        Value::Map(entries) => entries,
        other => {
            return Err(GrafitoError::QueryExecution(format!(
                "point() expects a map, got {}",
                other.type_name()
            )))
        }
    };
    let numeric = |key: &str| -> Result<Option<f64>> {
        match entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_number().map(Some).ok_or_else(|| {
                GrafitoError::QueryExecution(format!(
                    "point() coordinate '{key}' must be a number"
                ))
            }),
        }
    };
    if let (Some(x), Some(y)) = (numeric("x")?, numeric("y")?) {
        return Ok(Value::Point(PointValue::cartesian(x, y)));
    }
    if let (Some(lon), Some(lat)) = (numeric("longitude")?, numeric("latitude")?) {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GrafitoError::QueryExecution(format!(
                "latitude {lat} is outside [-90, 90]"
            )));
        }
        return Ok(Value::Point(PointValue::wgs84(lon, lat)));
    }
    Err(GrafitoError::QueryExecution(
        "point() requires {x, y} or {longitude, latitude}".to_string(),
    ))
}

fn distance_fn(args: &[Value]) -> Result<Value> {
    let args = arity(args, "distance", 2)?;
    let (a, b) = match (&args[0], &args[1]) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
        (Value::Point(a), Value::Point(b)) => (a, b),
        (a, b) => {
            return Err(GrafitoError::QueryExecution(format!(
                "distance() expects two points, got {} and {}",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    if a.crs != b.crs {
        return Err(GrafitoError::QueryExecution(
            "distance() requires points in the same coordinate system".to_string(),
        ));
    }
    let distance = match a.crs {
        Crs::Cartesian => ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt(),
        Crs::Wgs84 => haversine(a, b),
    };
    Ok(Value::Float(distance))
}

fn haversine(a: &PointValue, b: &PointValue) -> f64 {
    let (lon1, lat1) = (a.x.to_radians(), a.y.to_radians());
    let (lon2, lat2) = (b.x.to_radians(), b.y.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, f64)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Float(*v)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_cartesian_distance() {
        let a = point_fn(&[map(&[("x", 0.0), ("y", 0.0)])]).unwrap();
        let b = point_fn(&[map(&[("x", 3.0), ("y", 4.0)])]).unwrap();
        assert_eq!(distance_fn(&[a, b]).unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_geographic_distance_plausible() {
        // Paris to London is roughly 344 km.
        let paris = point_fn(&[map(&[("longitude", 2.3522), ("latitude", 48.8566)])]).unwrap();
        let london = point_fn(&[map(&[("longitude", -0.1276), ("latitude", 51.5072)])]).unwrap();
        let Value::Float(d) = distance_fn(&[paris, london]).unwrap() else {
            panic!("float expected");
        };
        assert!((d - 344_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn test_latitude_bounds() {
        assert!(point_fn(&[map(&[("longitude", 0.0), ("latitude", 91.0)])]).is_err());
    }

    #[test]
    fn test_mixed_crs_is_error() {
        let cart = point_fn(&[map(&[("x", 0.0), ("y", 0.0)])]).unwrap();
        let geo = point_fn(&[map(&[("longitude", 0.0), ("latitude", 0.0)])]).unwrap();
        assert!(distance_fn(&[cart, geo]).is_err());
    }
}
