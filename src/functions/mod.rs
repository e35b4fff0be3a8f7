// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar function library
//!
//! Functions are looked up by lowercased name in a process-wide registry
//! built once. Aggregates never reach this registry; the executor
//! resolves them in projections. The null discipline is null-in /
//! null-out unless a function documents otherwise (`coalesce`, `size`
//! of null, …).

pub mod apoc;
pub mod list;
pub mod spatial;
pub mod string;
pub mod temporal;

use crate::error::{GrafitoError, Result};
use crate::storage::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A scalar function implementation
pub type ScalarFn = fn(&[Value]) -> Result<Value>;

static REGISTRY: Lazy<HashMap<&'static str, ScalarFn>> = Lazy::new(build_registry);

/// Invoke a scalar function by (case-insensitive) name
pub fn invoke(name: &str, args: &[Value]) -> Result<Value> {
    let lower = name.to_ascii_lowercase();
    match REGISTRY.get(lower.as_str()) {
        Some(function) => function(args),
        None => Err(GrafitoError::QueryExecution(format!(
            "unknown function: {name}()"
        ))),
    }
}

/// Whether a name resolves to a registered scalar function
pub fn is_known(name: &str) -> bool {
    REGISTRY.contains_key(name.to_ascii_lowercase().as_str())
}

fn build_registry() -> HashMap<&'static str, ScalarFn> {
    let mut registry: HashMap<&'static str, ScalarFn> = HashMap::new();
    string::register(&mut registry);
    list::register(&mut registry);
    temporal::register(&mut registry);
    spatial::register(&mut registry);
    apoc::register(&mut registry);

    // Entity and scalar built-ins small enough to live here.
    registry.insert("id", |args| {
        entity_fn(args, "id", |v| match v {
            Value::Node(n) => Some(Value::Int(n.id)),
            Value::Relationship(r) => Some(Value::Int(r.id)),
            _ => None,
        })
    });
    registry.insert("labels", |args| {
        entity_fn(args, "labels", |v| match v {
            Value::Node(n) => Some(Value::List(
                n.labels.iter().cloned().map(Value::String).collect(),
            )),
            _ => None,
        })
    });
    registry.insert("type", |args| {
        entity_fn(args, "type", |v| match v {
            Value::Relationship(r) => Some(Value::String(r.rel_type.clone())),
            _ => None,
        })
    });
    registry.insert("properties", |args| {
        entity_fn(args, "properties", |v| match v {
            Value::Node(n) => Some(Value::Map(n.properties.clone())),
            Value::Relationship(r) => Some(Value::Map(r.properties.clone())),
            Value::Map(m) => Some(Value::Map(m.clone())),
            _ => None,
        })
    });
    registry.insert("coalesce", |args| {
        for arg in args {
            if !arg.is_null() {
                return Ok(arg.clone());
            }
        }
        Ok(Value::Null)
    });

    registry.insert("tostring", |args| {
        let value = single(args, "toString")?;
        Ok(match value {
            Value::Null => Value::Null,
            other => Value::String(other.to_string()),
        })
    });
    registry.insert("tointeger", |args| {
        let value = single(args, "toInteger")?;
        Ok(match value {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Int(*f as i64),
            Value::Bool(b) => Value::Int(*b as i64),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| s.trim().parse::<f64>().map(|f| Value::Int(f as i64)))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        })
    });
    registry.insert("tofloat", |args| {
        let value = single(args, "toFloat")?;
        Ok(match value {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Float(*i as f64),
            Value::Float(f) => Value::Float(*f),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        })
    });
    registry.insert("toboolean", |args| {
        let value = single(args, "toBoolean")?;
        Ok(match value {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Null,
            },
            _ => Value::Null,
        })
    });

    registry.insert("abs", |args| numeric_fn(args, "abs", f64::abs, i64::abs));
    registry.insert("sign", |args| {
        let value = single(args, "sign")?;
        Ok(match value {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Int(i.signum()),
            Value::Float(f) => Value::Int(if *f > 0.0 {
                1
            } else if *f < 0.0 {
                -1
            } else {
                0
            }),
            other => {
                return Err(GrafitoError::QueryExecution(format!(
                    "sign() expects a number, got {}",
                    other.type_name()
                )))
            }
        })
    });
    registry.insert("round", |args| float_fn(args, "round", f64::round));
    registry.insert("floor", |args| float_fn(args, "floor", f64::floor));
    registry.insert("ceil", |args| float_fn(args, "ceil", f64::ceil));
    registry.insert("sqrt", |args| float_fn(args, "sqrt", f64::sqrt));
    registry.insert("exp", |args| float_fn(args, "exp", f64::exp));
    registry.insert("log", |args| float_fn(args, "log", f64::ln));
    registry.insert("log10", |args| float_fn(args, "log10", f64::log10));
    registry.insert("e", |_args| Ok(Value::Float(std::f64::consts::E)));
    registry.insert("pi", |_args| Ok(Value::Float(std::f64::consts::PI)));

    registry
}

// ----------------------------------------------------------------------
// Argument helpers shared by the category modules
// ----------------------------------------------------------------------

pub(crate) fn single<'a>(args: &'a [Value], name: &str) -> Result<&'a Value> {
    if args.len() != 1 {
        return Err(GrafitoError::QueryExecution(format!(
            "{name}() expects 1 argument, got {}",
            args.len()
        )));
    }
    Ok(&args[0])
}

pub(crate) fn arity<'a>(args: &'a [Value], name: &str, n: usize) -> Result<&'a [Value]> {
    if args.len() != n {
        return Err(GrafitoError::QueryExecution(format!(
            "{name}() expects {n} arguments, got {}",
            args.len()
        )));
    }
    Ok(args)
}

pub(crate) fn string_arg<'a>(value: &'a Value, name: &str) -> Result<Option<&'a str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(GrafitoError::QueryExecution(format!(
            "{name}() expects a string, got {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn int_arg(value: &Value, name: &str) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Int(i) => Ok(Some(*i)),
        other => Err(GrafitoError::QueryExecution(format!(
            "{name}() expects an integer, got {}",
            other.type_name()
        ))),
    }
}

fn entity_fn(
    args: &[Value],
    name: &str,
    extract: impl Fn(&Value) -> Option<Value>,
) -> Result<Value> {
    let value = single(args, name)?;
    if value.is_null() {
        return Ok(Value::Null);
    }
    extract(value).ok_or_else(|| {
        GrafitoError::QueryExecution(format!(
            "{name}() cannot be applied to {}",
            value.type_name()
        ))
    })
}

fn numeric_fn(
    args: &[Value],
    name: &str,
    on_float: impl Fn(f64) -> f64,
    on_int: impl Fn(i64) -> i64,
) -> Result<Value> {
    let value = single(args, name)?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Int(on_int(*i))),
        Value::Float(f) => Ok(Value::Float(on_float(*f))),
        other => Err(GrafitoError::QueryExecution(format!(
            "{name}() expects a number, got {}",
            other.type_name()
        ))),
    }
}

fn float_fn(args: &[Value], name: &str, op: impl Fn(f64) -> f64) -> Result<Value> {
    let value = single(args, name)?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Float(op(*i as f64))),
        Value::Float(f) => Ok(Value::Float(op(*f))),
        other => Err(GrafitoError::QueryExecution(format!(
            "{name}() expects a number, got {}",
            other.type_name()
        ))),
    }
}
