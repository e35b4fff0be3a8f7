// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Collection and path functions

use super::{single, ScalarFn};
use crate::error::{GrafitoError, Result};
use crate::storage::Value;
use std::collections::HashMap;

pub fn register(registry: &mut HashMap<&'static str, ScalarFn>) {
    registry.insert("size", size);
    registry.insert("head", head);
    registry.insert("tail", tail);
    registry.insert("last", last);
    registry.insert("range", range);
    registry.insert("keys", keys);
    registry.insert("values", values);
    registry.insert("nodes", nodes);
    registry.insert("relationships", relationships);
    registry.insert("length", length);
}

fn size(args: &[Value]) -> Result<Value> {
    let value = single(args, "size")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(entries) => Ok(Value::Int(entries.len() as i64)),
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(GrafitoError::QueryExecution(format!(
            "size() expects a list, map or string, got {}",
            other.type_name()
        ))),
    }
}

fn head(args: &[Value]) -> Result<Value> {
    let value = single(args, "head")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        other => Err(GrafitoError::QueryExecution(format!(
            "head() expects a list, got {}",
            other.type_name()
        ))),
    }
}

fn tail(args: &[Value]) -> Result<Value> {
    let value = single(args, "tail")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(Value::List(items.iter().skip(1).cloned().collect())),
        other => Err(GrafitoError::QueryExecution(format!(
            "tail() expects a list, got {}",
            other.type_name()
        ))),
    }
}

fn last(args: &[Value]) -> Result<Value> {
    let value = single(args, "last")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        other => Err(GrafitoError::QueryExecution(format!(
            "last() expects a list, got {}",
            other.type_name()
        ))),
    }
}

/// `range(start, end [, step])` — inclusive bounds, like the query
/// language's documented semantics
fn range(args: &[Value]) -> Result<Value> {
    if args.len() != 2 && args.len() != 3 {
        return Err(GrafitoError::QueryExecution(format!(
            "range() expects 2 or 3 arguments, got {}",
            args.len()
        )));
    }
    let bounds: Vec<i64> = args
        .iter()
        .map(|v| {
            v.as_int().ok_or_else(|| {
                GrafitoError::QueryExecution(format!(
                    "range() expects integers, got {}",
                    v.type_name()
                ))
            })
        })
        .collect::<Result<_>>()?;
    let (start, end) = (bounds[0], bounds[1]);
    let step = bounds.get(2).copied().unwrap_or(1);
    if step == 0 {
        return Err(GrafitoError::QueryExecution(
            "range() step must not be zero".to_string(),
        ));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current <= end) || (step < 0 && current >= end) {
        items.push(Value::Int(current));
        current += step;
    }
    Ok(Value::List(items))
}

fn keys(args: &[Value]) -> Result<Value> {
    let value = single(args, "keys")?;
    let names: Vec<Value> = match value {
        Value::Null => return Ok(Value::Null),
        Value::Map(entries) => entries.keys().cloned().map(Value::String).collect(),
        Value::Node(node) => node.properties.keys().cloned().map(Value::String).collect(),
        Value::Relationship(rel) => rel.properties.keys().cloned().map(Value::String).collect(),
        other => {
            return Err(GrafitoError::QueryExecution(format!(
                "keys() expects a map, node or relationship, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::List(names))
}

fn values(args: &[Value]) -> Result<Value> {
    let value = single(args, "values")?;
    let inner: Vec<Value> = match value {
        Value::Null => return Ok(Value::Null),
        Value::Map(entries) => entries.values().cloned().collect(),
        Value::Node(node) => node.properties.values().cloned().collect(),
        Value::Relationship(rel) => rel.properties.values().cloned().collect(),
        other => {
            return Err(GrafitoError::QueryExecution(format!(
                "values() expects a map, node or relationship, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::List(inner))
}

fn nodes(args: &[Value]) -> Result<Value> {
    let value = single(args, "nodes")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Path(path) => Ok(Value::List(
            path.nodes.iter().cloned().map(Value::Node).collect(),
        )),
        other => Err(GrafitoError::QueryExecution(format!(
            "nodes() expects a path, got {}",
            other.type_name()
        ))),
    }
}

fn relationships(args: &[Value]) -> Result<Value> {
    let value = single(args, "relationships")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Path(path) => Ok(Value::List(
            path.relationships
                .iter()
                .cloned()
                .map(Value::Relationship)
                .collect(),
        )),
        other => Err(GrafitoError::QueryExecution(format!(
            "relationships() expects a path, got {}",
            other.type_name()
        ))),
    }
}

/// `length(path)` — relationship count; `length(string/list)` also
/// answers for convenience, matching `size`
fn length(args: &[Value]) -> Result<Value> {
    let value = single(args, "length")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Path(path) => Ok(Value::Int(path.length() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(GrafitoError::QueryExecution(format!(
            "length() expects a path, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_head_tail_last() {
        let xs = list(&[1, 2, 3]);
        assert_eq!(head(&[xs.clone()]).unwrap(), Value::Int(1));
        assert_eq!(tail(&[xs.clone()]).unwrap(), list(&[2, 3]));
        assert_eq!(last(&[xs]).unwrap(), Value::Int(3));
        assert_eq!(head(&[list(&[])]).unwrap(), Value::Null);
    }

    #[test]
    fn test_range_inclusive_and_step() {
        assert_eq!(range(&[Value::Int(1), Value::Int(3)]).unwrap(), list(&[1, 2, 3]));
        assert_eq!(
            range(&[Value::Int(5), Value::Int(1), Value::Int(-2)]).unwrap(),
            list(&[5, 3, 1])
        );
        assert!(range(&[Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_size_of_string_counts_chars() {
        assert_eq!(size(&[Value::from("héllo")]).unwrap(), Value::Int(5));
    }
}
