// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The APOC-compatible scalar subset: `apoc.text.*`, `apoc.map.*`,
//! `apoc.coll.*`, `apoc.convert.toMap` and `apoc.util.compress`

use super::{arity, single, string_arg, ScalarFn};
use crate::error::{GrafitoError, Result};
use crate::storage::Value;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

pub fn register(registry: &mut HashMap<&'static str, ScalarFn>) {
    registry.insert("apoc.text.join", text_join);
    registry.insert("apoc.text.split", text_split);
    registry.insert("apoc.text.replace", text_replace);
    registry.insert("apoc.text.regexgroups", text_regex_groups);
    registry.insert("apoc.text.capitalize", text_capitalize);
    registry.insert("apoc.text.clean", text_clean);
    registry.insert("apoc.text.indexof", text_index_of);
    registry.insert("apoc.text.distance", text_distance);

    registry.insert("apoc.map.frompairs", map_from_pairs);
    registry.insert("apoc.map.topairs", map_to_pairs);
    registry.insert("apoc.map.merge", map_merge);
    registry.insert("apoc.map.setkey", map_set_key);
    registry.insert("apoc.map.removekey", map_remove_key);

    registry.insert("apoc.convert.tomap", convert_to_map);

    registry.insert("apoc.coll.sum", coll_sum);
    registry.insert("apoc.coll.min", coll_min);
    registry.insert("apoc.coll.max", coll_max);
    registry.insert("apoc.coll.sort", coll_sort);
    registry.insert("apoc.coll.toset", coll_to_set);
    registry.insert("apoc.coll.contains", coll_contains);
    registry.insert("apoc.coll.flatten", coll_flatten);
    registry.insert("apoc.coll.indexof", coll_index_of);

    registry.insert("apoc.util.compress", util_compress);
    registry.insert("apoc.util.decompress", util_decompress);
}

// ----------------------------------------------------------------------
// apoc.text
// ----------------------------------------------------------------------

fn text_join(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.text.join", 2)?;
    let (Value::List(items), Some(sep)) = (&args[0], string_arg(&args[1], "apoc.text.join")?)
    else {
        return Ok(Value::Null);
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => parts.push(s.clone()),
            Value::Null => {}
            other => parts.push(other.to_string()),
        }
    }
    Ok(Value::String(parts.join(sep)))
}

fn text_split(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.text.split", 2)?;
    let (Some(s), Some(pattern)) = (
        string_arg(&args[0], "apoc.text.split")?,
        string_arg(&args[1], "apoc.text.split")?,
    ) else {
        return Ok(Value::Null);
    };
    let re = regex::Regex::new(pattern)
        .map_err(|e| GrafitoError::QueryExecution(format!("invalid regular expression: {e}")))?;
    Ok(Value::List(
        re.split(s).map(|p| Value::String(p.to_string())).collect(),
    ))
}

fn text_replace(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.text.replace", 3)?;
    let (Some(s), Some(pattern), Some(replacement)) = (
        string_arg(&args[0], "apoc.text.replace")?,
        string_arg(&args[1], "apoc.text.replace")?,
        string_arg(&args[2], "apoc.text.replace")?,
    ) else {
        return Ok(Value::Null);
    };
    let re = regex::Regex::new(pattern)
        .map_err(|e| GrafitoError::QueryExecution(format!("invalid regular expression: {e}")))?;
    Ok(Value::String(re.replace_all(s, replacement).into_owned()))
}

/// Every match with its capture groups, as a list of string lists
fn text_regex_groups(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.text.regexGroups", 2)?;
    let (Some(s), Some(pattern)) = (
        string_arg(&args[0], "apoc.text.regexGroups")?,
        string_arg(&args[1], "apoc.text.regexGroups")?,
    ) else {
        return Ok(Value::Null);
    };
    let re = regex::Regex::new(pattern)
        .map_err(|e| GrafitoError::QueryExecution(format!("invalid regular expression: {e}")))?;
    let groups: Vec<Value> = re
        .captures_iter(s)
        .map(|caps| {
            Value::List(
                caps.iter()
                    .map(|m| match m {
                        Some(m) => Value::String(m.as_str().to_string()),
                        None => Value::Null,
                    })
                    .collect(),
            )
        })
        .collect();
    Ok(Value::List(groups))
}

fn text_capitalize(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.text.capitalize")?;
    let Some(s) = string_arg(value, "apoc.text.capitalize")? else {
        return Ok(Value::Null);
    };
    let mut chars = s.chars();
    Ok(Value::String(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }))
}

/// Lowercase, strip non-alphanumerics
fn text_clean(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.text.clean")?;
    let Some(s) = string_arg(value, "apoc.text.clean")? else {
        return Ok(Value::Null);
    };
    Ok(Value::String(
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect(),
    ))
}

fn text_index_of(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.text.indexOf", 2)?;
    let (Some(s), Some(needle)) = (
        string_arg(&args[0], "apoc.text.indexOf")?,
        string_arg(&args[1], "apoc.text.indexOf")?,
    ) else {
        return Ok(Value::Null);
    };
    Ok(Value::Int(match s.find(needle) {
        Some(byte_idx) => s[..byte_idx].chars().count() as i64,
        None => -1,
    }))
}

fn text_distance(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.text.distance", 2)?;
    let (Some(a), Some(b)) = (
        string_arg(&args[0], "apoc.text.distance")?,
        string_arg(&args[1], "apoc.text.distance")?,
    ) else {
        return Ok(Value::Null);
    };
    Ok(Value::Int(super::string::levenshtein(a, b) as i64))
}

// ----------------------------------------------------------------------
// apoc.map / apoc.convert
// ----------------------------------------------------------------------

fn map_from_pairs(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.map.fromPairs")?;
    let pairs = match value {
        Value::Null => return Ok(Value::Null),
        Value::List(pairs) => pairs,
        other => {
            return Err(GrafitoError::QueryExecution(format!(
                "apoc.map.fromPairs() expects a list of pairs, got {}",
                other.type_name()
            )))
        }
    };
    let mut map = BTreeMap::new();
    for pair in pairs {
        let Value::List(kv) = pair else {
            return Err(GrafitoError::QueryExecution(
                "apoc.map.fromPairs() expects [key, value] pairs".to_string(),
            ));
        };
        let (Some(Value::String(key)), Some(value)) = (kv.first(), kv.get(1)) else {
            return Err(GrafitoError::QueryExecution(
                "apoc.map.fromPairs() expects [key, value] pairs with string keys".to_string(),
            ));
        };
        map.insert(key.clone(), value.clone());
    }
    Ok(Value::Map(map))
}

fn map_to_pairs(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.map.toPairs")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Map(entries) => Ok(Value::List(
            entries
                .iter()
                .map(|(k, v)| Value::List(vec![Value::String(k.clone()), v.clone()]))
                .collect(),
        )),
        other => Err(GrafitoError::QueryExecution(format!(
            "apoc.map.toPairs() expects a map, got {}",
            other.type_name()
        ))),
    }
}

fn map_merge(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.map.merge", 2)?;
    match (&args[0], &args[1]) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Map(a), Value::Map(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Value::Map(merged))
        }
        (a, b) => Err(GrafitoError::QueryExecution(format!(
            "apoc.map.merge() expects two maps, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn map_set_key(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.map.setKey", 3)?;
    let (Value::Map(entries), Some(key)) = (&args[0], string_arg(&args[1], "apoc.map.setKey")?)
    else {
        return Ok(Value::Null);
    };
    let mut updated = entries.clone();
    updated.insert(key.to_string(), args[2].clone());
    Ok(Value::Map(updated))
}

fn map_remove_key(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.map.removeKey", 2)?;
    let (Value::Map(entries), Some(key)) = (&args[0], string_arg(&args[1], "apoc.map.removeKey")?)
    else {
        return Ok(Value::Null);
    };
    let mut updated = entries.clone();
    updated.remove(key);
    Ok(Value::Map(updated))
}

/// A node or relationship collapses to its property map
fn convert_to_map(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.convert.toMap")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Map(entries) => Ok(Value::Map(entries.clone())),
        Value::Node(node) => Ok(Value::Map(node.properties.clone())),
        Value::Relationship(rel) => Ok(Value::Map(rel.properties.clone())),
        other => Err(GrafitoError::QueryExecution(format!(
            "apoc.convert.toMap() cannot convert {}",
            other.type_name()
        ))),
    }
}

// ----------------------------------------------------------------------
// apoc.coll
// ----------------------------------------------------------------------

fn coll_list<'a>(value: &'a Value, name: &str) -> Result<Option<&'a [Value]>> {
    match value {
        Value::Null => Ok(None),
        Value::List(items) => Ok(Some(items)),
        other => Err(GrafitoError::QueryExecution(format!(
            "{name}() expects a list, got {}",
            other.type_name()
        ))),
    }
}

fn coll_sum(args: &[Value]) -> Result<Value> {
    let Some(items) = coll_list(single(args, "apoc.coll.sum")?, "apoc.coll.sum")? else {
        return Ok(Value::Null);
    };
    let mut sum = 0.0;
    for item in items {
        match item.as_number() {
            Some(n) => sum += n,
            None if item.is_null() => {}
            None => {
                return Err(GrafitoError::QueryExecution(
                    "apoc.coll.sum() over non-numeric value".to_string(),
                ))
            }
        }
    }
    Ok(Value::Float(sum))
}

fn coll_min(args: &[Value]) -> Result<Value> {
    let Some(items) = coll_list(single(args, "apoc.coll.min")?, "apoc.coll.min")? else {
        return Ok(Value::Null);
    };
    Ok(items
        .iter()
        .filter(|v| !v.is_null())
        .min_by(|a, b| a.order_cmp(b))
        .cloned()
        .unwrap_or(Value::Null))
}

fn coll_max(args: &[Value]) -> Result<Value> {
    let Some(items) = coll_list(single(args, "apoc.coll.max")?, "apoc.coll.max")? else {
        return Ok(Value::Null);
    };
    Ok(items
        .iter()
        .filter(|v| !v.is_null())
        .max_by(|a, b| a.order_cmp(b))
        .cloned()
        .unwrap_or(Value::Null))
}

fn coll_sort(args: &[Value]) -> Result<Value> {
    let Some(items) = coll_list(single(args, "apoc.coll.sort")?, "apoc.coll.sort")? else {
        return Ok(Value::Null);
    };
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.order_cmp(b));
    Ok(Value::List(sorted))
}

fn coll_to_set(args: &[Value]) -> Result<Value> {
    let Some(items) = coll_list(single(args, "apoc.coll.toSet")?, "apoc.coll.toSet")? else {
        return Ok(Value::Null);
    };
    let mut unique: Vec<Value> = Vec::new();
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    Ok(Value::List(unique))
}

fn coll_contains(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.coll.contains", 2)?;
    let Some(items) = coll_list(&args[0], "apoc.coll.contains")? else {
        return Ok(Value::Null);
    };
    Ok(Value::Bool(items.contains(&args[1])))
}

fn coll_flatten(args: &[Value]) -> Result<Value> {
    let Some(items) = coll_list(single(args, "apoc.coll.flatten")?, "apoc.coll.flatten")? else {
        return Ok(Value::Null);
    };
    let mut flat = Vec::new();
    for item in items {
        match item {
            Value::List(inner) => flat.extend(inner.iter().cloned()),
            other => flat.push(other.clone()),
        }
    }
    Ok(Value::List(flat))
}

fn coll_index_of(args: &[Value]) -> Result<Value> {
    let args = arity(args, "apoc.coll.indexOf", 2)?;
    let Some(items) = coll_list(&args[0], "apoc.coll.indexOf")? else {
        return Ok(Value::Null);
    };
    Ok(Value::Int(
        items
            .iter()
            .position(|v| *v == args[1])
            .map(|i| i as i64)
            .unwrap_or(-1),
    ))
}

// ----------------------------------------------------------------------
// apoc.util
// ----------------------------------------------------------------------

/// Gzip-compress a string; the result is hex-encoded so it can live in a
/// JSON-typed property.
fn util_compress(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.util.compress")?;
    let Some(s) = string_arg(value, "apoc.util.compress")? else {
        return Ok(Value::Null);
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(s.as_bytes())
        .and_then(|_| encoder.finish())
        .map(|bytes| Value::String(hex_encode(&bytes)))
        .map_err(|e| GrafitoError::QueryExecution(format!("compression failed: {e}")))
}

fn util_decompress(args: &[Value]) -> Result<Value> {
    let value = single(args, "apoc.util.decompress")?;
    let Some(s) = string_arg(value, "apoc.util.decompress")? else {
        return Ok(Value::Null);
    };
    let bytes = hex_decode(s)
        .ok_or_else(|| GrafitoError::QueryExecution("malformed compressed data".to_string()))?;
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| GrafitoError::QueryExecution(format!("decompression failed: {e}")))?;
    Ok(Value::String(out))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_pairs_round_trip() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), Value::Int(1));
        entries.insert("b".to_string(), Value::from("x"));
        let map = Value::Map(entries);
        let pairs = map_to_pairs(&[map.clone()]).unwrap();
        assert_eq!(map_from_pairs(&[pairs]).unwrap(), map);
    }

    #[test]
    fn test_regex_groups() {
        let out = text_regex_groups(&[Value::from("a1 b2"), Value::from(r"([a-z])(\d)")]).unwrap();
        let Value::List(matches) = out else {
            panic!("list expected");
        };
        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches[0],
            Value::List(vec![Value::from("a1"), Value::from("a"), Value::from("1")])
        );
    }

    #[test]
    fn test_compress_round_trip() {
        let text = Value::from("the quick brown fox jumps over the lazy dog");
        let packed = util_compress(&[text.clone()]).unwrap();
        assert_ne!(packed, text);
        assert_eq!(util_decompress(&[packed]).unwrap(), text);
    }

    #[test]
    fn test_coll_flatten_and_toset() {
        let nested = Value::List(vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::Int(2),
        ]);
        assert_eq!(
            coll_flatten(&[nested]).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(2)])
        );
        let dup = Value::List(vec![Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert_eq!(
            coll_to_set(&[dup]).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }
}
