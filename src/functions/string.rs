// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! String functions
//!
//! Includes the text-normalization helpers (`deaccent`, `strip_html`,
//! `strip_emoji`, `snake_case`) and the similarity measures
//! (`levenshtein`, `jaccard` over character bigrams).

use super::{arity, int_arg, single, string_arg, ScalarFn};
use crate::error::{GrafitoError, Result};
use crate::storage::Value;
use std::collections::HashMap;

pub fn register(registry: &mut HashMap<&'static str, ScalarFn>) {
    registry.insert("toupper", |args| {
        map_string(args, "toUpper", |s| s.to_uppercase())
    });
    registry.insert("upper", |args| {
        map_string(args, "upper", |s| s.to_uppercase())
    });
    registry.insert("tolower", |args| {
        map_string(args, "toLower", |s| s.to_lowercase())
    });
    registry.insert("lower", |args| {
        map_string(args, "lower", |s| s.to_lowercase())
    });
    registry.insert("trim", |args| map_string(args, "trim", |s| s.trim().to_string()));
    registry.insert("ltrim", |args| {
        map_string(args, "ltrim", |s| s.trim_start().to_string())
    });
    registry.insert("rtrim", |args| {
        map_string(args, "rtrim", |s| s.trim_end().to_string())
    });
    registry.insert("reverse", reverse);
    registry.insert("substring", substring);
    registry.insert("left", left);
    registry.insert("right", right);
    registry.insert("split", split);
    registry.insert("replace", replace);
    registry.insert("matches", matches_fn);
    registry.insert("regex", matches_fn);
    registry.insert("deaccent", |args| map_string(args, "deaccent", deaccent));
    registry.insert("strip_html", |args| {
        map_string(args, "strip_html", strip_html)
    });
    registry.insert("strip_emoji", |args| {
        map_string(args, "strip_emoji", strip_emoji)
    });
    registry.insert("snake_case", |args| {
        map_string(args, "snake_case", snake_case)
    });
    registry.insert("levenshtein", levenshtein_fn);
    registry.insert("jaccard", jaccard_fn);
}

fn map_string(args: &[Value], name: &str, op: impl Fn(&str) -> String) -> Result<Value> {
    let value = single(args, name)?;
    Ok(match string_arg(value, name)? {
        Some(s) => Value::String(op(s)),
        None => Value::Null,
    })
}

/// `reverse` doubles as list reversal, matching the collection library
fn reverse(args: &[Value]) -> Result<Value> {
    let value = single(args, "reverse")?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::List(items) => Ok(Value::List(items.iter().rev().cloned().collect())),
        other => Err(GrafitoError::QueryExecution(format!(
            "reverse() expects a string or list, got {}",
            other.type_name()
        ))),
    }
}

/// `substring(s, start [, length])`; negative length is an error
fn substring(args: &[Value]) -> Result<Value> {
    if args.len() != 2 && args.len() != 3 {
        return Err(GrafitoError::QueryExecution(format!(
            "substring() expects 2 or 3 arguments, got {}",
            args.len()
        )));
    }
    let Some(s) = string_arg(&args[0], "substring")? else {
        return Ok(Value::Null);
    };
    let Some(start) = int_arg(&args[1], "substring")? else {
        return Ok(Value::Null);
    };
    if start < 0 {
        return Err(GrafitoError::QueryExecution(
            "substring() start must be non-negative".to_string(),
        ));
    }
    let length = match args.get(2) {
        Some(v) => match int_arg(v, "substring")? {
            Some(l) if l < 0 => {
                return Err(GrafitoError::QueryExecution(
                    "substring() length must be non-negative".to_string(),
                ))
            }
            Some(l) => Some(l as usize),
            None => return Ok(Value::Null),
        },
        None => None,
    };
    let chars: Vec<char> = s.chars().collect();
    let start = (start as usize).min(chars.len());
    let end = match length {
        Some(l) => (start + l).min(chars.len()),
        None => chars.len(),
    };
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn left(args: &[Value]) -> Result<Value> {
    let args = arity(args, "left", 2)?;
    let (Some(s), Some(n)) = (string_arg(&args[0], "left")?, int_arg(&args[1], "left")?) else {
        return Ok(Value::Null);
    };
    Ok(Value::String(s.chars().take(n.max(0) as usize).collect()))
}

fn right(args: &[Value]) -> Result<Value> {
    let args = arity(args, "right", 2)?;
    let (Some(s), Some(n)) = (string_arg(&args[0], "right")?, int_arg(&args[1], "right")?) else {
        return Ok(Value::Null);
    };
    let chars: Vec<char> = s.chars().collect();
    let keep = (n.max(0) as usize).min(chars.len());
    Ok(Value::String(chars[chars.len() - keep..].iter().collect()))
}

fn split(args: &[Value]) -> Result<Value> {
    let args = arity(args, "split", 2)?;
    let (Some(s), Some(sep)) = (string_arg(&args[0], "split")?, string_arg(&args[1], "split")?)
    else {
        return Ok(Value::Null);
    };
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(sep).map(|p| Value::String(p.to_string())).collect()
    };
    Ok(Value::List(parts))
}

fn replace(args: &[Value]) -> Result<Value> {
    let args = arity(args, "replace", 3)?;
    let (Some(s), Some(from), Some(to)) = (
        string_arg(&args[0], "replace")?,
        string_arg(&args[1], "replace")?,
        string_arg(&args[2], "replace")?,
    ) else {
        return Ok(Value::Null);
    };
    Ok(Value::String(s.replace(from, to)))
}

/// `matches(s, pattern)` — unanchored regular-expression search
fn matches_fn(args: &[Value]) -> Result<Value> {
    let args = arity(args, "matches", 2)?;
    let (Some(s), Some(pattern)) = (
        string_arg(&args[0], "matches")?,
        string_arg(&args[1], "matches")?,
    ) else {
        return Ok(Value::Null);
    };
    let re = regex::Regex::new(pattern)
        .map_err(|e| GrafitoError::QueryExecution(format!("invalid regular expression: {e}")))?;
    Ok(Value::Bool(re.is_match(s)))
}

/// Fold Latin accented characters to their base letters
fn deaccent(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' | 'Ā' => 'A',
            'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ė' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' | 'Ē' | 'Ė' => 'E',
            'í' | 'ì' | 'î' | 'ï' | 'ī' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' | 'Ī' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ō' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ō' => 'O',
            'ú' | 'ù' | 'û' | 'ü' | 'ū' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ū' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            'ý' | 'ÿ' => 'y',
            'Ý' => 'Y',
            other => other,
        })
        .collect()
}

/// Remove `<…>` tag runs; unterminated tags are dropped to end of input
fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn strip_emoji(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let cp = c as u32;
            !matches!(cp,
                0x1F300..=0x1FAFF  // symbols, pictographs, emoticons
                | 0x2600..=0x27BF   // misc symbols and dingbats
                | 0xFE00..=0xFE0F   // variation selectors
                | 0x1F1E6..=0x1F1FF // regional indicators
                | 0x200D            // zero-width joiner
            )
        })
        .collect()
}

fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_lower = false;
    let mut pending_sep = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower {
                pending_sep = true;
            }
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_numeric();
        } else {
            pending_sep = true;
            prev_lower = false;
        }
    }
    out
}

fn levenshtein_fn(args: &[Value]) -> Result<Value> {
    let args = arity(args, "levenshtein", 2)?;
    let (Some(a), Some(b)) = (
        string_arg(&args[0], "levenshtein")?,
        string_arg(&args[1], "levenshtein")?,
    ) else {
        return Ok(Value::Null);
    };
    Ok(Value::Int(levenshtein(a, b) as i64))
}

pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Jaccard similarity over character bigrams
fn jaccard_fn(args: &[Value]) -> Result<Value> {
    let args = arity(args, "jaccard", 2)?;
    let (Some(a), Some(b)) = (
        string_arg(&args[0], "jaccard")?,
        string_arg(&args[1], "jaccard")?,
    ) else {
        return Ok(Value::Null);
    };
    let set_a = bigrams(a);
    let set_b = bigrams(b);
    if set_a.is_empty() && set_b.is_empty() {
        return Ok(Value::Float(1.0));
    }
    let intersection = set_a.iter().filter(|g| set_b.contains(*g)).count();
    let union = set_a.len() + set_b.len() - intersection;
    Ok(Value::Float(intersection as f64 / union as f64))
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    let mut grams = Vec::new();
    for window in chars.windows(2) {
        let gram = (window[0], window[1]);
        if !grams.contains(&gram) {
            grams.push(gram);
        }
    }
    grams
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_bounds() {
        let out = substring(&[Value::from("hello"), Value::Int(1), Value::Int(3)]).unwrap();
        assert_eq!(out, Value::from("ell"));
        assert!(substring(&[Value::from("x"), Value::Int(0), Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_levenshtein_known_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_jaccard_identical_and_disjoint() {
        assert_eq!(
            jaccard_fn(&[Value::from("night"), Value::from("night")]).unwrap(),
            Value::Float(1.0)
        );
        assert_eq!(
            jaccard_fn(&[Value::from("abc"), Value::from("xyz")]).unwrap(),
            Value::Float(0.0)
        );
    }

    #[test]
    fn test_snake_case_boundaries() {
        assert_eq!(snake_case("HelloWorld"), "hello_world");
        assert_eq!(snake_case("some-mixed Case"), "some_mixed_case");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<b>bold</b> text"), "bold text");
    }

    #[test]
    fn test_deaccent() {
        assert_eq!(deaccent("café noël"), "cafe noel");
    }

    #[test]
    fn test_null_propagation() {
        assert_eq!(
            substring(&[Value::Null, Value::Int(0)]).unwrap(),
            Value::Null
        );
        assert_eq!(
            matches_fn(&[Value::Null, Value::from("x")]).unwrap(),
            Value::Null
        );
    }
}
