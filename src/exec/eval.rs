// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Expression evaluator with three-valued logic
//!
//! NULL propagates through arithmetic, comparisons (except `IS NULL`)
//! and function calls. Boolean operators short-circuit against known
//! truth values before yielding NULL. String comparison is byte-wise.

use crate::ast::{is_aggregate_name, BinaryOp, Expr, UnaryOp};
use crate::error::{GrafitoError, Result};
use crate::exec::pattern::match_pattern;
use crate::exec::Frame;
use crate::functions;
use crate::graph::Graph;
use crate::storage::{DurationValue, Value};
use chrono::Duration as ChronoDuration;
use std::collections::BTreeMap;

/// Three-valued truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn is_true(&self) -> bool {
        matches!(self, Truth::True)
    }

    fn to_value(self) -> Value {
        match self {
            Truth::True => Value::Bool(true),
            Truth::False => Value::Bool(false),
            Truth::Unknown => Value::Null,
        }
    }
}

/// Truthiness of a value in predicate position
pub fn truth_of(value: &Value) -> Result<Truth> {
    match value {
        Value::Null => Ok(Truth::Unknown),
        Value::Bool(true) => Ok(Truth::True),
        Value::Bool(false) => Ok(Truth::False),
        other => Err(GrafitoError::QueryExecution(format!(
            "expected a boolean predicate, got {}",
            other.type_name()
        ))),
    }
}

/// Shared evaluation context: the graph (for pattern expressions) and
/// the statement parameters.
pub struct EvalContext<'g> {
    pub graph: &'g Graph,
    pub params: &'g BTreeMap<String, Value>,
}

impl<'g> EvalContext<'g> {
    pub fn new(graph: &'g Graph, params: &'g BTreeMap<String, Value>) -> Self {
        Self { graph, params }
    }

    /// Evaluate `expr` against `frame`
    pub fn eval(&self, frame: &Frame, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Integer(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Parameter(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| GrafitoError::QueryExecution(format!("missing parameter: ${name}"))),
            Expr::Variable(name) => frame
                .get(name)
                .cloned()
                .ok_or_else(|| GrafitoError::QueryExecution(format!("unknown variable: {name}"))),
            Expr::Property(base, property) => {
                let base = self.eval(frame, base)?;
                Ok(property_access(&base, property))
            }
            Expr::Index(base, index) => {
                let base = self.eval(frame, base)?;
                let index = self.eval(frame, index)?;
                indexed_access(&base, &index)
            }
            Expr::Slice(base, from, to) => {
                let base = self.eval(frame, base)?;
                let from = from
                    .as_ref()
                    .map(|e| self.eval(frame, e))
                    .transpose()?;
                let to = to.as_ref().map(|e| self.eval(frame, e)).transpose()?;
                slice_access(&base, from.as_ref(), to.as_ref())
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(frame, item)?);
                }
                Ok(Value::List(values))
            }
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(frame, value)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Unary(op, inner) => {
                let inner = self.eval(frame, inner)?;
                unary_op(*op, inner)
            }
            Expr::Binary(op, lhs, rhs) => self.binary_op(frame, *op, lhs, rhs),
            Expr::IsNull(inner, negated) => {
                let inner = self.eval(frame, inner)?;
                let is_null = inner.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::CountStar => Err(GrafitoError::QueryExecution(
                "count(*) is only valid in a projection".to_string(),
            )),
            Expr::FunctionCall { name, args, .. } => {
                if is_aggregate_name(name) {
                    return Err(GrafitoError::QueryExecution(format!(
                        "aggregate function {name}() is only valid in a projection"
                    )));
                }
                if name.eq_ignore_ascii_case("exists") {
                    if let Some(Expr::PatternPredicate(pattern)) = args.first() {
                        let found = !match_pattern(self, frame, pattern)?.is_empty();
                        return Ok(Value::Bool(found));
                    }
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, arg)?);
                }
                functions::invoke(name, &values)
            }
            Expr::Case {
                operand,
                branches,
                else_expr,
            } => {
                let operand = operand
                    .as_ref()
                    .map(|e| self.eval(frame, e))
                    .transpose()?;
                for (when, then) in branches {
                    let hit = match &operand {
                        Some(subject) => {
                            let candidate = self.eval(frame, when)?;
                            // Simple CASE never matches through NULL.
                            !subject.is_null() && !candidate.is_null() && *subject == candidate
                        }
                        None => truth_of(&self.eval(frame, when)?)?.is_true(),
                    };
                    if hit {
                        return self.eval(frame, then);
                    }
                }
                match else_expr {
                    Some(e) => self.eval(frame, e),
                    None => Ok(Value::Null),
                }
            }
            Expr::ListComprehension {
                variable,
                list,
                filter,
                map,
            } => {
                let source = self.eval(frame, list)?;
                let items = match source {
                    Value::Null => return Ok(Value::Null),
                    Value::List(items) => items,
                    other => {
                        return Err(GrafitoError::QueryExecution(format!(
                            "list comprehension over {}",
                            other.type_name()
                        )))
                    }
                };
                let mut output = Vec::new();
                for item in items {
                    let mut inner = frame.clone();
                    inner.set(variable.clone(), item.clone());
                    if let Some(filter) = filter {
                        if !truth_of(&self.eval(&inner, filter)?)?.is_true() {
                            continue;
                        }
                    }
                    match map {
                        Some(map) => output.push(self.eval(&inner, map)?),
                        None => output.push(item),
                    }
                }
                Ok(Value::List(output))
            }
            Expr::PatternComprehension {
                pattern,
                filter,
                map,
            } => {
                let mut output = Vec::new();
                for embedding in match_pattern(self, frame, pattern)? {
                    if let Some(filter) = filter {
                        if !truth_of(&self.eval(&embedding, filter)?)?.is_true() {
                            continue;
                        }
                    }
                    output.push(self.eval(&embedding, map)?);
                }
                Ok(Value::List(output))
            }
            Expr::PatternPredicate(pattern) | Expr::Exists(pattern) => {
                let found = !match_pattern(self, frame, pattern)?.is_empty();
                Ok(Value::Bool(found))
            }
        }
    }

    /// Evaluate a predicate, treating NULL as not-true
    pub fn eval_predicate(&self, frame: &Frame, expr: &Expr) -> Result<bool> {
        Ok(truth_of(&self.eval(frame, expr)?)?.is_true())
    }

    fn binary_op(&self, frame: &Frame, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        // Logical operators short-circuit against known truth values.
        match op {
            BinaryOp::And => {
                let left = truth_of(&self.eval(frame, lhs)?)?;
                if left == Truth::False {
                    return Ok(Value::Bool(false));
                }
                let right = truth_of(&self.eval(frame, rhs)?)?;
                return Ok(match (left, right) {
                    (_, Truth::False) => Value::Bool(false),
                    (Truth::True, Truth::True) => Value::Bool(true),
                    _ => Value::Null,
                });
            }
            BinaryOp::Or => {
                let left = truth_of(&self.eval(frame, lhs)?)?;
                if left == Truth::True {
                    return Ok(Value::Bool(true));
                }
                let right = truth_of(&self.eval(frame, rhs)?)?;
                return Ok(match (left, right) {
                    (_, Truth::True) => Value::Bool(true),
                    (Truth::False, Truth::False) => Value::Bool(false),
                    _ => Value::Null,
                });
            }
            BinaryOp::Xor => {
                let left = truth_of(&self.eval(frame, lhs)?)?;
                let right = truth_of(&self.eval(frame, rhs)?)?;
                return Ok(match (left, right) {
                    (Truth::Unknown, _) | (_, Truth::Unknown) => Value::Null,
                    (a, b) => Value::Bool(a.is_true() != b.is_true()),
                });
            }
            _ => {}
        }

        let left = self.eval(frame, lhs)?;
        let right = self.eval(frame, rhs)?;
        apply_binary(op, left, right)
    }
}

/// Apply a non-logical binary operator to two evaluated values
pub fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(equality(&left, &right, false)),
        BinaryOp::Neq => Ok(equality(&left, &right, true)),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            Ok(ordering_compare(op, &left, &right))
        }
        BinaryOp::In => Ok(membership(&left, &right)),
        BinaryOp::StartsWith => Ok(string_test(&left, &right, |s, p| s.starts_with(p))),
        BinaryOp::EndsWith => Ok(string_test(&left, &right, |s, p| s.ends_with(p))),
        BinaryOp::Contains => Ok(string_test(&left, &right, |s, p| s.contains(p))),
        BinaryOp::RegexMatch => regex_match(&left, &right),
        BinaryOp::Add => add_values(left, right),
        BinaryOp::Sub => sub_values(left, right),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            numeric_binary(op, &left, &right)
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            unreachable!("logical operators handled in binary_op")
        }
    }
}

/// `=` / `<>` with the documented list-scalar shorthand: comparing a
/// list against a scalar tests membership of the scalar in the list.
fn equality(left: &Value, right: &Value, negate: bool) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let outcome = match (left, right) {
        (Value::List(items), scalar) if !matches!(scalar, Value::List(_)) => {
            return negate_truth(list_membership(scalar, items), negate);
        }
        (scalar, Value::List(items)) if !matches!(scalar, Value::List(_)) => {
            return negate_truth(list_membership(scalar, items), negate);
        }
        (a, b) => a == b,
    };
    Value::Bool(outcome != negate)
}

fn negate_truth(truth: Truth, negate: bool) -> Value {
    match (truth, negate) {
        (Truth::Unknown, _) => Value::Null,
        (t, false) => Value::Bool(t.is_true()),
        (t, true) => Value::Bool(!t.is_true()),
    }
}

/// Membership with NULL semantics: a NULL element hides a definite miss
fn list_membership(needle: &Value, haystack: &[Value]) -> Truth {
    let mut saw_null = false;
    for item in haystack {
        if item.is_null() {
            saw_null = true;
        } else if item == needle {
            return Truth::True;
        }
    }
    if saw_null {
        Truth::Unknown
    } else {
        Truth::False
    }
}

fn membership(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (_, Value::Null) | (Value::Null, _) => Value::Null,
        (needle, Value::List(items)) => list_membership(needle, items).to_value(),
        _ => Value::Null,
    }
}

fn ordering_compare(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let ord = match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = left.as_number().expect("numeric");
            let b = right.as_number().expect("numeric");
            match a.partial_cmp(&b) {
                Some(ord) => ord,
                None => return Value::Null,
            }
        }
        (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::LocalTime(a), Value::LocalTime(b)) => a.cmp(b),
        (Value::LocalDateTime(a), Value::LocalDateTime(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (Value::Time(_), Value::Time(_)) | (Value::Duration(_), Value::Duration(_)) => {
            left.order_cmp(right)
        }
        (Value::List(a), Value::List(b)) => {
            // element-wise, shorter list first on ties
            let mut ord = std::cmp::Ordering::Equal;
            for (x, y) in a.iter().zip(b.iter()) {
                ord = x.order_cmp(y);
                if ord != std::cmp::Ordering::Equal {
                    break;
                }
            }
            if ord == std::cmp::Ordering::Equal {
                a.len().cmp(&b.len())
            } else {
                ord
            }
        }
        // Incomparable type pairings yield NULL.
        _ => return Value::Null,
    };
    let result = match op {
        BinaryOp::Lt => ord == std::cmp::Ordering::Less,
        BinaryOp::Lte => ord != std::cmp::Ordering::Greater,
        BinaryOp::Gt => ord == std::cmp::Ordering::Greater,
        BinaryOp::Gte => ord != std::cmp::Ordering::Less,
        _ => unreachable!(),
    };
    Value::Bool(result)
}

fn string_test(left: &Value, right: &Value, test: impl Fn(&str, &str) -> bool) -> Value {
    match (left, right) {
        (Value::String(s), Value::String(p)) => Value::Bool(test(s, p)),
        _ => Value::Null,
    }
}

fn regex_match(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::String(s), Value::String(pattern)) => {
            // `=~` performs a full-string match
            let re = regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                GrafitoError::QueryExecution(format!("invalid regular expression: {e}"))
            })?;
            Ok(Value::Bool(re.is_match(s)))
        }
        _ => Ok(Value::Null),
    }
}

fn add_values(left: Value, right: Value) -> Result<Value> {
    match (&left, &right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| GrafitoError::QueryExecution("integer overflow in +".to_string())),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(Value::Float(
            left.as_number().unwrap() + right.as_number().unwrap(),
        )),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), b) => Ok(Value::String(format!("{a}{b}"))),
        (a, Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut merged = a.clone();
            merged.extend(b.iter().cloned());
            Ok(Value::List(merged))
        }
        (Value::List(a), b) => {
            let mut merged = a.clone();
            merged.push(b.clone());
            Ok(Value::List(merged))
        }
        (a, Value::List(b)) => {
            let mut merged = vec![a.clone()];
            merged.extend(b.iter().cloned());
            Ok(Value::List(merged))
        }
        (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(a.checked_add(b))),
        (Value::Date(_), Value::Duration(_))
        | (Value::LocalDateTime(_), Value::Duration(_))
        | (Value::DateTime(_), Value::Duration(_))
        | (Value::LocalTime(_), Value::Duration(_))
        | (Value::Time(_), Value::Duration(_)) => {
            let Value::Duration(d) = right else { unreachable!() };
            temporal_shift(left, &d)
        }
        (Value::Duration(_), Value::Date(_))
        | (Value::Duration(_), Value::LocalDateTime(_))
        | (Value::Duration(_), Value::DateTime(_))
        | (Value::Duration(_), Value::LocalTime(_))
        | (Value::Duration(_), Value::Time(_)) => {
            let Value::Duration(d) = left else { unreachable!() };
            temporal_shift(right, &d)
        }
        (a, b) => Err(GrafitoError::QueryExecution(format!(
            "cannot add {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn sub_values(left: Value, right: Value) -> Result<Value> {
    match (&left, &right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => a
            .checked_sub(*b)
            .map(Value::Int)
            .ok_or_else(|| GrafitoError::QueryExecution("integer overflow in -".to_string())),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(Value::Float(
            left.as_number().unwrap() - right.as_number().unwrap(),
        )),
        (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(a.checked_add(&b.negated()))),
        (
            Value::Date(_)
            | Value::LocalDateTime(_)
            | Value::DateTime(_)
            | Value::LocalTime(_)
            | Value::Time(_),
            Value::Duration(_),
        ) => {
            let Value::Duration(d) = right else { unreachable!() };
            temporal_shift(left, &d.negated())
        }
        (a, b) => Err(GrafitoError::QueryExecution(format!(
            "cannot subtract {} from {}",
            b.type_name(),
            a.type_name()
        ))),
    }
}

/// Shift a temporal value by a duration, honoring calendar months
pub fn temporal_shift(value: Value, d: &DurationValue) -> Result<Value> {
    let shift_date = |date: chrono::NaiveDate| -> Result<chrono::NaiveDate> {
        let months = chrono::Months::new(d.months.unsigned_abs() as u32);
        let with_months = if d.months >= 0 {
            date.checked_add_months(months)
        } else {
            date.checked_sub_months(months)
        };
        with_months
            .and_then(|d2| d2.checked_add_signed(ChronoDuration::days(d.days)))
            .ok_or_else(|| GrafitoError::QueryExecution("date arithmetic overflow".to_string()))
    };
    let time_delta = ChronoDuration::seconds(d.seconds) + ChronoDuration::nanoseconds(d.nanos as i64);
    match value {
        Value::Date(date) => {
            // Sub-day components are dropped on pure dates.
            Ok(Value::Date(shift_date(date)?))
        }
        Value::LocalDateTime(dt) => {
            let shifted_date = shift_date(dt.date())?;
            let dt = shifted_date.and_time(dt.time()) + time_delta;
            Ok(Value::LocalDateTime(dt))
        }
        Value::DateTime(dt) => {
            let naive = dt.naive_local();
            let shifted = shift_date(naive.date())?.and_time(naive.time()) + time_delta;
            match shifted.and_local_timezone(*dt.offset()) {
                chrono::LocalResult::Single(out) => Ok(Value::DateTime(out)),
                _ => Err(GrafitoError::QueryExecution(
                    "datetime arithmetic overflow".to_string(),
                )),
            }
        }
        Value::LocalTime(t) => Ok(Value::LocalTime(t + time_delta)),
        Value::Time(t) => Ok(Value::Time(crate::storage::ZonedTime {
            time: t.time + time_delta,
            offset: t.offset,
        })),
        other => Err(GrafitoError::QueryExecution(format!(
            "cannot shift {} by a duration",
            other.type_name()
        ))),
    }
}

fn numeric_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(GrafitoError::QueryExecution(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };
    let both_int = matches!((left, right), (Value::Int(_), Value::Int(_)));
    match op {
        BinaryOp::Mul => {
            if both_int {
                let (Value::Int(x), Value::Int(y)) = (left, right) else {
                    unreachable!()
                };
                x.checked_mul(*y).map(Value::Int).ok_or_else(|| {
                    GrafitoError::QueryExecution("integer overflow in *".to_string())
                })
            } else {
                Ok(Value::Float(a * b))
            }
        }
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(GrafitoError::QueryExecution("division by zero".to_string()));
            }
            if both_int {
                let (Value::Int(x), Value::Int(y)) = (left, right) else {
                    unreachable!()
                };
                Ok(Value::Int(x / y))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(GrafitoError::QueryExecution("division by zero".to_string()));
            }
            if both_int {
                let (Value::Int(x), Value::Int(y)) = (left, right) else {
                    unreachable!()
                };
                Ok(Value::Int(x % y))
            } else {
                Ok(Value::Float(a % b))
            }
        }
        BinaryOp::Pow => Ok(Value::Float(a.powf(b))),
        _ => unreachable!(),
    }
}

fn unary_op(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, value) => Ok(match truth_of(&value)? {
            Truth::True => Value::Bool(false),
            Truth::False => Value::Bool(true),
            Truth::Unknown => Value::Null,
        }),
        (UnaryOp::Minus, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnaryOp::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Minus, Value::Duration(d)) => Ok(Value::Duration(d.negated())),
        (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_) | Value::Duration(_))) => Ok(v),
        (op, v) => Err(GrafitoError::QueryExecution(format!(
            "cannot apply unary {op:?} to {}",
            v.type_name()
        ))),
    }
}

/// Property access on nodes, relationships, maps, temporals, points and
/// (broadcast) lists of those.
pub fn property_access(base: &Value, property: &str) -> Value {
    match base {
        Value::Null => Value::Null,
        Value::Node(node) => node.property(property).cloned().unwrap_or(Value::Null),
        Value::Relationship(rel) => rel.property(property).cloned().unwrap_or(Value::Null),
        Value::Map(entries) => entries.get(property).cloned().unwrap_or(Value::Null),
        // Broadcast: `xs.name` == `[x IN xs | x.name]`
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| property_access(item, property))
                .collect(),
        ),
        Value::Point(p) => match property {
            "x" | "longitude" => Value::Float(p.x),
            "y" | "latitude" => Value::Float(p.y),
            "crs" => Value::String(
                match p.crs {
                    crate::storage::Crs::Cartesian => "cartesian",
                    crate::storage::Crs::Wgs84 => "wgs-84",
                }
                .to_string(),
            ),
            _ => Value::Null,
        },
        other => functions::temporal::component(other, property),
    }
}

fn indexed_access(base: &Value, index: &Value) -> Result<Value> {
    match (base, index) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let idx = if *i < 0 { len + i } else { *i };
            if idx < 0 || idx >= len {
                Ok(Value::Null)
            } else {
                Ok(items[idx as usize].clone())
            }
        }
        (Value::Map(entries), Value::String(key)) => {
            Ok(entries.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Node(node), Value::String(key)) => {
            Ok(node.property(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Relationship(rel), Value::String(key)) => {
            Ok(rel.property(key).cloned().unwrap_or(Value::Null))
        }
        (a, b) => Err(GrafitoError::QueryExecution(format!(
            "cannot index {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Half-open slice `[i..j]`; negative indices count from the end and
/// omitted bounds extend to the edge.
fn slice_access(base: &Value, from: Option<&Value>, to: Option<&Value>) -> Result<Value> {
    let items = match base {
        Value::Null => return Ok(Value::Null),
        Value::List(items) => items,
        other => {
            return Err(GrafitoError::QueryExecution(format!(
                "cannot slice {}",
                other.type_name()
            )))
        }
    };
    let len = items.len() as i64;
    let resolve = |bound: Option<&Value>, default: i64| -> Result<Option<i64>> {
        match bound {
            None => Ok(Some(default)),
            Some(Value::Null) => Ok(None),
            Some(Value::Int(i)) => {
                let idx = if *i < 0 { len + i } else { *i };
                Ok(Some(idx.clamp(0, len)))
            }
            Some(other) => Err(GrafitoError::QueryExecution(format!(
                "slice bound must be an integer, got {}",
                other.type_name()
            ))),
        }
    };
    let (Some(start), Some(end)) = (resolve(from, 0)?, resolve(to, len)?) else {
        return Ok(Value::Null);
    };
    if start >= end {
        return Ok(Value::List(Vec::new()));
    }
    Ok(Value::List(items[start as usize..end as usize].to_vec()))
}
