// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Aggregation accumulators
//!
//! Aggregates over an empty group yield null, except `count` (0) and
//! `collect` (empty list). NULL inputs are ignored by every aggregate
//! except `count(*)`, which counts rows.

use crate::error::{GrafitoError, Result};
use crate::storage::Value;

/// A single aggregate accumulation in progress
#[derive(Debug)]
pub struct Accumulator {
    kind: AggKind,
    distinct: bool,
    seen: Vec<Value>,
    values: Vec<Value>,
    count: i64,
    /// Second argument of percentile aggregates
    percentile: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggKind {
    Count,
    CountStar,
    Sum,
    Avg,
    Min,
    Max,
    Collect,
    StdDevSample,
    StdDevPopulation,
    PercentileCont,
    PercentileDisc,
}

impl Accumulator {
    /// Build an accumulator for an aggregate function name; `None` for
    /// non-aggregate names.
    pub fn for_function(name: &str, distinct: bool) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "count" => AggKind::Count,
            "sum" => AggKind::Sum,
            "avg" => AggKind::Avg,
            "min" => AggKind::Min,
            "max" => AggKind::Max,
            "collect" => AggKind::Collect,
            "stdev" | "stddev" => AggKind::StdDevSample,
            "stdevp" | "stddevp" => AggKind::StdDevPopulation,
            "percentilecont" => AggKind::PercentileCont,
            "percentiledisc" => AggKind::PercentileDisc,
            _ => return None,
        };
        Some(Self::new(kind, distinct))
    }

    /// `count(*)` counts rows including nulls
    pub fn count_star() -> Self {
        Self::new(AggKind::CountStar, false)
    }

    fn new(kind: AggKind, distinct: bool) -> Self {
        Self {
            kind,
            distinct,
            seen: Vec::new(),
            values: Vec::new(),
            count: 0,
            percentile: None,
        }
    }

    /// Feed one row. `extra` carries trailing aggregate arguments
    /// (the percentile fraction).
    pub fn feed(&mut self, value: Value, extra: &[Value]) -> Result<()> {
        if self.kind == AggKind::CountStar {
            self.count += 1;
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }
        if self.distinct {
            if self.seen.contains(&value) {
                return Ok(());
            }
            self.seen.push(value.clone());
        }
        if matches!(self.kind, AggKind::PercentileCont | AggKind::PercentileDisc) {
            let p = extra
                .first()
                .and_then(Value::as_number)
                .ok_or_else(|| {
                    GrafitoError::QueryExecution(
                        "percentile aggregate requires a numeric fraction".to_string(),
                    )
                })?;
            if !(0.0..=1.0).contains(&p) {
                return Err(GrafitoError::QueryExecution(format!(
                    "percentile fraction {p} is outside [0, 1]"
                )));
            }
            self.percentile = Some(p);
        }
        self.count += 1;
        self.values.push(value);
        Ok(())
    }

    /// Close the accumulation and produce the aggregate value
    pub fn finish(self) -> Result<Value> {
        match self.kind {
            AggKind::Count | AggKind::CountStar => Ok(Value::Int(self.count)),
            AggKind::Collect => Ok(Value::List(self.values)),
            AggKind::Sum => {
                if self.values.is_empty() {
                    return Ok(Value::Null);
                }
                numeric_fold(&self.values, "sum").map(|(sum, _, all_int)| {
                    if all_int {
                        Value::Int(sum as i64)
                    } else {
                        Value::Float(sum)
                    }
                })
            }
            AggKind::Avg => {
                if self.values.is_empty() {
                    return Ok(Value::Null);
                }
                let (sum, n, _) = numeric_fold(&self.values, "avg")?;
                Ok(Value::Float(sum / n as f64))
            }
            AggKind::Min => Ok(self
                .values
                .into_iter()
                .min_by(|a, b| a.order_cmp(b))
                .unwrap_or(Value::Null)),
            AggKind::Max => Ok(self
                .values
                .into_iter()
                .max_by(|a, b| a.order_cmp(b))
                .unwrap_or(Value::Null)),
            AggKind::StdDevSample | AggKind::StdDevPopulation => {
                if self.values.is_empty() {
                    return Ok(Value::Null);
                }
                let (sum, n, _) = numeric_fold(&self.values, "stdDev")?;
                if n == 1 {
                    return Ok(Value::Float(0.0));
                }
                let mean = sum / n as f64;
                let ss: f64 = self
                    .values
                    .iter()
                    .filter_map(Value::as_number)
                    .map(|v| (v - mean).powi(2))
                    .sum();
                let denom = if self.kind == AggKind::StdDevSample {
                    (n - 1) as f64
                } else {
                    n as f64
                };
                Ok(Value::Float((ss / denom).sqrt()))
            }
            AggKind::PercentileCont | AggKind::PercentileDisc => {
                if self.values.is_empty() {
                    return Ok(Value::Null);
                }
                let p = self.percentile.unwrap_or(0.5);
                let mut nums: Vec<f64> =
                    self.values.iter().filter_map(Value::as_number).collect();
                if nums.is_empty() {
                    return Ok(Value::Null);
                }
                nums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                if self.kind == AggKind::PercentileDisc {
                    let rank =
                        ((p * nums.len() as f64).ceil() as usize).clamp(1, nums.len()) - 1;
                    // Discrete percentile returns a member of the input.
                    let all_int = self.values.iter().all(|v| matches!(v, Value::Int(_)));
                    return Ok(if all_int {
                        Value::Int(nums[rank] as i64)
                    } else {
                        Value::Float(nums[rank])
                    });
                }
                let position = p * (nums.len() - 1) as f64;
                let lower = position.floor() as usize;
                let upper = position.ceil() as usize;
                let fraction = position - lower as f64;
                Ok(Value::Float(
                    nums[lower] + (nums[upper] - nums[lower]) * fraction,
                ))
            }
        }
    }
}

/// Sum the values numerically, tracking whether every input was an
/// integer.
fn numeric_fold(values: &[Value], what: &str) -> Result<(f64, usize, bool)> {
    let mut sum = 0.0;
    let mut all_int = true;
    for value in values {
        match value {
            Value::Int(i) => sum += *i as f64,
            Value::Float(f) => {
                sum += f;
                all_int = false;
            }
            other => {
                return Err(GrafitoError::QueryExecution(format!(
                    "{what}() over non-numeric value of type {}",
                    other.type_name()
                )))
            }
        }
    }
    Ok((sum, values.len(), all_int))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(acc: &mut Accumulator, values: &[Value]) {
        for v in values {
            acc.feed(v.clone(), &[]).unwrap();
        }
    }

    #[test]
    fn test_count_skips_nulls_count_star_does_not() {
        let mut count = Accumulator::for_function("count", false).unwrap();
        feed_all(&mut count, &[Value::Int(1), Value::Null, Value::Int(2)]);
        assert_eq!(count.finish().unwrap(), Value::Int(2));

        let mut star = Accumulator::count_star();
        feed_all(&mut star, &[Value::Int(1), Value::Null, Value::Int(2)]);
        assert_eq!(star.finish().unwrap(), Value::Int(3));
    }

    #[test]
    fn test_empty_group_defaults() {
        assert_eq!(
            Accumulator::for_function("count", false).unwrap().finish().unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            Accumulator::for_function("collect", false).unwrap().finish().unwrap(),
            Value::List(vec![])
        );
        assert_eq!(
            Accumulator::for_function("sum", false).unwrap().finish().unwrap(),
            Value::Null
        );
        assert_eq!(
            Accumulator::for_function("max", false).unwrap().finish().unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_distinct_count() {
        let mut acc = Accumulator::for_function("count", true).unwrap();
        feed_all(&mut acc, &[Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert_eq!(acc.finish().unwrap(), Value::Int(2));
    }

    #[test]
    fn test_sum_integer_preservation() {
        let mut acc = Accumulator::for_function("sum", false).unwrap();
        feed_all(&mut acc, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(acc.finish().unwrap(), Value::Int(3));

        let mut acc = Accumulator::for_function("sum", false).unwrap();
        feed_all(&mut acc, &[Value::Int(1), Value::Float(0.5)]);
        assert_eq!(acc.finish().unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_stdev_population_vs_sample() {
        let values: Vec<Value> = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .iter()
            .map(|f| Value::Float(*f))
            .collect();
        let mut pop = Accumulator::for_function("stdevp", false).unwrap();
        feed_all(&mut pop, &values);
        let Value::Float(p) = pop.finish().unwrap() else {
            panic!("float expected");
        };
        assert!((p - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_cont_interpolates() {
        let mut acc = Accumulator::for_function("percentilecont", false).unwrap();
        for v in [10.0, 20.0, 30.0] {
            acc.feed(Value::Float(v), &[Value::Float(0.5)]).unwrap();
        }
        assert_eq!(acc.finish().unwrap(), Value::Float(20.0));
    }
}
