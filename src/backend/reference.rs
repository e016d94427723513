//! Reference implementations
//!
//! The always-available baseline for every backend-eligible operation.
//! Accelerators must match these results exactly for int/bitwise ops and
//! within 1e-6 for float aggregates.
//!
//! Integer inputs keep integer results where the operation allows it
//! (`sum` of ints is an int); `mean`, `median` and `stdev` always produce
//! floats.

use crate::error::PipeError;
use crate::value::Value;

use super::op::Op;

/// Execute a fold (aggregate) op over materialized elements.
pub fn fold(op: Op, data: &[Value]) -> Result<Value, PipeError> {
    match op {
        Op::Sum => sum(data),
        Op::Mean => mean(data),
        Op::Min => extremum(data, "min", |o| o == std::cmp::Ordering::Less),
        Op::Max => extremum(data, "max", |o| o == std::cmp::Ordering::Greater),
        Op::Median => median(data),
        Op::Stdev => stdev(data),
        other => Err(PipeError::InvalidFlow(format!(
            "`{}` is not an aggregate operation",
            other.name()
        ))),
    }
}

/// Execute an elementwise (bitwise family) op over materialized elements.
pub fn map(op: Op, data: &[Value], operand: Option<&Value>) -> Result<Vec<Value>, PipeError> {
    let ints = as_i64_slice(data)?;
    let out = match op {
        Op::BitwiseAnd => zip_operand(op, &ints, operand, |x, c| x & c)?,
        Op::BitwiseOr => zip_operand(op, &ints, operand, |x, c| x | c)?,
        Op::BitwiseXor => zip_operand(op, &ints, operand, |x, c| x ^ c)?,
        Op::BitwiseNot => ints.iter().map(|&x| !x).collect(),
        Op::LeftShift => {
            let n = shift_amount(op, operand)?;
            ints.iter().map(|&x| x << n).collect()
        }
        Op::RightShift => {
            let n = shift_amount(op, operand)?;
            ints.iter().map(|&x| x >> n).collect()
        }
        other => {
            return Err(PipeError::InvalidFlow(format!(
                "`{}` is not an elementwise operation",
                other.name()
            )))
        }
    };
    Ok(out.into_iter().map(Value::Int).collect())
}

fn zip_operand(
    op: Op,
    ints: &[i64],
    operand: Option<&Value>,
    f: impl Fn(i64, i64) -> i64,
) -> Result<Vec<i64>, PipeError> {
    let c = operand
        .ok_or_else(|| PipeError::InvalidFlow(format!("`{}` requires an operand", op.name())))?
        .as_i64()?;
    Ok(ints.iter().map(|&x| f(x, c)).collect())
}

/// Sum keeps ints exact; any float promotes the whole fold. Integer sums
/// accumulate in i128 so valid i64 inputs never wrap; a total outside the
/// i64 range is an error.
fn sum(data: &[Value]) -> Result<Value, PipeError> {
    if data.iter().all(|v| matches!(v, Value::Int(_))) {
        let mut acc: i128 = 0;
        for v in data {
            acc += i128::from(v.as_i64()?);
        }
        return int_total(acc);
    }
    let mut acc = 0.0;
    for v in data {
        acc += v.as_f64()?;
    }
    Ok(Value::Float(acc))
}

fn mean(data: &[Value]) -> Result<Value, PipeError> {
    if data.is_empty() {
        return Err(PipeError::InvalidFlow(
            "mean of an empty sequence".to_string(),
        ));
    }
    let mut acc = 0.0;
    for v in data {
        acc += v.as_f64()?;
    }
    Ok(Value::Float(acc / data.len() as f64))
}

fn extremum(
    data: &[Value],
    name: &str,
    better: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, PipeError> {
    let mut iter = data.iter();
    let first = iter.next().ok_or_else(|| {
        PipeError::InvalidFlow(format!("{name} of an empty sequence"))
    })?;
    let mut best = first;
    let mut best_f = first.as_f64()?;
    for v in iter {
        let f = v.as_f64()?;
        if let Some(ord) = f.partial_cmp(&best_f) {
            if better(ord) {
                best = v;
                best_f = f;
            }
        }
    }
    Ok(best.clone())
}

fn median(data: &[Value]) -> Result<Value, PipeError> {
    if data.is_empty() {
        return Err(PipeError::InvalidFlow(
            "median of an empty sequence".to_string(),
        ));
    }
    let mut floats = as_f64_vec(data)?;
    floats.sort_by(|a, b| a.total_cmp(b));
    let mid = floats.len() / 2;
    if floats.len() % 2 == 0 {
        Ok(Value::Float((floats[mid - 1] + floats[mid]) / 2.0))
    } else {
        Ok(Value::Float(floats[mid]))
    }
}

/// Population standard deviation over at least two points.
fn stdev(data: &[Value]) -> Result<Value, PipeError> {
    if data.len() < 2 {
        return Err(PipeError::InvalidFlow(
            "stdev requires at least two data points".to_string(),
        ));
    }
    let floats = as_f64_vec(data)?;
    let n = floats.len() as f64;
    let mean = floats.iter().sum::<f64>() / n;
    let variance = floats
        .iter()
        .map(|v| {
            let d = mean - v;
            d * d
        })
        .sum::<f64>()
        / n;
    Ok(Value::Float(variance.sqrt()))
}

/// Narrow an i128 sum back to the i64 value domain.
pub(crate) fn int_total(acc: i128) -> Result<Value, PipeError> {
    i64::try_from(acc)
        .map(Value::Int)
        .map_err(|_| PipeError::InvalidFlow("integer sum overflows the i64 range".to_string()))
}

/// Shift amounts must be in 0..64, same as the expression evaluator.
pub(crate) fn shift_amount(op: Op, operand: Option<&Value>) -> Result<u32, PipeError> {
    let c = operand
        .ok_or_else(|| PipeError::InvalidFlow(format!("`{}` requires an operand", op.name())))?
        .as_i64()?;
    if (0..64).contains(&c) {
        Ok(c as u32)
    } else {
        Err(PipeError::InvalidFlow(format!(
            "`{}` shift amount must be in 0..64, got {c}",
            op.name()
        )))
    }
}

pub(crate) fn as_f64_vec(data: &[Value]) -> Result<Vec<f64>, PipeError> {
    data.iter()
        .map(|v| v.as_f64().map_err(PipeError::from))
        .collect()
}

pub(crate) fn as_i64_slice(data: &[Value]) -> Result<Vec<i64>, PipeError> {
    data.iter()
        .map(|v| v.as_i64().map_err(PipeError::from))
        .collect()
}
