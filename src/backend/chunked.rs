//! `chunked` accelerator: 4-lane unrolled numeric aggregates
//!
//! Monomorphic tight-loop kernels over extracted slices. Integer sums use
//! four i128 accumulators, so they never wrap and stay bit-identical to the
//! sequential reference; float kernels reassociate, which stays inside the
//! 1e-6 aggregate tolerance.

use crate::error::PipeError;
use crate::value::Value;

use super::op::{Op, OpFamily};
use super::reference;
use super::registry::Accelerator;

/// Built-in numeric aggregate accelerator
pub struct Chunked;

impl Accelerator for Chunked {
    fn name(&self) -> &'static str {
        "chunked"
    }

    // In-process kernels: always present
    fn probe(&self) -> bool {
        true
    }

    fn supports(&self, op: Op) -> bool {
        op.family() == OpFamily::Numeric
    }

    fn fold(&self, op: Op, data: &[Value]) -> Result<Value, PipeError> {
        match op {
            Op::Sum => sum(data),
            Op::Mean => mean(data),
            Op::Min => extremum(data, "min", |cand, best| cand < best),
            Op::Max => extremum(data, "max", |cand, best| cand > best),
            Op::Median => median(data),
            Op::Stdev => stdev(data),
            other => Err(PipeError::InvalidFlow(format!(
                "chunked does not implement `{}`",
                other.name()
            ))),
        }
    }

    fn map(
        &self,
        op: Op,
        _data: &[Value],
        _operand: Option<&Value>,
    ) -> Result<Vec<Value>, PipeError> {
        Err(PipeError::InvalidFlow(format!(
            "chunked does not implement `{}`",
            op.name()
        )))
    }
}

/// 4-lane integer sum in i128 lanes; cannot wrap for any slice that fits in
/// memory, and matches the sequential reference exactly.
fn sum_i64_unrolled(data: &[i64]) -> i128 {
    let mut lanes = [0i128; 4];
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();
    for chunk in chunks {
        lanes[0] += i128::from(chunk[0]);
        lanes[1] += i128::from(chunk[1]);
        lanes[2] += i128::from(chunk[2]);
        lanes[3] += i128::from(chunk[3]);
    }
    let mut acc = lanes[0] + lanes[1] + lanes[2] + lanes[3];
    for &v in tail {
        acc += i128::from(v);
    }
    acc
}

/// 4-lane f64 sum
fn sum_f64_unrolled(data: &[f64]) -> f64 {
    let mut lanes = [0.0f64; 4];
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();
    for chunk in chunks {
        lanes[0] += chunk[0];
        lanes[1] += chunk[1];
        lanes[2] += chunk[2];
        lanes[3] += chunk[3];
    }
    let mut acc = lanes[0] + lanes[1] + lanes[2] + lanes[3];
    for &v in tail {
        acc += v;
    }
    acc
}

fn sum(data: &[Value]) -> Result<Value, PipeError> {
    if data.iter().all(|v| matches!(v, Value::Int(_))) {
        let ints = reference::as_i64_slice(data)?;
        return reference::int_total(sum_i64_unrolled(&ints));
    }
    let floats = reference::as_f64_vec(data)?;
    Ok(Value::Float(sum_f64_unrolled(&floats)))
}

fn mean(data: &[Value]) -> Result<Value, PipeError> {
    if data.is_empty() {
        return Err(PipeError::InvalidFlow(
            "mean of an empty sequence".to_string(),
        ));
    }
    let floats = reference::as_f64_vec(data)?;
    Ok(Value::Float(sum_f64_unrolled(&floats) / floats.len() as f64))
}

/// Track the best index so the original Value variant is preserved,
/// matching the reference implementation's result shape.
fn extremum(
    data: &[Value],
    name: &str,
    better: impl Fn(f64, f64) -> bool,
) -> Result<Value, PipeError> {
    if data.is_empty() {
        return Err(PipeError::InvalidFlow(format!(
            "{name} of an empty sequence"
        )));
    }
    let floats = reference::as_f64_vec(data)?;
    let mut best_idx = 0;
    let mut best = floats[0];
    for (i, &f) in floats.iter().enumerate().skip(1) {
        if better(f, best) {
            best = f;
            best_idx = i;
        }
    }
    Ok(data[best_idx].clone())
}

fn median(data: &[Value]) -> Result<Value, PipeError> {
    if data.is_empty() {
        return Err(PipeError::InvalidFlow(
            "median of an empty sequence".to_string(),
        ));
    }
    let mut floats = reference::as_f64_vec(data)?;
    floats.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = floats.len() / 2;
    if floats.len() % 2 == 0 {
        Ok(Value::Float((floats[mid - 1] + floats[mid]) / 2.0))
    } else {
        Ok(Value::Float(floats[mid]))
    }
}

fn stdev(data: &[Value]) -> Result<Value, PipeError> {
    if data.len() < 2 {
        return Err(PipeError::InvalidFlow(
            "stdev requires at least two data points".to_string(),
        ));
    }
    let floats = reference::as_f64_vec(data)?;
    let n = floats.len() as f64;
    let mean = sum_f64_unrolled(&floats) / n;
    let mut sq = Vec::with_capacity(floats.len());
    for &v in &floats {
        let d = mean - v;
        sq.push(d * d);
    }
    Ok(Value::Float((sum_f64_unrolled(&sq) / n).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Int(v)).collect()
    }

    #[test]
    fn test_unrolled_int_sum_matches_reference_exactly() {
        for n in [0usize, 1, 3, 4, 5, 999, 1000] {
            let data: Vec<Value> = (0..n as i64).map(Value::Int).collect();
            let fast = Chunked.fold(Op::Sum, &data).unwrap();
            let slow = reference::fold(Op::Sum, &data).unwrap();
            assert_eq!(fast, slow, "n={n}");
        }
    }

    #[test]
    fn test_float_aggregates_within_tolerance() {
        let data: Vec<Value> = (0..1003).map(|i| Value::Float(i as f64 * 0.1)).collect();
        for op in [Op::Sum, Op::Mean, Op::Median, Op::Stdev] {
            let fast = Chunked.fold(op, &data).unwrap().as_f64().unwrap();
            let slow = reference::fold(op, &data).unwrap().as_f64().unwrap();
            let scale = slow.abs().max(1.0);
            assert!(
                (fast - slow).abs() / scale <= 1e-6,
                "{}: {fast} vs {slow}",
                op.name()
            );
        }
    }

    #[test]
    fn test_sum_overflow_matches_reference() {
        assert!(Chunked.fold(Op::Sum, &ints(&[i64::MAX, 1])).is_err());
        // Cancelling intermediates: both implementations stay exact
        let data = ints(&[i64::MAX, 1, -2]);
        assert_eq!(
            Chunked.fold(Op::Sum, &data).unwrap(),
            reference::fold(Op::Sum, &data).unwrap()
        );
    }

    #[test]
    fn test_extremum_preserves_variant() {
        let mixed = vec![Value::Int(3), Value::Float(1.5), Value::Int(7)];
        assert_eq!(Chunked.fold(Op::Min, &mixed).unwrap(), Value::Float(1.5));
        assert_eq!(Chunked.fold(Op::Max, &mixed).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_empty_and_degenerate_inputs() {
        assert_eq!(Chunked.fold(Op::Sum, &[]).unwrap(), Value::Int(0));
        assert!(Chunked.fold(Op::Mean, &[]).is_err());
        assert!(Chunked.fold(Op::Stdev, &ints(&[1])).is_err());
    }
}
