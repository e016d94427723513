//! `bitblast` accelerator: elementwise bitwise kernels
//!
//! Unrolled in-place loops over an extracted i64 buffer, one output
//! allocation per call. Results are bit-identical to the reference
//! implementation for every input.

use crate::error::PipeError;
use crate::value::Value;

use super::op::{Op, OpFamily};
use super::reference;
use super::registry::Accelerator;

/// Built-in elementwise bitwise accelerator
pub struct Bitblast;

impl Accelerator for Bitblast {
    fn name(&self) -> &'static str {
        "bitblast"
    }

    fn probe(&self) -> bool {
        true
    }

    fn supports(&self, op: Op) -> bool {
        op.family() == OpFamily::Bitwise
    }

    fn fold(&self, op: Op, _data: &[Value]) -> Result<Value, PipeError> {
        Err(PipeError::InvalidFlow(format!(
            "bitblast does not implement `{}`",
            op.name()
        )))
    }

    fn map(
        &self,
        op: Op,
        data: &[Value],
        operand: Option<&Value>,
    ) -> Result<Vec<Value>, PipeError> {
        let mut buf = reference::as_i64_slice(data)?;
        match op {
            Op::BitwiseAnd => apply_unrolled(&mut buf, required(op, operand)?, |x, c| x & c),
            Op::BitwiseOr => apply_unrolled(&mut buf, required(op, operand)?, |x, c| x | c),
            Op::BitwiseXor => apply_unrolled(&mut buf, required(op, operand)?, |x, c| x ^ c),
            Op::BitwiseNot => apply_unrolled(&mut buf, 0, |x, _| !x),
            Op::LeftShift => {
                let n = reference::shift_amount(op, operand)?;
                apply_unrolled(&mut buf, i64::from(n), |x, c| x << c as u32)
            }
            Op::RightShift => {
                let n = reference::shift_amount(op, operand)?;
                apply_unrolled(&mut buf, i64::from(n), |x, c| x >> c as u32)
            }
            other => {
                return Err(PipeError::InvalidFlow(format!(
                    "bitblast does not implement `{}`",
                    other.name()
                )))
            }
        }
        Ok(buf.into_iter().map(Value::Int).collect())
    }
}

fn required(op: Op, operand: Option<&Value>) -> Result<i64, PipeError> {
    operand
        .ok_or_else(|| PipeError::InvalidFlow(format!("`{}` requires an operand", op.name())))?
        .as_i64()
        .map_err(PipeError::from)
}

/// In-place 4-lane unrolled elementwise kernel
fn apply_unrolled(buf: &mut [i64], operand: i64, f: impl Fn(i64, i64) -> i64) {
    let mut chunks = buf.chunks_exact_mut(4);
    for chunk in &mut chunks {
        chunk[0] = f(chunk[0], operand);
        chunk[1] = f(chunk[1], operand);
        chunk[2] = f(chunk[2], operand);
        chunk[3] = f(chunk[3], operand);
    }
    for v in chunks.into_remainder() {
        *v = f(*v, operand);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Int(v)).collect()
    }

    #[test]
    fn test_bitwise_matches_reference_exactly() {
        let data: Vec<Value> = (-50..50).map(Value::Int).collect();
        let operand = Value::Int(7);
        for op in [Op::BitwiseAnd, Op::BitwiseOr, Op::BitwiseXor, Op::LeftShift, Op::RightShift] {
            let fast = Bitblast.map(op, &data, Some(&operand)).unwrap();
            let slow = reference::map(op, &data, Some(&operand)).unwrap();
            assert_eq!(fast, slow, "{}", op.name());
        }
        assert_eq!(
            Bitblast.map(Op::BitwiseNot, &data, None).unwrap(),
            reference::map(Op::BitwiseNot, &data, None).unwrap()
        );
    }

    #[test]
    fn test_and_scenario() {
        let out = Bitblast
            .map(Op::BitwiseAnd, &ints(&[15, 31, 63, 127]), Some(&Value::Int(7)))
            .unwrap();
        assert_eq!(out, ints(&[7, 7, 7, 7]));
    }

    #[test]
    fn test_missing_operand_errors() {
        assert!(Bitblast.map(Op::BitwiseAnd, &ints(&[1]), None).is_err());
    }

    #[test]
    fn test_shift_amount_out_of_range_errors() {
        let data = ints(&[1, 2]);
        for bad in [-1i64, 64, 1000] {
            assert!(Bitblast.map(Op::LeftShift, &data, Some(&Value::Int(bad))).is_err());
            assert!(Bitblast.map(Op::RightShift, &data, Some(&Value::Int(bad))).is_err());
        }
    }
}
