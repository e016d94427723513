//! Operator overloads for expression building
//!
//! Arithmetic and bitwise `std::ops` on [`Expr`] record the operator instead
//! of computing; any `Into<Expr>` works as the right-hand side, so literals
//! can appear inline: `arg() * 2 + 1`.
//!
//! `>>` is deliberately *not* a bitwise shift: it records composition
//! (`f >> g` means "f, then g"), matching the pipeline's right-pipe reading.
//! Bitwise shifts are the `shl`/`shr` methods.

use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shr, Sub};

use super::ast::{compose, BinaryOp, Expr, UnaryOp};
use crate::value::Value;

impl From<Value> for Expr {
    fn from(v: Value) -> Expr {
        Expr::Literal(v)
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Expr {
        Expr::Literal(Value::Int(i))
    }
}

impl From<i32> for Expr {
    fn from(i: i32) -> Expr {
        Expr::Literal(Value::Int(i64::from(i)))
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Expr {
        Expr::Literal(Value::Float(f))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Expr {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Expr {
        Expr::Literal(Value::Str(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Expr {
        Expr::Literal(Value::Str(s))
    }
}

macro_rules! record_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::Binary {
                    op: $op,
                    lhs: Box::new(self),
                    rhs: Box::new(rhs.into()),
                }
            }
        }
    };
}

record_binary_op!(Add, add, BinaryOp::Add);
record_binary_op!(Sub, sub, BinaryOp::Sub);
record_binary_op!(Mul, mul, BinaryOp::Mul);
record_binary_op!(Div, div, BinaryOp::Div);
record_binary_op!(Rem, rem, BinaryOp::Rem);
record_binary_op!(BitAnd, bitand, BinaryOp::BitAnd);
record_binary_op!(BitOr, bitor, BinaryOp::BitOr);
record_binary_op!(BitXor, bitxor, BinaryOp::BitXor);

/// `f >> g` records composition, not a shift
impl<R: Into<Expr>> Shr<R> for Expr {
    type Output = Expr;

    fn shr(self, rhs: R) -> Expr {
        compose(self, rhs.into())
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }
}

/// `!expr` records `~` (bitwise complement on ints, logical not on bools)
impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::arg;

    #[test]
    fn test_inline_literals() {
        let e = arg() * 2 + 1;
        // Outermost op should be the add
        assert_eq!(e.outermost_op(), "+");
    }

    #[test]
    fn test_shr_is_composition() {
        let e = arg() * 2 >> arg().pow(2);
        match e {
            Expr::Compose { .. } => {}
            other => panic!("expected composition, got {other:?}"),
        }
    }

    #[test]
    fn test_unary_records() {
        assert_eq!((-arg()).outermost_op(), "-");
        assert_eq!((!arg()).outermost_op(), "~");
    }
}
