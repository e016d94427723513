//! Backend-eligible operations
//!
//! Closed identifier set so capability tables and kernels can match
//! exhaustively. Folds collapse a sequence to a scalar; maps rewrite every
//! element (the elementwise bitwise family).

/// Identifier of a backend-eligible operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Sum,
    Mean,
    Min,
    Max,
    Median,
    Stdev,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    LeftShift,
    RightShift,
}

/// Operation family: one accelerator is active per family at a time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpFamily {
    Numeric,
    Bitwise,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Sum => "sum",
            Op::Mean => "mean",
            Op::Min => "min",
            Op::Max => "max",
            Op::Median => "median",
            Op::Stdev => "stdev",
            Op::BitwiseAnd => "bitwise_and",
            Op::BitwiseOr => "bitwise_or",
            Op::BitwiseXor => "bitwise_xor",
            Op::BitwiseNot => "bitwise_not",
            Op::LeftShift => "left_shift",
            Op::RightShift => "right_shift",
        }
    }

    pub fn family(self) -> OpFamily {
        match self {
            Op::Sum | Op::Mean | Op::Min | Op::Max | Op::Median | Op::Stdev => OpFamily::Numeric,
            Op::BitwiseAnd
            | Op::BitwiseOr
            | Op::BitwiseXor
            | Op::BitwiseNot
            | Op::LeftShift
            | Op::RightShift => OpFamily::Bitwise,
        }
    }

    /// Whether this op collapses the sequence to a scalar
    pub fn is_fold(self) -> bool {
        self.family() == OpFamily::Numeric
    }

    /// Whether this op takes a scalar operand (`bitwise_and(7)`)
    pub fn takes_operand(self) -> bool {
        !matches!(self, Op::BitwiseNot) && self.family() == OpFamily::Bitwise
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        assert_eq!(Op::Sum.family(), OpFamily::Numeric);
        assert_eq!(Op::BitwiseAnd.family(), OpFamily::Bitwise);
        assert!(Op::Median.is_fold());
        assert!(!Op::LeftShift.is_fold());
        assert!(Op::LeftShift.takes_operand());
        assert!(!Op::BitwiseNot.takes_operand());
    }
}
