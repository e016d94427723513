//! Recorded expression tree
//!
//! A closed tagged-variant tree over exactly one free variable (the
//! placeholder). Building never evaluates anything; nodes only record which
//! operator was applied to which operands.

use crate::error::ExprError;
use crate::value::Value;

/// Unary operators recordable on an expression
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Bitwise complement on ints, logical not on bools
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "~",
        }
    }
}

/// Binary operators recordable on an expression
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// True division: always produces a float
    Div,
    /// Floor division: stays integral for int operands
    FloorDiv,
    Rem,
    Pow,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

/// A recorded, replayable expression over one free variable.
///
/// Evaluation is referentially transparent: the same input always produces
/// the same result, and building carries no hidden state.
#[derive(Clone, Debug)]
pub enum Expr {
    /// The free variable
    Placeholder,
    /// A constant operand
    Literal(Value),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Index / key access: list index, record key, or string char
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// Symbolic method call, resolved against the runtime type at replay
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// "apply `first`, then feed the result to `then`"
    Compose {
        first: Box<Expr>,
        then: Box<Expr>,
    },
}

/// The placeholder: the single free variable of a deferred expression
pub fn arg() -> Expr {
    Expr::Placeholder
}

/// Lift a constant into an expression
pub fn lit(v: impl Into<Value>) -> Expr {
    Expr::Literal(v.into())
}

/// Right-pipe composition: `compose(f, g).eval(x) == g.eval(f.eval(x))`
pub fn compose(f: Expr, g: Expr) -> Expr {
    Expr::Compose {
        first: Box::new(f),
        then: Box::new(g),
    }
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs.into()),
        }
    }

    /// Exponentiation (`**`)
    pub fn pow(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Pow, self, rhs)
    }

    /// Floor division (`//`)
    pub fn floor_div(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::FloorDiv, self, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Le, self, rhs)
    }

    /// Recorded equality test (`==` cannot be overloaded to return an Expr)
    pub fn eq_value(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    /// Recorded inequality test
    pub fn ne_value(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Ne, self, rhs)
    }

    /// Bitwise left shift (`<<` is taken by nothing, but kept symmetrical
    /// with `shr`, since `>>` is composition)
    pub fn shl(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Shl, self, rhs)
    }

    /// Bitwise right shift
    pub fn shr(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Shr, self, rhs)
    }

    /// Positional or computed index access
    pub fn index(self, idx: impl Into<Expr>) -> Expr {
        Expr::Index {
            target: Box::new(self),
            index: Box::new(idx.into()),
        }
    }

    /// Record key access: `arg().key("city")`
    pub fn key(self, key: &str) -> Expr {
        self.index(lit(key))
    }

    /// Record an arbitrary method call; unknown names fail at replay time
    pub fn method(self, name: &str, args: Vec<Expr>) -> Expr {
        Expr::Method {
            target: Box::new(self),
            name: name.to_string(),
            args,
        }
    }

    /// Trim surrounding whitespace
    pub fn strip(self) -> Expr {
        self.method("strip", vec![])
    }

    /// Title-case each word
    pub fn title(self) -> Expr {
        self.method("title", vec![])
    }

    /// Upper-case the first character, lower-case the rest
    pub fn capitalize(self) -> Expr {
        self.method("capitalize", vec![])
    }

    pub fn upper(self) -> Expr {
        self.method("upper", vec![])
    }

    pub fn lower(self) -> Expr {
        self.method("lower", vec![])
    }

    /// Replace every occurrence of `from` with `to`
    pub fn replace(self, from: impl Into<Expr>, to: impl Into<Expr>) -> Expr {
        self.method("replace", vec![from.into(), to.into()])
    }

    /// Split on a separator, producing a list
    pub fn split(self, sep: impl Into<Expr>) -> Expr {
        self.method("split", vec![sep.into()])
    }

    /// Length of a string or list
    pub fn len(self) -> Expr {
        self.method("len", vec![])
    }

    /// Alias for [`compose`]: apply `self`, then `next`
    pub fn then(self, next: Expr) -> Expr {
        compose(self, next)
    }

    /// Name of the outermost recorded operation, for diagnostics
    pub fn outermost_op(&self) -> String {
        match self {
            Expr::Placeholder => "placeholder".to_string(),
            Expr::Literal(_) => "literal".to_string(),
            Expr::Unary { op, .. } => op.symbol().to_string(),
            Expr::Binary { op, .. } => op.symbol().to_string(),
            Expr::Index { .. } => "index".to_string(),
            Expr::Method { name, .. } => format!("method {name}"),
            Expr::Compose { .. } => ">>".to_string(),
        }
    }
}

/// A deferred expression is not a value. Conversion succeeds only for plain
/// literals; anything with a recorded computation fails fast instead of
/// silently rendering the unevaluated tree (the classic footgun when an
/// expression ends up as a template interpolation target).
impl TryFrom<Expr> for Value {
    type Error = ExprError;

    fn try_from(expr: Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(v) => Ok(v),
            other => Err(ExprError::DeferredWhereConcrete {
                op: other.outermost_op(),
            }),
        }
    }
}
