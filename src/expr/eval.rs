//! Expression replay
//!
//! A straightforward recursive tree-walk: substitute the input for the
//! placeholder, evaluate operands innermost-first, then apply the recorded
//! operator. Failures name the offending operation and the runtime type it
//! was applied to.

use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ExprError;
use crate::value::Value;

impl Expr {
    /// Replay the recorded tree against `input`.
    ///
    /// Referentially transparent: same input, same result, every time.
    pub fn eval(&self, input: &Value) -> Result<Value, ExprError> {
        match self {
            Expr::Placeholder => Ok(input.clone()),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Unary { op, operand } => {
                let v = operand.eval(input)?;
                eval_unary(*op, v)
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(input)?;
                let b = rhs.eval(input)?;
                eval_binary(*op, a, b)
            }
            Expr::Index { target, index } => {
                let t = target.eval(input)?;
                let i = index.eval(input)?;
                eval_index(t, i)
            }
            Expr::Method { target, name, args } => {
                let t = target.eval(input)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for a in args {
                    evaluated.push(a.eval(input)?);
                }
                eval_method(t, name, &evaluated)
            }
            Expr::Compose { first, then } => {
                let mid = first.eval(input)?;
                then.eval(&mid)
            }
        }
    }
}

fn unsupported(op: &str, v: &Value) -> ExprError {
    ExprError::Unsupported {
        op: op.to_string(),
        type_name: v.type_name(),
    }
}

fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, ExprError> {
    match (op, &v) {
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| unsupported("- (overflow)", &v)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(unsupported(op.symbol(), &v)),
    }
}

fn eval_binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add => eval_add(a, b),
        BinaryOp::Sub => numeric_op(op, a, b, |x, y| x.checked_sub(y), |x, y| x - y),
        BinaryOp::Mul => eval_mul(a, b),
        BinaryOp::Div => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Float(x / y))
        }
        BinaryOp::FloorDiv => eval_floor_div(a, b),
        BinaryOp::Rem => eval_rem(a, b),
        BinaryOp::Pow => eval_pow(a, b),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&a, &b))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&a, &b))),
        BinaryOp::Gt => ordering(op, &a, &b).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => ordering(op, &a, &b).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Lt => ordering(op, &a, &b).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => ordering(op, &a, &b).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::BitAnd => bitwise(op, a, b, |x, y| x & y, |x, y| x & y),
        BinaryOp::BitOr => bitwise(op, a, b, |x, y| x | y, |x, y| x | y),
        BinaryOp::BitXor => bitwise(op, a, b, |x, y| x ^ y, |x, y| x ^ y),
        BinaryOp::Shl => shift(op, a, b, |x, n| x << n),
        BinaryOp::Shr => shift(op, a, b, |x, n| x >> n),
    }
}

fn eval_add(a: Value, b: Value) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
        (Value::List(x), Value::List(y)) => {
            let mut out = x.clone();
            out.extend(y.iter().cloned());
            Ok(Value::List(out))
        }
        _ => numeric_op(BinaryOp::Add, a, b, |x, y| x.checked_add(y), |x, y| x + y),
    }
}

fn eval_mul(a: Value, b: Value) -> Result<Value, ExprError> {
    // String repetition: "ab" * 3
    if let (Value::Str(s), Value::Int(n)) = (&a, &b) {
        let n = (*n).max(0) as usize;
        return Ok(Value::Str(s.repeat(n)));
    }
    numeric_op(BinaryOp::Mul, a, b, |x, y| x.checked_mul(y), |x, y| x * y)
}

/// Int-preserving numeric binary op with float promotion
fn numeric_op(
    op: BinaryOp,
    a: Value,
    b: Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y).map(Value::Int).ok_or_else(|| {
            unsupported(&format!("{} (integer overflow)", op.symbol()), &a)
        }),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            // as_f64 cannot fail here
            Ok(Value::Float(float_op(a.as_f64()?, b.as_f64()?)))
        }
        _ => Err(unsupported(
            op.symbol(),
            if matches!(a, Value::Int(_) | Value::Float(_)) { &b } else { &a },
        )),
    }
}

/// Floor toward negative infinity, matching the recorded `//` semantics
fn floor_div_i64(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Modulo whose sign follows the divisor
fn mod_floor_i64(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

fn eval_floor_div(a: Value, b: Value) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => {
            if *y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Int(floor_div_i64(*x, *y)))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Float((x / y).floor()))
        }
        _ => Err(unsupported("//", &a)),
    }
}

fn eval_rem(a: Value, b: Value) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => {
            if *y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Int(mod_floor_i64(*x, *y)))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Float(x - y * (x / y).floor()))
        }
        _ => Err(unsupported("%", &a)),
    }
}

fn eval_pow(a: Value, b: Value) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) if *y >= 0 => {
            let exp = u32::try_from(*y)
                .ok()
                .ok_or_else(|| unsupported("** (exponent too large)", &b))?;
            x.checked_pow(exp)
                .map(Value::Int)
                .ok_or_else(|| unsupported("** (integer overflow)", &a))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Ok(Value::Float(a.as_f64()?.powf(b.as_f64()?)))
        }
        _ => Err(unsupported("**", &a)),
    }
}

/// Loose equality: numeric values compare across Int/Float, everything else
/// structurally; values of incompatible types are unequal, never an error.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        _ => a == b,
    }
}

fn ordering(op: BinaryOp, a: &Value, b: &Value) -> Result<Ordering, ExprError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => a
            .as_f64()?
            .partial_cmp(&b.as_f64()?)
            .ok_or_else(|| unsupported(&format!("{} (NaN)", op.symbol()), a)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        _ => Err(unsupported(op.symbol(), a)),
    }
}

fn bitwise(
    op: BinaryOp,
    a: Value,
    b: Value,
    int_op: impl Fn(i64, i64) -> i64,
    bool_op: impl Fn(bool, bool) -> bool,
) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(int_op(*x, *y))),
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(bool_op(*x, *y))),
        _ => Err(unsupported(op.symbol(), &a)),
    }
}

fn shift(op: BinaryOp, a: Value, b: Value, f: impl Fn(i64, u32) -> i64) -> Result<Value, ExprError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) if (0..64).contains(y) => Ok(Value::Int(f(*x, *y as u32))),
        (Value::Int(_), Value::Int(_)) => {
            Err(unsupported(&format!("{} (shift amount)", op.symbol()), &b))
        }
        _ => Err(unsupported(op.symbol(), &a)),
    }
}

fn eval_index(target: Value, index: Value) -> Result<Value, ExprError> {
    match (&target, &index) {
        (Value::List(items), Value::Int(i)) => {
            let idx = resolve_index(*i, items.len())?;
            Ok(items[idx].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = resolve_index(*i, chars.len())?;
            Ok(Value::Str(chars[idx].to_string()))
        }
        (Value::Record(fields), Value::Str(key)) => fields
            .get(key)
            .cloned()
            .ok_or_else(|| ExprError::KeyNotFound { key: key.clone() }),
        _ => Err(unsupported("index", &target)),
    }
}

/// Negative indices count from the end
fn resolve_index(i: i64, len: usize) -> Result<usize, ExprError> {
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved as usize >= len {
        Err(ExprError::IndexOutOfBounds { index: i, len })
    } else {
        Ok(resolved as usize)
    }
}

fn eval_method(target: Value, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match (&target, name) {
        (Value::Str(s), "strip") => Ok(Value::Str(s.trim().to_string())),
        (Value::Str(s), "upper") => Ok(Value::Str(s.to_uppercase())),
        (Value::Str(s), "lower") => Ok(Value::Str(s.to_lowercase())),
        (Value::Str(s), "title") => Ok(Value::Str(title_case(s))),
        (Value::Str(s), "capitalize") => Ok(Value::Str(capitalize(s))),
        (Value::Str(s), "replace") => {
            let (from, to) = two_str_args(name, args)?;
            Ok(Value::Str(s.replace(from, to)))
        }
        (Value::Str(s), "split") => {
            let sep = one_str_arg(name, args)?;
            Ok(Value::List(
                s.split(sep).map(|part| Value::Str(part.to_string())).collect(),
            ))
        }
        (Value::Str(s), "len") => Ok(Value::Int(s.chars().count() as i64)),
        (Value::List(items), "len") => Ok(Value::Int(items.len() as i64)),
        (Value::Record(fields), "len") => Ok(Value::Int(fields.len() as i64)),
        _ => Err(ExprError::UnknownMethod {
            name: name.to_string(),
            type_name: target.type_name(),
        }),
    }
}

fn one_str_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, ExprError> {
    match args {
        [Value::Str(a)] => Ok(a),
        _ => Err(ExprError::Unsupported {
            op: format!("method {name} (expects one string argument)"),
            type_name: args.first().map_or("unit", Value::type_name),
        }),
    }
}

fn two_str_args<'a>(name: &str, args: &'a [Value]) -> Result<(&'a str, &'a str), ExprError> {
    match args {
        [Value::Str(a), Value::Str(b)] => Ok((a, b)),
        _ => Err(ExprError::Unsupported {
            op: format!("method {name} (expects two string arguments)"),
            type_name: args.first().map_or("unit", Value::type_name),
        }),
    }
}

/// Upper-case the first character of every alphanumeric run, preserving
/// the original separators and spacing.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut start_of_word = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if start_of_word {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(c);
            start_of_word = true;
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
