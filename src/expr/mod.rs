//! Deferred expression builder
//!
//! An expression is written once against the placeholder (`arg()`), captured
//! as a closed tree of recorded operations, and replayed against arbitrary
//! inputs later:
//!
//! ```
//! use pipewise::{arg, Value};
//!
//! let double_then_square = arg() * 2 >> arg().pow(2);
//! assert_eq!(double_then_square.eval(&Value::Int(3)).unwrap(), Value::Int(36));
//! ```
//!
//! Arithmetic and bitwise operators come from `std::ops` overloads; Rust
//! comparison operators must return `bool`, so comparisons are the `gt`,
//! `ge`, `lt`, `le`, `eq_value`, `ne_value` builders. `>>` is composition
//! ("apply this, then that"); bitwise shifts are `shl(n)` / `shr(n)`.

pub mod ast;
pub mod eval;
pub mod ops;

pub use ast::{arg, compose, lit, BinaryOp, Expr, UnaryOp};
