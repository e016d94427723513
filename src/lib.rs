//! pipewise: chainable lazy pipelines with adaptive backend dispatch
//!
//! Compose transformation stages over a data source without executing
//! anything; a terminal call walks the stage list, streaming where possible
//! and materializing only where a stage needs the whole sequence. Aggregates
//! and elementwise bitwise ops are backend-eligible: a dispatcher picks, per
//! execution, between the reference implementation and a registered
//! accelerator based on element count, thresholds, and force flags — with
//! value-equivalent results guaranteed either way.
//!
//! ```
//! use pipewise::{pipe, arg, Value};
//!
//! let out = pipe([1i64, 2, 3, 4, 5])
//!     .filter(arg().gt(2))
//!     .map(arg() * 10)
//!     .to_list()
//!     .unwrap();
//! assert_eq!(out, vec![Value::Int(30), Value::Int(40), Value::Int(50)]);
//! ```

pub mod backend;
pub mod error;
pub mod expr;
pub mod pipeline;
pub mod value;

pub use backend::{Accelerator, BackendHint, Op, OpFamily, Registry};
pub use error::{ExprError, PipeError};
pub use expr::{arg, compose, lit, Expr};
pub use pipeline::{pipe, Pipe, Source, Stage, StageKind};
pub use value::Value;
