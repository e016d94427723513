//! Stage descriptors
//!
//! A stage records one pipeline operation: its kind, its operation payload
//! (deferred expression, external function, aggregate selector, ...), and a
//! backend hint. Stages are immutable once appended; sequence order defines
//! composition.

use std::fmt;
use std::rc::Rc;

use crate::backend::{BackendHint, Op};
use crate::error::PipeError;
use crate::expr::Expr;
use crate::value::Value;

/// External per-element function (e.g. the template collaborator)
pub type ValueFn = Rc<dyn Fn(&Value) -> Result<Value, PipeError>>;

/// Pure observer for side-effect stages
pub type ObserverFn = Rc<dyn Fn(&Value)>;

/// Closed set of stage kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Map,
    Filter,
    Take,
    Skip,
    /// Observation hook ("do"): passes elements through unchanged
    SideEffect,
    /// Logging hook: passes elements through unchanged
    Debug,
    Sort,
    GroupBy,
    Window,
    Unique,
    Flatten,
    Reverse,
    /// Reduce / terminal aggregate (sum, mean, median, ...)
    Aggregate,
    /// Elementwise bitwise rewrite (backend-eligible, stays a sequence)
    Bitwise,
    /// Whole-current-value transform (works on scalar flows)
    Apply,
    /// Per-element render via the external template collaborator
    Template,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Map => "map",
            StageKind::Filter => "filter",
            StageKind::Take => "take",
            StageKind::Skip => "skip",
            StageKind::SideEffect => "side_effect",
            StageKind::Debug => "debug",
            StageKind::Sort => "sort",
            StageKind::GroupBy => "group_by",
            StageKind::Window => "window",
            StageKind::Unique => "unique",
            StageKind::Flatten => "flatten",
            StageKind::Reverse => "reverse",
            StageKind::Aggregate => "aggregate",
            StageKind::Bitwise => "bitwise",
            StageKind::Apply => "apply",
            StageKind::Template => "template",
        }
    }

    /// Streaming-compatible kinds wrap the flow lazily; everything else
    /// requires full knowledge of the sequence first.
    pub fn is_streaming(self) -> bool {
        matches!(
            self,
            StageKind::Map
                | StageKind::Filter
                | StageKind::Take
                | StageKind::Skip
                | StageKind::SideEffect
                | StageKind::Debug
                | StageKind::Flatten
                | StageKind::Template
        )
    }

    /// Backend-eligible kinds consult the dispatch policy at execution time.
    pub fn is_backend_eligible(self) -> bool {
        matches!(self, StageKind::Aggregate | StageKind::Bitwise)
    }
}

/// Operation payload of a stage
#[derive(Clone)]
pub enum StageOp {
    /// Deferred expression replayed per element (or against the scalar flow)
    Expr(Expr),
    /// External function applied per element
    Func(ValueFn),
    /// Pure observer (side-effect stages)
    Observe(ObserverFn),
    /// Label for debug stages
    Label(String),
    /// Element count for take/skip/window
    Count(usize),
    /// Sort specification; `key: None` sorts elements by their own value
    SortSpec { key: Option<Expr>, descending: bool },
    /// Aggregate selector
    Aggregate(Op),
    /// Elementwise backend op with optional scalar operand
    Elementwise { op: Op, operand: Option<Value> },
    /// Stages with no payload (unique, reverse)
    None,
}

impl fmt::Debug for StageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOp::Expr(e) => f.debug_tuple("Expr").field(e).finish(),
            StageOp::Func(_) => f.write_str("Func(..)"),
            StageOp::Observe(_) => f.write_str("Observe(..)"),
            StageOp::Label(l) => f.debug_tuple("Label").field(l).finish(),
            StageOp::Count(n) => f.debug_tuple("Count").field(n).finish(),
            StageOp::SortSpec { key, descending } => f
                .debug_struct("SortSpec")
                .field("key", key)
                .field("descending", descending)
                .finish(),
            StageOp::Aggregate(op) => f.debug_tuple("Aggregate").field(op).finish(),
            StageOp::Elementwise { op, operand } => f
                .debug_struct("Elementwise")
                .field("op", op)
                .field("operand", operand)
                .finish(),
            StageOp::None => f.write_str("None"),
        }
    }
}

/// One recorded pipeline operation
#[derive(Clone, Debug)]
pub struct Stage {
    pub kind: StageKind,
    pub op: StageOp,
    pub hint: BackendHint,
}

impl Stage {
    pub fn new(kind: StageKind, op: StageOp) -> Self {
        Stage {
            kind,
            op,
            hint: BackendHint::Auto,
        }
    }
}
