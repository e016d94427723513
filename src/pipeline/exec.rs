//! Pipeline execution
//!
//! Walks the stage list against a freshly opened source, keeping a single
//! current flow. Streaming stages wrap the flow in a lazy pull-based
//! iterator; materializing stages collect it; backend-eligible stages
//! materialize, consult the dispatcher with the element count, and execute
//! the resolved implementation.
//!
//! Errors raised while processing an element abort the whole terminal call
//! and carry the failing stage's kind and position.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::backend::{dispatch, reference, Op, Registry, Resolution};
use crate::error::PipeError;
use crate::value::Value;

use super::source::{Opened, Source};
use super::stage::{Stage, StageKind, StageOp, ValueFn};

pub(crate) type ValueIter = Box<dyn Iterator<Item = Result<Value, PipeError>>>;

/// The current value during execution: still a lazy sequence, or already a
/// scalar (after an aggregate or a group).
pub(crate) enum Flow {
    Seq(ValueIter),
    Scalar(Value),
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Seq(_) => f.write_str("Seq(..)"),
            Flow::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
        }
    }
}

/// Execute the stage list against the source, producing the final flow.
pub(crate) fn run(
    source: &Source,
    stages: &[Stage],
    registry: &Rc<RefCell<Registry>>,
) -> Result<Flow, PipeError> {
    let mut flow = match source.open()? {
        Opened::Seq(it) => Flow::Seq(Box::new(it.map(Ok))),
        Opened::Scalar(v) => Flow::Scalar(v),
    };
    for (pos, stage) in stages.iter().enumerate() {
        flow = apply_stage(flow, stage, pos, registry)?;
    }
    Ok(flow)
}

fn apply_stage(
    flow: Flow,
    stage: &Stage,
    pos: usize,
    registry: &Rc<RefCell<Registry>>,
) -> Result<Flow, PipeError> {
    let kind = stage.kind;
    match kind {
        StageKind::Map | StageKind::Template => {
            let f = as_value_fn(&stage.op, kind, pos)?;
            Ok(match flow {
                Flow::Seq(it) => Flow::Seq(Box::new(it.map(move |item| {
                    item.and_then(|v| f(&v).map_err(|e| e.at_stage(kind.name(), pos)))
                }))),
                Flow::Scalar(v) => {
                    Flow::Scalar(f(&v).map_err(|e| e.at_stage(kind.name(), pos))?)
                }
            })
        }

        StageKind::Apply => {
            let f = as_value_fn(&stage.op, kind, pos)?;
            let current = into_value(flow)?;
            Ok(Flow::Scalar(
                f(&current).map_err(|e| e.at_stage(kind.name(), pos))?,
            ))
        }

        StageKind::Filter => {
            let pred = as_value_fn(&stage.op, kind, pos)?;
            let it = expect_seq(flow, kind, pos)?;
            Ok(Flow::Seq(Box::new(it.filter_map(move |item| match item {
                Err(e) => Some(Err(e)),
                Ok(v) => match pred(&v) {
                    Err(e) => Some(Err(e.at_stage(kind.name(), pos))),
                    Ok(keep) => {
                        if keep.truthy() {
                            Some(Ok(v))
                        } else {
                            None
                        }
                    }
                },
            }))))
        }

        StageKind::Take => {
            let n = expect_count(&stage.op, kind, pos)?;
            let it = expect_seq(flow, kind, pos)?;
            Ok(Flow::Seq(Box::new(it.take(n))))
        }

        StageKind::Skip => {
            let n = expect_count(&stage.op, kind, pos)?;
            let it = expect_seq(flow, kind, pos)?;
            Ok(Flow::Seq(Box::new(it.skip(n))))
        }

        StageKind::SideEffect => {
            let StageOp::Observe(obs) = &stage.op else {
                return Err(bad_payload(kind, pos));
            };
            let obs = Rc::clone(obs);
            Ok(match flow {
                Flow::Seq(it) => Flow::Seq(Box::new(it.map(move |item| {
                    if let Ok(v) = &item {
                        obs(v);
                    }
                    item
                }))),
                Flow::Scalar(v) => {
                    obs(&v);
                    Flow::Scalar(v)
                }
            })
        }

        StageKind::Debug => {
            let StageOp::Label(label) = &stage.op else {
                return Err(bad_payload(kind, pos));
            };
            let label = label.clone();
            Ok(match flow {
                Flow::Seq(it) => Flow::Seq(Box::new(it.map(move |item| {
                    if let Ok(v) = &item {
                        tracing::debug!(label = %label, value = %v, "debug stage");
                    }
                    item
                }))),
                Flow::Scalar(v) => {
                    tracing::debug!(label = %label, value = %v, "debug stage");
                    Flow::Scalar(v)
                }
            })
        }

        StageKind::Flatten => {
            let it = expect_seq(flow, kind, pos)?;
            Ok(Flow::Seq(Box::new(it.flat_map(move |item| {
                let inner: ValueIter = match item {
                    Err(e) => Box::new(std::iter::once(Err(e))),
                    Ok(Value::List(items)) => Box::new(items.into_iter().map(Ok)),
                    Ok(other) => Box::new(std::iter::once(Err(PipeError::InvalidFlow(
                        format!("flatten expects list elements, got {}", other.type_name()),
                    )
                    .at_stage(kind.name(), pos)))),
                };
                inner
            }))))
        }

        StageKind::Sort => {
            let StageOp::SortSpec { key, descending } = &stage.op else {
                return Err(bad_payload(kind, pos));
            };
            let elements = into_elements(flow, kind, pos)?;
            let sorted = sort_elements(elements, key.as_ref(), *descending)
                .map_err(|e| e.at_stage(kind.name(), pos))?;
            Ok(Flow::Seq(Box::new(sorted.into_iter().map(Ok))))
        }

        StageKind::GroupBy => {
            let f = as_value_fn(&stage.op, kind, pos)?;
            let elements = into_elements(flow, kind, pos)?;
            let mut groups: BTreeMap<String, Value> = BTreeMap::new();
            for v in elements {
                let key = f(&v)
                    .and_then(|k| k.as_group_key().map_err(PipeError::from))
                    .map_err(|e| e.at_stage(kind.name(), pos))?;
                match groups.entry(key).or_insert_with(|| Value::List(Vec::new())) {
                    Value::List(items) => items.push(v),
                    _ => unreachable!("group entries are always lists"),
                }
            }
            Ok(Flow::Scalar(Value::Record(groups)))
        }

        StageKind::Window => {
            let n = expect_count(&stage.op, kind, pos)?;
            if n == 0 {
                return Err(
                    PipeError::InvalidFlow("window width must be positive".to_string())
                        .at_stage(kind.name(), pos),
                );
            }
            let elements = into_elements(flow, kind, pos)?;
            let windows: Vec<Value> = elements
                .windows(n)
                .map(|w| Value::List(w.to_vec()))
                .collect();
            Ok(Flow::Seq(Box::new(windows.into_iter().map(Ok))))
        }

        StageKind::Unique => {
            let elements = into_elements(flow, kind, pos)?;
            let mut seen: Vec<Value> = Vec::new();
            for v in elements {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
            Ok(Flow::Seq(Box::new(seen.into_iter().map(Ok))))
        }

        StageKind::Reverse => {
            let mut elements = into_elements(flow, kind, pos)?;
            elements.reverse();
            Ok(Flow::Seq(Box::new(elements.into_iter().map(Ok))))
        }

        StageKind::Aggregate => {
            let StageOp::Aggregate(op) = &stage.op else {
                return Err(bad_payload(kind, pos));
            };
            if !op.is_fold() {
                return Err(bad_payload(kind, pos));
            }
            let data = into_elements(flow, kind, pos)?;
            let result = execute_fold(registry, *op, &data, stage)
                .map_err(|e| attach_unless_dispatch(e, kind, pos))?;
            Ok(Flow::Scalar(result))
        }

        StageKind::Bitwise => {
            let StageOp::Elementwise { op, operand } = &stage.op else {
                return Err(bad_payload(kind, pos));
            };
            if op.is_fold() {
                return Err(bad_payload(kind, pos));
            }
            if op.takes_operand() && operand.is_none() {
                return Err(PipeError::InvalidFlow(format!(
                    "`{}` requires an operand",
                    op.name()
                ))
                .at_stage(kind.name(), pos));
            }
            let data = into_elements(flow, kind, pos)?;
            let out = execute_map(registry, *op, &data, operand.as_ref(), stage)
                .map_err(|e| attach_unless_dispatch(e, kind, pos))?;
            Ok(Flow::Seq(Box::new(out.into_iter().map(Ok))))
        }
    }
}

/// Dispatch and execute an aggregate over materialized elements.
fn execute_fold(
    registry: &Rc<RefCell<Registry>>,
    op: Op,
    data: &[Value],
    stage: &Stage,
) -> Result<Value, PipeError> {
    let reg = registry.borrow();
    match dispatch::resolve(&reg, op, data.len(), &stage.hint)? {
        Resolution::Reference => reference::fold(op, data),
        Resolution::Accelerator(accel) => accel.fold(op, data),
    }
}

/// Dispatch and execute an elementwise op over materialized elements.
fn execute_map(
    registry: &Rc<RefCell<Registry>>,
    op: Op,
    data: &[Value],
    operand: Option<&Value>,
    stage: &Stage,
) -> Result<Vec<Value>, PipeError> {
    let reg = registry.borrow();
    match dispatch::resolve(&reg, op, data.len(), &stage.hint)? {
        Resolution::Reference => reference::map(op, data, operand),
        Resolution::Accelerator(accel) => accel.map(op, data, operand),
    }
}

/// Dispatch-time errors (explicit force of an unusable backend) surface
/// as-is; execution failures get stage context.
fn attach_unless_dispatch(e: PipeError, kind: StageKind, pos: usize) -> PipeError {
    match e {
        dispatch_err @ PipeError::BackendUnavailable { .. } => dispatch_err,
        other => other.at_stage(kind.name(), pos),
    }
}

/// Lift the stage's operation payload into a per-value function.
fn as_value_fn(op: &StageOp, kind: StageKind, pos: usize) -> Result<ValueFn, PipeError> {
    match op {
        StageOp::Expr(expr) => {
            let expr = expr.clone();
            Ok(Rc::new(move |v: &Value| {
                expr.eval(v).map_err(PipeError::from)
            }))
        }
        StageOp::Func(f) => Ok(Rc::clone(f)),
        _ => Err(bad_payload(kind, pos)),
    }
}

fn expect_count(op: &StageOp, kind: StageKind, pos: usize) -> Result<usize, PipeError> {
    match op {
        StageOp::Count(n) => Ok(*n),
        _ => Err(bad_payload(kind, pos)),
    }
}

fn expect_seq(flow: Flow, kind: StageKind, pos: usize) -> Result<ValueIter, PipeError> {
    match flow {
        Flow::Seq(it) => Ok(it),
        Flow::Scalar(Value::List(items)) => Ok(Box::new(items.into_iter().map(Ok))),
        Flow::Scalar(other) => Err(PipeError::InvalidFlow(format!(
            "{} requires a sequence, the flow is a scalar {}",
            kind.name(),
            other.type_name()
        ))
        .at_stage(kind.name(), pos)),
    }
}

fn bad_payload(kind: StageKind, pos: usize) -> PipeError {
    PipeError::InvalidFlow(format!("invalid operation payload for {}", kind.name()))
        .at_stage(kind.name(), pos)
}

/// Materialize the current flow into concrete elements.
fn into_elements(flow: Flow, kind: StageKind, pos: usize) -> Result<Vec<Value>, PipeError> {
    match expect_seq(flow, kind, pos) {
        Ok(it) => it.collect(),
        Err(e) => Err(e),
    }
}

/// Materialize the current flow into a single value.
pub(crate) fn into_value(flow: Flow) -> Result<Value, PipeError> {
    match flow {
        Flow::Seq(it) => Ok(Value::List(it.collect::<Result<Vec<_>, _>>()?)),
        Flow::Scalar(v) => Ok(v),
    }
}

/// Sort keys must be mutually comparable: all numeric, all strings, or all
/// bools. Mixed kinds are an error, not a silent partial order.
enum SortKey {
    Num(f64),
    Text(String),
    Flag(bool),
}

impl SortKey {
    fn of(v: &Value) -> Result<SortKey, PipeError> {
        match v {
            Value::Int(i) => Ok(SortKey::Num(*i as f64)),
            Value::Float(f) => Ok(SortKey::Num(*f)),
            Value::Str(s) => Ok(SortKey::Text(s.clone())),
            Value::Bool(b) => Ok(SortKey::Flag(*b)),
            other => Err(PipeError::InvalidFlow(format!(
                "cannot sort by a {} key",
                other.type_name()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SortKey::Num(_) => "numeric",
            SortKey::Text(_) => "string",
            SortKey::Flag(_) => "bool",
        }
    }

    fn cmp(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Num(a), SortKey::Num(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Flag(a), SortKey::Flag(b)) => a.cmp(b),
            // Unreachable after homogeneity validation
            _ => Ordering::Equal,
        }
    }
}

fn sort_elements(
    elements: Vec<Value>,
    key: Option<&crate::expr::Expr>,
    descending: bool,
) -> Result<Vec<Value>, PipeError> {
    let mut keyed = Vec::with_capacity(elements.len());
    for v in elements {
        let key_value = match key {
            Some(expr) => expr.eval(&v)?,
            None => v.clone(),
        };
        keyed.push((SortKey::of(&key_value)?, v));
    }
    if let Some((first, _)) = keyed.first() {
        let kind = first.kind();
        if let Some((bad, _)) = keyed.iter().find(|(k, _)| k.kind() != kind) {
            return Err(PipeError::InvalidFlow(format!(
                "sort keys must be mutually comparable ({kind} vs {})",
                bad.kind()
            )));
        }
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    if descending {
        keyed.reverse();
    }
    Ok(keyed.into_iter().map(|(_, v)| v).collect())
}
