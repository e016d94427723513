//! Pipeline builder and terminals
//!
//! `Pipe` is a builder: every method appends one stage descriptor and
//! performs zero element processing. Terminal calls (`get`, `to_list`)
//! replay the stage list against the source; collection-backed pipelines
//! can be evaluated any number of times.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{BackendHint, Op, Registry};
use crate::error::PipeError;
use crate::expr::Expr;
use crate::value::Value;

use super::exec::{self, Flow};
use super::source::Source;
use super::stage::{Stage, StageKind, StageOp};

/// Build a pipeline over a collection of values.
///
/// ```
/// use pipewise::{pipe, arg, Value};
///
/// let out = pipe([1i64, 2, 3, 4, 5])
///     .filter(arg().gt(2))
///     .map(arg() * 10)
///     .to_list()
///     .unwrap();
/// assert_eq!(out, vec![Value::Int(30), Value::Int(40), Value::Int(50)]);
/// ```
pub fn pipe<I, T>(values: I) -> Pipe
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    Pipe::new(Source::from_values(
        values.into_iter().map(Into::into).collect(),
    ))
}

/// A lazily-evaluated pipeline: a source plus an ordered stage list.
#[derive(Clone)]
pub struct Pipe {
    source: Source,
    stages: Vec<Stage>,
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("source", &self.source)
            .field("stages", &self.stages)
            .finish()
    }
}

impl Pipe {
    /// Pipeline over an explicit source with the stock backend registry.
    pub fn new(source: Source) -> Self {
        Pipe {
            source,
            stages: Vec::new(),
            registry: Rc::new(RefCell::new(Registry::new())),
        }
    }

    /// Pipeline over a single scalar value.
    pub fn value(v: impl Into<Value>) -> Self {
        Pipe::new(Source::Scalar(v.into()))
    }

    /// Pipeline over a single-pass iterator; a second terminal call fails
    /// with [`PipeError::SourceExhausted`].
    pub fn once(iter: impl Iterator<Item = Value> + 'static) -> Self {
        Pipe::new(Source::single_pass(iter))
    }

    /// Pipeline over the infinite sequence `start, start+1, ...`.
    /// Bound it with [`take`](Pipe::take).
    pub fn counter(start: i64) -> Self {
        Pipe::new(Source::Counter(start))
    }

    /// Share a backend registry with this pipeline. Mutations through the
    /// handle take effect at evaluation time; nothing is snapshotted.
    pub fn with_registry(mut self, registry: Rc<RefCell<Registry>>) -> Self {
        self.registry = registry;
        self
    }

    /// Handle to this pipeline's registry, for threshold/enable/force
    /// configuration.
    pub fn registry(&self) -> Rc<RefCell<Registry>> {
        Rc::clone(&self.registry)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    // ---- streaming stages ----

    /// Transform each element with a deferred expression.
    pub fn map(self, expr: Expr) -> Self {
        self.push(Stage::new(StageKind::Map, StageOp::Expr(expr)))
    }

    /// Transform each element with an external function.
    pub fn map_fn(self, f: impl Fn(&Value) -> Result<Value, PipeError> + 'static) -> Self {
        self.push(Stage::new(StageKind::Map, StageOp::Func(Rc::new(f))))
    }

    /// Keep elements for which the expression is truthy.
    pub fn filter(self, expr: Expr) -> Self {
        self.push(Stage::new(StageKind::Filter, StageOp::Expr(expr)))
    }

    pub fn filter_fn(self, f: impl Fn(&Value) -> Result<Value, PipeError> + 'static) -> Self {
        self.push(Stage::new(StageKind::Filter, StageOp::Func(Rc::new(f))))
    }

    /// Pull at most `n` elements from upstream.
    pub fn take(self, n: usize) -> Self {
        self.push(Stage::new(StageKind::Take, StageOp::Count(n)))
    }

    pub fn skip(self, n: usize) -> Self {
        self.push(Stage::new(StageKind::Skip, StageOp::Count(n)))
    }

    /// Observe each element exactly once as it is pulled, in this stage's
    /// declared position, without changing it.
    pub fn inspect(self, f: impl Fn(&Value) + 'static) -> Self {
        self.push(Stage::new(StageKind::SideEffect, StageOp::Observe(Rc::new(f))))
    }

    /// Log each element under the given label as it is pulled.
    pub fn debug(self, label: &str) -> Self {
        self.push(Stage::new(
            StageKind::Debug,
            StageOp::Label(label.to_string()),
        ))
    }

    /// Splice list elements into the stream.
    pub fn flatten(self) -> Self {
        self.push(Stage::new(StageKind::Flatten, StageOp::None))
    }

    /// Render each element through the external template collaborator.
    pub fn render(self, f: impl Fn(&Value) -> Result<Value, PipeError> + 'static) -> Self {
        self.push(Stage::new(StageKind::Template, StageOp::Func(Rc::new(f))))
    }

    // ---- materializing stages ----

    /// Sort elements by their own value, ascending.
    pub fn sort(self) -> Self {
        self.push(Stage::new(
            StageKind::Sort,
            StageOp::SortSpec { key: None, descending: false },
        ))
    }

    pub fn sort_desc(self) -> Self {
        self.push(Stage::new(
            StageKind::Sort,
            StageOp::SortSpec { key: None, descending: true },
        ))
    }

    /// Sort elements by a key expression, ascending.
    pub fn sort_by(self, key: Expr) -> Self {
        self.push(Stage::new(
            StageKind::Sort,
            StageOp::SortSpec { key: Some(key), descending: false },
        ))
    }

    pub fn sort_by_desc(self, key: Expr) -> Self {
        self.push(Stage::new(
            StageKind::Sort,
            StageOp::SortSpec { key: Some(key), descending: true },
        ))
    }

    /// Group elements by a key expression into a record of lists. The flow
    /// becomes a scalar record.
    pub fn group_by(self, key: Expr) -> Self {
        self.push(Stage::new(StageKind::GroupBy, StageOp::Expr(key)))
    }

    /// Sliding windows of width `n`, each a list.
    pub fn window(self, n: usize) -> Self {
        self.push(Stage::new(StageKind::Window, StageOp::Count(n)))
    }

    /// Drop duplicate elements, keeping first occurrences.
    pub fn unique(self) -> Self {
        self.push(Stage::new(StageKind::Unique, StageOp::None))
    }

    pub fn reverse(self) -> Self {
        self.push(Stage::new(StageKind::Reverse, StageOp::None))
    }

    /// Transform the whole current value (sequence or scalar) at once.
    pub fn apply(self, expr: Expr) -> Self {
        self.push(Stage::new(StageKind::Apply, StageOp::Expr(expr)))
    }

    // ---- backend-eligible stages ----

    /// Append an aggregate stage. The dispatcher picks the implementation
    /// at evaluation time from the materialized element count.
    pub fn aggregate(self, op: Op) -> Self {
        self.push(Stage::new(StageKind::Aggregate, StageOp::Aggregate(op)))
    }

    pub fn sum(self) -> Self {
        self.aggregate(Op::Sum)
    }

    pub fn mean(self) -> Self {
        self.aggregate(Op::Mean)
    }

    pub fn min(self) -> Self {
        self.aggregate(Op::Min)
    }

    pub fn max(self) -> Self {
        self.aggregate(Op::Max)
    }

    pub fn median(self) -> Self {
        self.aggregate(Op::Median)
    }

    pub fn stdev(self) -> Self {
        self.aggregate(Op::Stdev)
    }

    fn elementwise(self, op: Op, operand: Option<Value>) -> Self {
        self.push(Stage::new(
            StageKind::Bitwise,
            StageOp::Elementwise { op, operand },
        ))
    }

    /// AND every element with the operand.
    pub fn bitwise_and(self, operand: impl Into<Value>) -> Self {
        self.elementwise(Op::BitwiseAnd, Some(operand.into()))
    }

    pub fn bitwise_or(self, operand: impl Into<Value>) -> Self {
        self.elementwise(Op::BitwiseOr, Some(operand.into()))
    }

    pub fn bitwise_xor(self, operand: impl Into<Value>) -> Self {
        self.elementwise(Op::BitwiseXor, Some(operand.into()))
    }

    pub fn bitwise_not(self) -> Self {
        self.elementwise(Op::BitwiseNot, None)
    }

    pub fn left_shift(self, bits: impl Into<Value>) -> Self {
        self.elementwise(Op::LeftShift, Some(bits.into()))
    }

    pub fn right_shift(self, bits: impl Into<Value>) -> Self {
        self.elementwise(Op::RightShift, Some(bits.into()))
    }

    /// Override the backend hint of the most recently appended stage.
    /// No effect on an empty pipeline.
    pub fn via(mut self, hint: BackendHint) -> Self {
        if let Some(stage) = self.stages.last_mut() {
            stage.hint = hint;
        }
        self
    }

    // ---- terminals ----

    /// Evaluate and return the current value: the aggregate result for
    /// scalar flows, otherwise the materialized sequence as a list.
    pub fn get(&self) -> Result<Value, PipeError> {
        let flow = exec::run(&self.source, &self.stages, &self.registry)?;
        exec::into_value(flow)
    }

    /// Evaluate and return a concrete ordered collection. A scalar list
    /// flow yields its items; any other scalar yields a one-element list.
    pub fn to_list(&self) -> Result<Vec<Value>, PipeError> {
        let flow = exec::run(&self.source, &self.stages, &self.registry)?;
        match flow {
            Flow::Seq(it) => it.collect(),
            Flow::Scalar(Value::List(items)) => Ok(items),
            Flow::Scalar(other) => Ok(vec![other]),
        }
    }

    /// Evaluate and seed a new pipeline from the result, sharing this
    /// pipeline's registry. Stages added afterwards never mutate this
    /// pipeline's history.
    pub fn collect_into_pipe(&self) -> Result<Pipe, PipeError> {
        let result = self.get()?;
        let source = match result {
            Value::List(items) => Source::from_values(items),
            scalar => Source::Scalar(scalar),
        };
        Ok(Pipe {
            source,
            stages: Vec::new(),
            registry: Rc::clone(&self.registry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::arg;
    use std::cell::Cell;

    #[test]
    fn test_building_performs_no_processing() {
        let pulled = Rc::new(Cell::new(0usize));
        let observer = Rc::clone(&pulled);
        let p = pipe([1i64, 2, 3])
            .inspect(move |_| observer.set(observer.get() + 1))
            .map(arg() * 2)
            .filter(arg().gt(2));
        assert_eq!(p.stage_count(), 3);
        assert_eq!(pulled.get(), 0, "no element processing before a terminal");

        p.to_list().unwrap();
        assert_eq!(pulled.get(), 3);
    }

    #[test]
    fn test_terminals_are_repeatable_on_collections() {
        let p = pipe([1i64, 2, 3]).map(arg() + 1);
        assert_eq!(p.get().unwrap(), Value::list([2i64, 3, 4]));
        assert_eq!(p.get().unwrap(), Value::list([2i64, 3, 4]));
    }

    #[test]
    fn test_single_pass_source_exhausts() {
        let p = Pipe::once((0..3).map(Value::Int)).map(arg() + 1);
        assert!(p.to_list().is_ok());
        assert!(matches!(p.to_list(), Err(PipeError::SourceExhausted)));
    }

    #[test]
    fn test_scalar_pipeline() {
        let result = Pipe::value("  hello world  ")
            .apply(arg().strip().title())
            .get()
            .unwrap();
        assert_eq!(result, Value::from("Hello World"));
    }

    #[test]
    fn test_aggregate_then_apply() {
        let result = pipe([1i64, 2, 3, 4, 5]).sum().apply(arg() * 2).get().unwrap();
        assert_eq!(result, Value::Int(30));
    }

    #[test]
    fn test_collect_into_pipe_starts_fresh_history() {
        let first = pipe([3i64, 1, 2]).sort();
        let second = first.collect_into_pipe().unwrap().map(arg() * 10);
        assert_eq!(
            second.to_list().unwrap(),
            vec![Value::Int(10), Value::Int(20), Value::Int(30)]
        );
        // the original pipeline is untouched
        assert_eq!(first.stage_count(), 1);
    }

    #[test]
    fn test_via_overrides_last_stage_hint() {
        let p = pipe([1i64]).sum().via(BackendHint::ForceReference);
        assert_eq!(p.get().unwrap(), Value::Int(1));
    }
}
