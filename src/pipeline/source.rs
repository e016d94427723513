//! Pipeline sources
//!
//! A source produces the initial flow for each terminal evaluation.
//! Collection-backed sources are restartable: every evaluation re-derives
//! from the owned values. Iterator-backed sources are single-pass and fail
//! with `SourceExhausted` on a second evaluation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::PipeError;
use crate::value::Value;

/// Where a pipeline's elements come from
#[derive(Clone)]
pub enum Source {
    /// Restartable, collection-backed sequence
    Collection(Rc<Vec<Value>>),
    /// Single-pass iterator; consumed by the first evaluation
    SinglePass(Rc<RefCell<Option<Box<dyn Iterator<Item = Value>>>>>),
    /// Infinite counter starting at the given value (bound it with `take`)
    Counter(i64),
    /// A single scalar value (string pipelines, post-aggregate seeding)
    Scalar(Value),
}

/// A freshly opened source for one evaluation
pub(crate) enum Opened {
    Seq(Box<dyn Iterator<Item = Value>>),
    Scalar(Value),
}

impl Source {
    pub fn from_values(values: Vec<Value>) -> Self {
        Source::Collection(Rc::new(values))
    }

    pub fn single_pass(iter: impl Iterator<Item = Value> + 'static) -> Self {
        Source::SinglePass(Rc::new(RefCell::new(Some(Box::new(iter)))))
    }

    /// Open the source for one evaluation pass.
    pub(crate) fn open(&self) -> Result<Opened, PipeError> {
        match self {
            Source::Collection(values) => {
                let values = Rc::clone(values);
                let len = values.len();
                Ok(Opened::Seq(Box::new(
                    (0..len).map(move |i| values[i].clone()),
                )))
            }
            Source::SinglePass(cell) => match cell.borrow_mut().take() {
                Some(iter) => Ok(Opened::Seq(iter)),
                None => Err(PipeError::SourceExhausted),
            },
            Source::Counter(start) => {
                let start = *start;
                Ok(Opened::Seq(Box::new((start..).map(Value::Int))))
            }
            Source::Scalar(v) => Ok(Opened::Scalar(v.clone())),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Collection(v) => f.debug_tuple("Collection").field(&v.len()).finish(),
            Source::SinglePass(_) => f.write_str("SinglePass(..)"),
            Source::Counter(start) => f.debug_tuple("Counter").field(start).finish(),
            Source::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_is_restartable() {
        let src = Source::from_values(vec![Value::Int(1), Value::Int(2)]);
        for _ in 0..3 {
            match src.open().unwrap() {
                Opened::Seq(it) => assert_eq!(it.count(), 2),
                Opened::Scalar(_) => panic!("expected sequence"),
            }
        }
    }

    #[test]
    fn test_single_pass_exhausts() {
        let src = Source::single_pass((0..3).map(Value::Int));
        assert!(src.open().is_ok());
        match src.open() {
            Err(PipeError::SourceExhausted) => {}
            other => panic!("expected SourceExhausted, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_counter_is_lazy_and_infinite() {
        let src = Source::Counter(5);
        match src.open().unwrap() {
            Opened::Seq(it) => {
                let first: Vec<Value> = it.take(3).collect();
                assert_eq!(first, vec![Value::Int(5), Value::Int(6), Value::Int(7)]);
            }
            Opened::Scalar(_) => panic!("expected sequence"),
        }
    }
}
