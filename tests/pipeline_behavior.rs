//! End-to-end pipeline behavior
//!
//! Exercises the observable contract of the builder: laziness, bounded
//! upstream pulls under `take`, side-effect ordering, deferred expressions
//! flowing through stages, and materializing stages over realistic data.

use std::cell::RefCell;
use std::rc::Rc;

use pipewise::{arg, pipe, PipeError, Pipe, StageKind, Value};

#[test]
fn test_no_processing_until_terminal() {
    let pulled = Rc::new(RefCell::new(0usize));
    let observer = Rc::clone(&pulled);

    let p = pipe([1i64, 2, 3, 4, 5])
        .inspect(move |_| *observer.borrow_mut() += 1)
        .map(arg() * 2)
        .filter(arg().gt(4));

    assert_eq!(*pulled.borrow(), 0, "building must touch no elements");

    let out = p.to_list().unwrap();
    assert_eq!(out, vec![Value::Int(6), Value::Int(8), Value::Int(10)]);
    assert_eq!(*pulled.borrow(), 5, "each element observed exactly once");
}

#[test]
fn test_take_bounds_upstream_pulls() {
    let pulled = Rc::new(RefCell::new(0usize));
    let observer = Rc::clone(&pulled);

    // odds from an infinite counter: (n//2)*2 - n is -1 (truthy) for odd n,
    // 0 (falsy) for even n; the first five odds require pulling 0..=9
    let out = Pipe::counter(0)
        .inspect(move |_| *observer.borrow_mut() += 1)
        .filter(arg().floor_div(2) * 2 - arg())
        .take(5)
        .to_list()
        .unwrap();
    assert_eq!(
        out,
        vec![
            Value::Int(1),
            Value::Int(3),
            Value::Int(5),
            Value::Int(7),
            Value::Int(9)
        ]
    );
    assert_eq!(*pulled.borrow(), 10, "take(5) must stop pulling after the fifth match");
}

#[test]
fn test_side_effects_fire_in_stage_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let observer = Rc::clone(&seen);

    let out = pipe([1i64, 2, 3])
        .map(arg() * 2)
        .inspect(move |v| observer.borrow_mut().push(v.clone()))
        .filter(arg().gt(2))
        .to_list()
        .unwrap();

    // observer sits after the map, before the filter: it sees every
    // doubled element, including the one the filter later drops
    assert_eq!(
        *seen.borrow(),
        vec![Value::Int(2), Value::Int(4), Value::Int(6)]
    );
    assert_eq!(out, vec![Value::Int(4), Value::Int(6)]);
}

#[test]
fn test_composed_expression_in_map() {
    // double, then square: 3 -> 6 -> 36
    let out = pipe([3i64])
        .map(arg() * 2 >> arg().pow(2))
        .to_list()
        .unwrap();
    assert_eq!(out, vec![Value::Int(36)]);
}

#[test]
fn test_record_pipeline() {
    let people = vec![
        Value::record([("name", Value::from("carol")), ("age", Value::Int(41))]),
        Value::record([("name", Value::from("alice")), ("age", Value::Int(34))]),
        Value::record([("name", Value::from("bob")), ("age", Value::Int(27))]),
    ];

    let names = pipe(people.clone())
        .filter(arg().key("age").ge(30))
        .sort_by(arg().key("name"))
        .map(arg().key("name").title())
        .to_list()
        .unwrap();
    assert_eq!(names, vec![Value::from("Alice"), Value::from("Carol")]);

    // group_by turns the flow into a scalar record
    let grouped = pipe(people)
        .group_by(arg().key("age").ge(30))
        .get()
        .unwrap();
    match grouped {
        Value::Record(groups) => {
            assert_eq!(groups.len(), 2);
            assert!(groups.contains_key("true"));
            assert!(groups.contains_key("false"));
        }
        other => panic!("expected record, got {other:?}"),
    }
}

#[test]
fn test_string_method_chain() {
    let out = pipe(["  ada lovelace ", "alan turing"])
        .map(arg().strip().title())
        .to_list()
        .unwrap();
    assert_eq!(
        out,
        vec![Value::from("Ada Lovelace"), Value::from("Alan Turing")]
    );
}

#[test]
fn test_window_unique_flatten() {
    let windows = pipe([1i64, 2, 3, 4]).window(2).to_list().unwrap();
    assert_eq!(windows.len(), 3);
    assert_eq!(windows[0], Value::list([1i64, 2]));
    assert_eq!(windows[2], Value::list([3i64, 4]));

    let uniq = pipe([3i64, 1, 3, 2, 1]).unique().to_list().unwrap();
    assert_eq!(uniq, vec![Value::Int(3), Value::Int(1), Value::Int(2)]);

    let flat = pipe([Value::list([1i64, 2]), Value::list([3i64])])
        .flatten()
        .to_list()
        .unwrap();
    assert_eq!(flat, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn test_skip_and_reverse() {
    let out = pipe([1i64, 2, 3, 4, 5])
        .skip(2)
        .reverse()
        .to_list()
        .unwrap();
    assert_eq!(out, vec![Value::Int(5), Value::Int(4), Value::Int(3)]);
}

#[test]
fn test_template_stage() {
    // the template collaborator is an injected renderer, not a format string
    let out = pipe([Value::record([("name", Value::from("ada"))])])
        .render(|v| {
            let name = match v {
                Value::Record(fields) => fields.get("name").cloned().unwrap_or(Value::Unit),
                other => other.clone(),
            };
            Ok(Value::from(format!("hello, {name}")))
        })
        .to_list()
        .unwrap();
    assert_eq!(out, vec![Value::from("hello, ada")]);
}

#[test]
fn test_template_failure_aborts_evaluation() {
    let err = pipe([Value::Int(1)])
        .render(|_| {
            Err(pipewise::ExprError::Render("missing placeholder".to_string()).into())
        })
        .to_list()
        .unwrap_err();
    assert!(err.to_string().contains("template render failed"));
}

#[test]
fn test_errors_name_the_failing_stage() {
    let err = pipe(["x"])
        .map(arg() * 2)
        .map(arg() + 1) // Str + Int: unsupported
        .to_list()
        .unwrap_err();
    match err {
        PipeError::StageExecution { kind, position, .. } => {
            assert_eq!(kind, StageKind::Map.name());
            assert_eq!(position, 1);
        }
        other => panic!("expected StageExecution, got {other:?}"),
    }
}

#[test]
fn test_debug_stage_is_transparent() {
    let out = pipe([1i64, 2])
        .debug("probe")
        .map(arg() + 1)
        .to_list()
        .unwrap();
    assert_eq!(out, vec![Value::Int(2), Value::Int(3)]);
}

#[test]
fn test_single_pass_source_consumed_once() {
    let p = Pipe::once((1..=3).map(Value::Int)).sum();
    assert_eq!(p.get().unwrap(), Value::Int(6));
    assert!(matches!(p.get(), Err(PipeError::SourceExhausted)));
}

#[test]
fn test_scalar_value_pipeline() {
    let out = Pipe::value("  lazy pipelines  ")
        .apply(arg().strip().upper())
        .get()
        .unwrap();
    assert_eq!(out, Value::from("LAZY PIPELINES"));
}

#[test]
fn test_aggregate_feeds_later_stages() {
    // terminal value of an aggregate is a scalar; apply keeps working on it
    let out = pipe([1i64, 2, 3, 4]).sum().apply(arg() * arg()).get().unwrap();
    assert_eq!(out, Value::Int(100));
}

#[test]
fn test_collect_into_pipe_keeps_registry() {
    let first = pipe([5i64, 3, 1]).sort();
    first.registry().borrow_mut().set_threshold("chunked", 2);
    let second = first.collect_into_pipe().unwrap().sum();
    // shared registry: the lowered threshold is visible downstream
    assert_eq!(second.registry().borrow().threshold("chunked"), Some(2));
    assert_eq!(second.get().unwrap(), Value::Int(9));
}
