//! Quickstart tour: deferred expressions and lazy pipelines.
//!
//! Run with: cargo run --example quickstart

use pipewise::{arg, pipe, PipeError, Pipe, Value};

fn main() -> Result<(), PipeError> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Deferred expressions: nothing here computes anything yet.
    let double_then_square = arg() * 2 >> arg().pow(2);
    println!("3 doubled then squared = {}", double_then_square.eval(&Value::Int(3))?);

    // A pipeline is a recorded recipe; the terminal call runs it.
    let scaled = pipe([1i64, 2, 3, 4, 5, 6])
        .filter(arg().gt(2))
        .map(arg() * 10)
        .to_list()?;
    println!("filtered and scaled: {:?}", scaled);

    // Collection pipelines are repeatable.
    let stats = pipe([4i64, 8, 15, 16, 23, 42]);
    println!("sum    = {}", stats.clone().sum().get()?);
    println!("mean   = {}", stats.clone().mean().get()?);
    println!("median = {}", stats.median().get()?);

    // Strings flow through the same machinery.
    let cleaned = Pipe::value("  grace hopper  ")
        .apply(arg().strip().title())
        .get()?;
    println!("cleaned: {cleaned}");

    // Records with key access, sorting, grouping.
    let people = vec![
        Value::record([("name", Value::from("carol")), ("age", Value::Int(41))]),
        Value::record([("name", Value::from("alice")), ("age", Value::Int(34))]),
        Value::record([("name", Value::from("bob")), ("age", Value::Int(27))]),
    ];
    let thirty_plus = pipe(people)
        .filter(arg().key("age").ge(30))
        .sort_by(arg().key("name"))
        .map(arg().key("name").title())
        .to_list()?;
    println!("thirty plus: {:?}", thirty_plus);

    // Infinite sources stay cheap as long as something bounds them.
    let first_squares = Pipe::counter(1).map(arg().pow(2)).take(5).to_list()?;
    println!("first squares: {:?}", first_squares);

    Ok(())
}
