//! Backend control tour: thresholds, forcing, and custom accelerators.
//!
//! Run with: cargo run --example backend_control
//! Set RUST_LOG=debug to watch every dispatch decision.

use pipewise::backend::reference;
use pipewise::{pipe, Accelerator, BackendHint, Op, PipeError, Value};

/// A user-supplied accelerator: announces itself, then delegates to the
/// reference implementation.
struct Announcer;

impl Accelerator for Announcer {
    fn name(&self) -> &'static str {
        "announcer"
    }
    fn probe(&self) -> bool {
        true
    }
    fn supports(&self, op: Op) -> bool {
        matches!(op, Op::Sum | Op::Mean)
    }
    fn fold(&self, op: Op, data: &[Value]) -> Result<Value, PipeError> {
        println!("  [announcer] folding {} over {} elements", op.name(), data.len());
        reference::fold(op, data)
    }
    fn map(
        &self,
        op: Op,
        data: &[Value],
        operand: Option<&Value>,
    ) -> Result<Vec<Value>, PipeError> {
        reference::map(op, data, operand)
    }
}

fn main() -> Result<(), PipeError> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let data: Vec<i64> = (0..1000).collect();

    // Auto dispatch: the stock registry accelerates sums at >= 500 elements.
    let auto = pipe(data.clone()).sum();
    println!("auto sum        = {}", auto.get()?);

    // Per-stage hints override the policy for one stage only.
    let forced_ref = pipe(data.clone()).sum().via(BackendHint::ForceReference);
    println!("reference sum   = {}", forced_ref.get()?);

    let forced_chunked = pipe(data.clone())
        .sum()
        .via(BackendHint::ForceBackend("chunked".into()));
    println!("chunked sum     = {}", forced_chunked.get()?);

    // Forcing never falls back: chunked has no bitwise support.
    let bad = pipe(data.clone())
        .bitwise_and(0xFFi64)
        .via(BackendHint::ForceBackend("chunked".into()));
    match bad.to_list() {
        Err(PipeError::BackendUnavailable { backend, op }) => {
            println!("forced miss     = {backend} cannot serve {op} (no fallback)");
        }
        other => println!("unexpected: {other:?}"),
    }

    // Registry mutation applies at evaluation time; the pipeline holds a
    // handle, not a snapshot.
    let tiny = pipe([1i64, 2, 3]).sum();
    tiny.registry().borrow_mut().set_threshold("chunked", 1);
    println!("tiny sum        = {} (threshold lowered to 1)", tiny.get()?);

    // Register a custom backend: it auto-activates for the families it
    // supports, and the threshold decides when it actually runs.
    let custom = pipe(data).mean();
    custom
        .registry()
        .borrow_mut()
        .register(Box::new(Announcer), 100);
    println!("custom mean     = {}", custom.get()?);

    // Disable it again: dispatch quietly returns to the previous behavior.
    custom.registry().borrow_mut().disable("announcer");
    println!("after disable   = {}", custom.get()?);

    Ok(())
}
