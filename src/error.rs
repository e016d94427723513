//! Error taxonomy
//!
//! Every error aborts the current terminal evaluation; nothing here is
//! retried or silently recovered. The Auto dispatch fallback (accelerator
//! below threshold or unavailable) is a designed decision path, not error
//! recovery, and never surfaces through these types.

use thiserror::Error;

/// Replaying a recorded expression against a value failed.
#[derive(Debug, Error)]
pub enum ExprError {
    /// The recorded operator has no meaning for the runtime type it met.
    #[error("operation `{op}` is not supported for {type_name}")]
    Unsupported { op: String, type_name: &'static str },

    /// A recorded method name is unknown for the value's runtime type.
    #[error("unknown method `{name}` on {type_name}")]
    UnknownMethod { name: String, type_name: &'static str },

    #[error("key `{key}` not present in record")]
    KeyNotFound { key: String },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    /// A deferred expression was used where a concrete value is required,
    /// e.g. as a template interpolation target. The outermost recorded
    /// operation is named so the offending expression can be located.
    #[error("deferred expression (outermost op `{op}`) used where a concrete value is required")]
    DeferredWhereConcrete { op: String },

    /// The external template collaborator reported a render failure.
    #[error("template render failed: {0}")]
    Render(String),
}

/// Pipeline-level errors, terminal for the current evaluation call.
#[derive(Debug, Error)]
pub enum PipeError {
    /// A stage's operation failed while processing an element. Carries the
    /// stage kind and 0-based position so the failing stage is identifiable.
    #[error("stage {position} ({kind}): {source}")]
    StageExecution {
        kind: &'static str,
        position: usize,
        #[source]
        source: Box<PipeError>,
    },

    /// An explicit force named a backend that is unavailable or does not
    /// support the requested operation. Never silently degraded.
    #[error("backend `{backend}` unavailable for operation `{op}`")]
    BackendUnavailable { backend: String, op: String },

    #[error(transparent)]
    Expr(#[from] ExprError),

    /// A single-pass source was evaluated a second time.
    #[error("single-pass source already consumed")]
    SourceExhausted,

    /// A stage was applied to a flow shape it cannot handle
    /// (e.g. a sequence stage on a scalar flow).
    #[error("{0}")]
    InvalidFlow(String),
}

impl PipeError {
    /// Wrap an error with the failing stage's identity. Already-attributed
    /// errors keep their original (innermost) stage context.
    pub(crate) fn at_stage(self, kind: &'static str, position: usize) -> PipeError {
        match self {
            already @ PipeError::StageExecution { .. } => already,
            other => PipeError::StageExecution {
                kind,
                position,
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_context_attached_once() {
        let inner = PipeError::Expr(ExprError::DivisionByZero);
        let wrapped = inner.at_stage("map", 2).at_stage("filter", 5);
        match wrapped {
            PipeError::StageExecution { kind, position, .. } => {
                assert_eq!(kind, "map");
                assert_eq!(position, 2);
            }
            other => panic!("expected StageExecution, got {other:?}"),
        }
    }

    #[test]
    fn test_messages_name_the_offender() {
        let e = ExprError::UnknownMethod {
            name: "strip".to_string(),
            type_name: "int",
        };
        assert_eq!(e.to_string(), "unknown method `strip` on int");

        let e = PipeError::BackendUnavailable {
            backend: "chunked".to_string(),
            op: "median".to_string(),
        };
        assert!(e.to_string().contains("chunked"));
        assert!(e.to_string().contains("median"));
    }
}
