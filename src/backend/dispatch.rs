//! Dispatch policy
//!
//! A pure decision function from (operation, element count, hint, registry
//! state) to an implementation. Computed fresh per stage execution; nothing
//! is cached or snapshotted, so registry mutation between construction and
//! evaluation changes behavior at evaluation time.

use crate::error::PipeError;

use super::op::Op;
use super::registry::{Accelerator, Registry};

/// Per-stage backend selection hint
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendHint {
    /// Threshold-based selection among available accelerators
    #[default]
    Auto,
    /// Use exactly this backend; error if it cannot serve the op
    ForceBackend(String),
    /// Bypass all accelerators and thresholds
    ForceReference,
}

/// Resolved implementation for one stage execution
pub enum Resolution<'a> {
    Reference,
    Accelerator(&'a dyn Accelerator),
}

impl std::fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Reference => f.write_str("Reference"),
            Resolution::Accelerator(acc) => {
                f.debug_tuple("Accelerator").field(&acc.name()).finish()
            }
        }
    }
}

impl Resolution<'_> {
    /// Name of the chosen implementation, for logging and tests
    pub fn chosen(&self) -> &str {
        match self {
            Resolution::Reference => "reference",
            Resolution::Accelerator(a) => a.name(),
        }
    }
}

/// Decide which implementation executes `op` over `element_count` elements.
///
/// - `ForceBackend` never silently falls back: an unavailable or
///   unsupporting backend is a [`PipeError::BackendUnavailable`].
/// - `ForceReference` bypasses everything.
/// - `Auto` consults the registry-wide force flag first, then the active
///   accelerator for the op's family against its threshold.
/// - With no registered/available accelerator, the reference implementation
///   is chosen; this path never errors.
pub fn resolve<'a>(
    registry: &'a Registry,
    op: Op,
    element_count: usize,
    hint: &BackendHint,
) -> Result<Resolution<'a>, PipeError> {
    let resolution = match hint {
        BackendHint::ForceBackend(name) => force(registry, name, op)?,
        BackendHint::ForceReference => Resolution::Reference,
        BackendHint::Auto => {
            if let Some(name) = registry.forced() {
                force(registry, name, op)?
            } else {
                match registry.active_for(op) {
                    Some((accel, threshold)) if element_count >= threshold => {
                        Resolution::Accelerator(accel)
                    }
                    _ => Resolution::Reference,
                }
            }
        }
    };
    tracing::debug!(
        op = op.name(),
        element_count,
        chosen = resolution.chosen(),
        "dispatch"
    );
    Ok(resolution)
}

fn force<'a>(registry: &'a Registry, name: &str, op: Op) -> Result<Resolution<'a>, PipeError> {
    registry
        .lookup(name, op)
        .map(Resolution::Accelerator)
        .ok_or_else(|| PipeError::BackendUnavailable {
            backend: name.to_string(),
            op: op.name().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_respects_threshold() {
        let mut reg = Registry::new();
        reg.set_threshold("chunked", 100);

        let below = resolve(&reg, Op::Sum, 99, &BackendHint::Auto).unwrap();
        assert_eq!(below.chosen(), "reference");

        let at = resolve(&reg, Op::Sum, 100, &BackendHint::Auto).unwrap();
        assert_eq!(at.chosen(), "chunked");
    }

    #[test]
    fn test_force_reference_ignores_thresholds() {
        let mut reg = Registry::new();
        reg.set_threshold("chunked", 0);
        let r = resolve(&reg, Op::Sum, 1_000_000, &BackendHint::ForceReference).unwrap();
        assert_eq!(r.chosen(), "reference");
    }

    #[test]
    fn test_force_backend_errors_instead_of_falling_back() {
        let reg = Registry::new();

        // chunked does not implement bitwise ops
        let err = resolve(
            &reg,
            Op::BitwiseAnd,
            10,
            &BackendHint::ForceBackend("chunked".to_string()),
        )
        .unwrap_err();
        match err {
            PipeError::BackendUnavailable { backend, op } => {
                assert_eq!(backend, "chunked");
                assert_eq!(op, "bitwise_and");
            }
            other => panic!("expected BackendUnavailable, got {other:?}"),
        }

        // unknown backend
        assert!(resolve(
            &reg,
            Op::Sum,
            10,
            &BackendHint::ForceBackend("nonesuch".to_string())
        )
        .is_err());
    }

    #[test]
    fn test_registry_force_flag_applies_to_auto() {
        let mut reg = Registry::new();
        reg.set_threshold("chunked", 1_000_000);
        reg.force("chunked");

        // Forced: threshold ignored even for tiny inputs
        let r = resolve(&reg, Op::Sum, 1, &BackendHint::Auto).unwrap();
        assert_eq!(r.chosen(), "chunked");

        // Forced backend that cannot serve the op errors, no fallback
        assert!(resolve(&reg, Op::BitwiseAnd, 1, &BackendHint::Auto).is_err());

        reg.clear_force();
        let r = resolve(&reg, Op::Sum, 1, &BackendHint::Auto).unwrap();
        assert_eq!(r.chosen(), "reference");
    }

    #[test]
    fn test_empty_registry_never_errors_on_auto() {
        let reg = Registry::empty();
        let r = resolve(&reg, Op::Median, 10_000, &BackendHint::Auto).unwrap();
        assert_eq!(r.chosen(), "reference");
    }
}
