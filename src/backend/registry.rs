//! Accelerator registry
//!
//! Holds the registered accelerators with their probe results (computed once
//! at registration, cached), per-backend thresholds, the active backend per
//! operation family, and the force flag. All mutation takes effect on the
//! next dispatch resolution; nothing is snapshotted into pipelines.

use std::collections::HashMap;

use crate::value::Value;
use crate::error::PipeError;

use super::bitblast::Bitblast;
use super::chunked::Chunked;
use super::op::{Op, OpFamily};

/// An interchangeable implementation of one or more operations.
///
/// Adapters are stateless pure functions over their inputs: no state is
/// retained between calls, so dispatch decisions interleave safely with
/// registry mutation between calls.
pub trait Accelerator {
    fn name(&self) -> &'static str;

    /// Availability check. Must not panic; a failed probe is recorded as
    /// unavailable, never surfaced to the caller.
    fn probe(&self) -> bool;

    fn supports(&self, op: Op) -> bool;

    /// Aggregate implementation; same input/output shape and numeric
    /// semantics as [`super::reference::fold`].
    fn fold(&self, op: Op, data: &[Value]) -> Result<Value, PipeError>;

    /// Elementwise implementation; same semantics as
    /// [`super::reference::map`].
    fn map(&self, op: Op, data: &[Value], operand: Option<&Value>)
        -> Result<Vec<Value>, PipeError>;
}

struct Slot {
    accel: Box<dyn Accelerator>,
    /// Probe result, computed once at registration
    available: bool,
    /// Minimum element count at which Auto dispatch prefers this backend
    threshold: usize,
}

/// Registry of accelerators plus the mutable dispatch configuration.
///
/// An explicit context object rather than ambient global state: tests get
/// deterministic, isolated configuration, and `Registry::default()` gives
/// the stock setup (chunked + bitblast) for ergonomics.
pub struct Registry {
    slots: Vec<Slot>,
    active: HashMap<OpFamily, String>,
    forced: Option<String>,
}

impl Registry {
    /// An empty registry: every operation resolves to the reference
    /// implementation.
    pub fn empty() -> Self {
        Registry {
            slots: Vec::new(),
            active: HashMap::new(),
            forced: None,
        }
    }

    /// The stock registry: `chunked` numeric aggregates (threshold 500) and
    /// `bitblast` elementwise bitwise ops (threshold 1000).
    pub fn new() -> Self {
        let mut reg = Registry::empty();
        reg.register(Box::new(Chunked), 500);
        reg.register(Box::new(Bitblast), 1000);
        reg
    }

    /// Register an accelerator. Probes exactly once and caches the result.
    /// An available accelerator becomes active for every family it supports
    /// (last registration wins, same as `enable`).
    pub fn register(&mut self, accel: Box<dyn Accelerator>, threshold: usize) {
        let available = accel.probe();
        let name = accel.name().to_string();
        tracing::debug!(backend = %name, available, threshold, "registered accelerator");
        self.slots.push(Slot {
            accel,
            available,
            threshold,
        });
        if available {
            self.activate(&name);
        }
    }

    /// Set the Auto-dispatch threshold for a backend. Returns false for
    /// unknown names.
    pub fn set_threshold(&mut self, name: &str, threshold: usize) -> bool {
        match self.slot_mut(name) {
            Some(slot) => {
                slot.threshold = threshold;
                true
            }
            None => false,
        }
    }

    pub fn threshold(&self, name: &str) -> Option<usize> {
        self.slot(name).map(|s| s.threshold)
    }

    /// Make a backend the active one for every family it supports.
    /// Last explicit enable wins. Returns false for unknown names.
    pub fn enable(&mut self, name: &str) -> bool {
        if self.slot(name).is_none() {
            return false;
        }
        self.activate(name);
        true
    }

    /// Deactivate a backend wherever it is active. Auto dispatch for those
    /// families falls back to the reference implementation.
    pub fn disable(&mut self, name: &str) -> bool {
        if self.slot(name).is_none() {
            return false;
        }
        self.active.retain(|_, active| active != name);
        if self.forced.as_deref() == Some(name) {
            self.forced = None;
        }
        true
    }

    /// Force every eligible operation onto this backend until
    /// [`clear_force`](Registry::clear_force). Equivalent to a ForceBackend
    /// hint on every stage: unsupported ops error instead of falling back.
    pub fn force(&mut self, name: &str) -> bool {
        if self.slot(name).is_none() {
            return false;
        }
        self.forced = Some(name.to_string());
        true
    }

    pub fn clear_force(&mut self) {
        self.forced = None;
    }

    /// Cached probe result; false for unknown names.
    pub fn is_available(&self, name: &str) -> bool {
        self.slot(name).is_some_and(|s| s.available)
    }

    pub(crate) fn forced(&self) -> Option<&str> {
        self.forced.as_deref()
    }

    /// The active, available accelerator for an op, with its threshold.
    pub(crate) fn active_for(&self, op: Op) -> Option<(&dyn Accelerator, usize)> {
        let name = self.active.get(&op.family())?;
        let slot = self.slot(name)?;
        if slot.available && slot.accel.supports(op) {
            Some((slot.accel.as_ref(), slot.threshold))
        } else {
            None
        }
    }

    /// Look up a backend by name if it is available and supports the op.
    pub(crate) fn lookup(&self, name: &str, op: Op) -> Option<&dyn Accelerator> {
        let slot = self.slot(name)?;
        if slot.available && slot.accel.supports(op) {
            Some(slot.accel.as_ref())
        } else {
            None
        }
    }

    fn activate(&mut self, name: &str) {
        let supported: Vec<OpFamily> = self
            .slot(name)
            .map(|slot| {
                [OpFamily::Numeric, OpFamily::Bitwise]
                    .into_iter()
                    .filter(|family| ALL_OPS.iter().any(|&op| {
                        op.family() == *family && slot.accel.supports(op)
                    }))
                    .collect()
            })
            .unwrap_or_default();
        for family in supported {
            self.active.insert(family, name.to_string());
        }
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.accel.name() == name)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.accel.name() == name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

const ALL_OPS: [Op; 12] = [
    Op::Sum,
    Op::Mean,
    Op::Min,
    Op::Max,
    Op::Median,
    Op::Stdev,
    Op::BitwiseAnd,
    Op::BitwiseOr,
    Op::BitwiseXor,
    Op::BitwiseNot,
    Op::LeftShift,
    Op::RightShift,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_registry() {
        let reg = Registry::new();
        assert!(reg.is_available("chunked"));
        assert!(reg.is_available("bitblast"));
        assert!(!reg.is_available("nonesuch"));
        assert_eq!(reg.threshold("chunked"), Some(500));
        assert_eq!(reg.threshold("bitblast"), Some(1000));
        assert!(reg.active_for(Op::Sum).is_some());
        assert!(reg.active_for(Op::BitwiseAnd).is_some());
    }

    #[test]
    fn test_config_surface_is_idempotent_and_tolerant() {
        let mut reg = Registry::new();
        assert!(reg.set_threshold("chunked", 10));
        assert!(reg.set_threshold("chunked", 10));
        assert_eq!(reg.threshold("chunked"), Some(10));

        // Unknown names report false, never panic
        assert!(!reg.set_threshold("nonesuch", 1));
        assert!(!reg.enable("nonesuch"));
        assert!(!reg.disable("nonesuch"));
        assert!(!reg.force("nonesuch"));
    }

    #[test]
    fn test_disable_falls_back_to_reference() {
        let mut reg = Registry::new();
        assert!(reg.disable("chunked"));
        assert!(reg.active_for(Op::Sum).is_none());
        // Bitwise family untouched
        assert!(reg.active_for(Op::BitwiseAnd).is_some());
        assert!(reg.enable("chunked"));
        assert!(reg.active_for(Op::Sum).is_some());
    }

    #[test]
    fn test_disable_clears_force() {
        let mut reg = Registry::new();
        assert!(reg.force("chunked"));
        assert_eq!(reg.forced(), Some("chunked"));
        reg.disable("chunked");
        assert_eq!(reg.forced(), None);
    }

    /// An accelerator whose probe fails: must be recorded unavailable and
    /// never become active.
    struct Broken;

    impl Accelerator for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn probe(&self) -> bool {
            false
        }
        fn supports(&self, _op: Op) -> bool {
            true
        }
        fn fold(&self, _op: Op, _data: &[Value]) -> Result<Value, PipeError> {
            unreachable!("unavailable backend must never be invoked")
        }
        fn map(
            &self,
            _op: Op,
            _data: &[Value],
            _operand: Option<&Value>,
        ) -> Result<Vec<Value>, PipeError> {
            unreachable!("unavailable backend must never be invoked")
        }
    }

    #[test]
    fn test_failed_probe_is_recorded_not_raised() {
        let mut reg = Registry::empty();
        reg.register(Box::new(Broken), 1);
        assert!(!reg.is_available("broken"));
        assert!(reg.active_for(Op::Sum).is_none());
        // enable of an unavailable backend activates it, but active_for
        // still refuses to hand it out
        assert!(reg.enable("broken"));
        assert!(reg.active_for(Op::Sum).is_none());
    }

    /// Second numeric backend for activation ordering tests
    struct Turbo;

    impl Accelerator for Turbo {
        fn name(&self) -> &'static str {
            "turbo"
        }
        fn probe(&self) -> bool {
            true
        }
        fn supports(&self, op: Op) -> bool {
            op == Op::Sum
        }
        fn fold(&self, op: Op, data: &[Value]) -> Result<Value, PipeError> {
            super::super::reference::fold(op, data)
        }
        fn map(
            &self,
            op: Op,
            data: &[Value],
            operand: Option<&Value>,
        ) -> Result<Vec<Value>, PipeError> {
            super::super::reference::map(op, data, operand)
        }
    }

    #[test]
    fn test_last_enable_wins() {
        let mut reg = Registry::new();
        reg.register(Box::new(Turbo), 50);
        // Registration auto-activates: turbo now owns the numeric family
        let (accel, threshold) = reg.active_for(Op::Sum).unwrap();
        assert_eq!(accel.name(), "turbo");
        assert_eq!(threshold, 50);
        // turbo only supports sum; the family activation never hands it
        // out for mean
        assert!(reg.active_for(Op::Mean).is_none());

        // Explicit enable flips the family back
        assert!(reg.enable("chunked"));
        let (accel, _) = reg.active_for(Op::Sum).unwrap();
        assert_eq!(accel.name(), "chunked");
    }
}
