//! Backend registry, dispatch policy, and interchangeable op implementations
//!
//! Every backend-eligible operation has a reference implementation that is
//! always available, plus zero or more accelerator implementations behind a
//! common trait. The dispatcher picks one per execution from the current
//! registry state (thresholds, enable/disable, force flags); all choices are
//! value-equivalent by contract (exact for int/bitwise/ordering ops, within
//! 1e-6 for float aggregates), which the equivalence tests enforce.

pub mod bitblast;
pub mod chunked;
pub mod dispatch;
pub mod op;
pub mod reference;
pub mod registry;

pub use bitblast::Bitblast;
pub use chunked::Chunked;
pub use dispatch::{resolve, BackendHint, Resolution};
pub use op::{Op, OpFamily};
pub use registry::{Accelerator, Registry};
