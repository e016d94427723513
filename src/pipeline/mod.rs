//! Lazy pipeline engine
//!
//! A pipeline is built by appending stage descriptors; nothing executes
//! until a terminal call (`get`, `to_list`). Execution walks the stage list
//! once, keeping a single "current flow": streaming stages wrap the flow in
//! a pull-based lazy iterator, materializing stages (sort, group, window)
//! collect it first, and aggregates hand the materialized elements to the
//! backend dispatcher.
//!
//! ```text
//! pipe([1,2,3,4,5]).filter(arg().gt(2)).map(arg() * 10).to_list()
//!     ↓ build: [Stage(Filter), Stage(Map)]   (no execution)
//!     ↓ terminal: source → filter → map, pulled element by element
//! [30, 40, 50]
//! ```

pub mod engine;
pub mod exec;
pub mod source;
pub mod stage;

pub use engine::{pipe, Pipe};
pub use source::Source;
pub use stage::{Stage, StageKind, StageOp};
