//! # Reference Execution Unit
//!
//! A thread-backed [`ExecutionUnit`](flock_api::unit::ExecutionUnit) and
//! the registry of job functions it runs. The pool depends only on the
//! unit traits; anything implementing them can stand in for these.

mod registry;
mod thread;

pub use registry::FunctionRegistry;
pub use thread::{ThreadUnit, ThreadUnitFactory};
