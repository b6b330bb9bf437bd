//! # Flock Worker Pool API
//!
//! Interface layer shared by the `flock` scheduler and anything that plugs
//! into it: execution units, job functions and callers.
//!
//! ## Core Components
//!
//! - **Identifiers**: [`JobId`] and [`WorkerId`]
//! - **Unit wire protocol**: [`UnitRequest`] in, [`UnitReply`] out
//! - **Execution units**: the [`ExecutionUnit`] and [`UnitFactory`] traits
//! - **Job functions**: the [`JobFunction`] trait and the `#[job]` macro
//! - **Errors**: [`JobError`] as seen by callers
//!
//! ## Usage Example
//!
//! ```rust
//! use flock_api::job;
//!
//! #[derive(serde::Deserialize)]
//! struct Pair {
//!     one: i64,
//!     two: i64,
//! }
//!
//! #[job]
//! fn add(args: Pair) -> i64 {
//!     args.one + args.two
//! }
//!
//! // `AddJob` implements `JobFunction` under the name "add".
//! let _ = AddJob;
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: identifiers and type aliases
//! - [`protocol`]: execution unit wire messages
//! - [`unit`]: execution unit traits
//! - [`function`]: job function trait and helpers
//! - [`errors`]: error types

pub mod errors;
pub mod function;
pub mod protocol;
pub mod types;
pub mod unit;

pub use errors::{ErrorKind, JobError, UnitError};
pub use function::{job_fn, FnJob, JobFunction};
pub use protocol::{JobPayload, ReplyKind, UnitReply, UnitRequest};
pub use types::{JobId, JobResult, WorkerId};
pub use unit::{ExecutionUnit, ReplyReceiver, ReplySender, UnitFactory};

// Re-export the attribute macro
pub use flock_api_derive::job;

// Used by code generated from `#[job]`.
#[doc(hidden)]
pub use async_trait::async_trait as __async_trait;
#[doc(hidden)]
pub use serde_json::Value as __Value;
