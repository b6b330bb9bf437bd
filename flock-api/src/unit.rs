//! # Execution Units
//!
//! An execution unit is an isolated runner (a thread or a process) that runs
//! named functions on request and reports results asynchronously. The pool
//! never looks inside a unit: it posts [`UnitRequest`]s and reads
//! [`UnitReply`]s from the channel it handed to the factory.

use std::fmt::Debug;

use tokio::sync::mpsc;

use crate::errors::UnitError;
use crate::protocol::{UnitReply, UnitRequest};
use crate::types::WorkerId;

/// Channel on which a unit reports replies to its owning agent.
pub type ReplySender = mpsc::UnboundedSender<UnitReply>;

/// Receiving half of [`ReplySender`], held by the agent.
pub type ReplyReceiver = mpsc::UnboundedReceiver<UnitReply>;

/// A running execution unit.
pub trait ExecutionUnit: Send + Sync + Debug {
    /// Hands a request to the unit without waiting for it to run.
    fn post(&self, request: UnitRequest) -> Result<(), UnitError>;

    /// Stops the unit. Requests posted afterwards fail with
    /// [`UnitError::Closed`]; a job already running may still finish, but
    /// its reply is no longer expected.
    fn terminate(&self);

    /// Whether the unit still accepts requests.
    fn is_alive(&self) -> bool;
}

/// How the pool starts a new execution unit for a worker.
pub trait UnitFactory: Send + Sync + Debug {
    /// Starts a unit for `worker` that reports every reply on `replies`.
    fn spawn(
        &self,
        worker: &WorkerId,
        replies: ReplySender,
    ) -> Result<Box<dyn ExecutionUnit>, UnitError>;
}
