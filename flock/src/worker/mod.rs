//! # Worker Agents
//!
//! One agent per execution unit. The agent queues jobs, feeds the unit one
//! job at a time and reports lifecycle decisions to the pool over the
//! control bus.
//!
//! ```text
//!            input()                 reply
//!   pool ──────────────> [ head | 2 | 3 | ... ] <──────── unit
//!                           │ dispatch
//!                           └─────────────────────────────> unit
//!
//!   head overruns switch_queue_time ──> migrate(2, 3, ...)
//!   empty for max_idle_time         ──> replace
//! ```

mod agent;

pub use agent::{AgentState, AgentStats, ExitOutcome, RejectReason, Rejection, WorkerAgent};
