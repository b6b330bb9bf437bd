//! # Execution Unit Wire Protocol
//!
//! Point-to-point messages exchanged between a worker agent and the one
//! execution unit it owns.
//!
//! Inbound to the unit:
//!
//! ```json
//! { "id": "1f0c9a3e", "data": { "name": "add", "args": { "one": 1, "two": 2 } } }
//! ```
//!
//! Outbound from the unit, where `type` is `0` (function not found), `1`
//! (success, `data` is the return value) or `2` (application error, `data`
//! is the message):
//!
//! ```json
//! { "id": "1f0c9a3e", "type": 1, "data": 3 }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::JobError;
use crate::types::{JobId, JobResult};

/// A named-function invocation: what a job asks a unit to run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Name of the function to run.
    pub name: String,
    /// Arguments handed to the function.
    #[serde(default)]
    pub args: Value,
}

impl JobPayload {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Request sent from an agent to its execution unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitRequest {
    pub id: JobId,
    pub data: JobPayload,
}

/// Outcome code of a unit reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ReplyKind {
    NotFound = 0,
    Success = 1,
    Failure = 2,
}

impl TryFrom<u8> for ReplyKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReplyKind::NotFound),
            1 => Ok(ReplyKind::Success),
            2 => Ok(ReplyKind::Failure),
            other => Err(format!("unknown reply type {}", other)),
        }
    }
}

impl From<ReplyKind> for u8 {
    fn from(kind: ReplyKind) -> Self {
        kind as u8
    }
}

/// Reply sent from an execution unit back to its agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitReply {
    pub id: JobId,
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    #[serde(default)]
    pub data: Value,
}

impl UnitReply {
    pub fn success(id: JobId, data: Value) -> Self {
        Self {
            id,
            kind: ReplyKind::Success,
            data,
        }
    }

    pub fn not_found(id: JobId) -> Self {
        Self {
            id,
            kind: ReplyKind::NotFound,
            data: Value::Null,
        }
    }

    pub fn failure(id: JobId, message: impl Into<String>) -> Self {
        Self {
            id,
            kind: ReplyKind::Failure,
            data: Value::String(message.into()),
        }
    }

    /// Converts the reply into the caller-facing result.
    ///
    /// `function` names the requested function for the not-found error.
    pub fn into_result(self, function: &str) -> JobResult<Value> {
        match self.kind {
            ReplyKind::Success => Ok(self.data),
            ReplyKind::NotFound => Err(JobError::FunctionNotFound(function.to_string())),
            ReplyKind::Failure => Err(JobError::Application(match self.data {
                Value::String(message) => message,
                other => other.to_string(),
            })),
        }
    }
}
