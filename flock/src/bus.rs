//! # Control Bus
//!
//! In-process publish/subscribe channel that carries the two lifecycle
//! signals exchanged between workers and their pool:
//!
//! - **migrate** (`event: 1`): "take these queued jobs, I can no longer serve
//!   them in time"
//! - **replace** (`event: 2`): "I have terminated, keep the pool at size and
//!   forget about me"
//!
//! Delivery is fire-and-forget fan-out. There is no acknowledgement, and a
//! subscriber ignores signals it has no action for. Each subscriber reads
//! from its own unbounded queue, so a slow subscriber delays signals but never
//! loses them: a migrate signal owns the result sinks of the jobs it carries.
//! A bus is created by the pool and handed to every worker it starts; no
//! global channel exists.
//!
//! ## Wire Form
//!
//! ```json
//! { "event": 1, "workerId": "9b1d3f0a", "data": [{ "name": "add", "args": [1, 2] }] }
//! { "event": 2, "workerId": "9b1d3f0a" }
//! ```
//!
//! In-process signals carry each migrated job's result sink alongside its
//! payload; the wire form carries payloads only.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use flock_api::protocol::JobPayload;
use flock_api::types::WorkerId;

use crate::error::BusError;
use crate::job::{JobRequest, ResultSink};

/// Topic the pool's control traffic is published on.
pub const CONTROL_TOPIC: &str = "workerpool";

pub const MIGRATE_EVENT: u8 = 1;
pub const REPLACE_EVENT: u8 = 2;

/// A lifecycle signal emitted by a worker.
#[derive(Clone, Debug)]
pub enum ControlSignal {
    /// Jobs the worker hands back for placement elsewhere.
    Migrate {
        worker_id: WorkerId,
        jobs: Vec<JobRequest>,
    },
    /// The worker has terminated and wants a successor.
    Replace { worker_id: WorkerId },
}

impl ControlSignal {
    pub fn worker_id(&self) -> &WorkerId {
        match self {
            ControlSignal::Migrate { worker_id, .. } | ControlSignal::Replace { worker_id } => {
                worker_id
            }
        }
    }

    pub fn event(&self) -> u8 {
        match self {
            ControlSignal::Migrate { .. } => MIGRATE_EVENT,
            ControlSignal::Replace { .. } => REPLACE_EVENT,
        }
    }

    pub fn to_frame(&self) -> ControlFrame {
        match self {
            ControlSignal::Migrate { worker_id, jobs } => ControlFrame {
                event: MIGRATE_EVENT,
                worker_id: worker_id.clone(),
                data: Some(jobs.iter().map(|job| job.payload.clone()).collect()),
            },
            ControlSignal::Replace { worker_id } => ControlFrame {
                event: REPLACE_EVENT,
                worker_id: worker_id.clone(),
                data: None,
            },
        }
    }

    /// Decodes a wire frame. Migrated payloads get sinks nobody waits on.
    pub fn from_frame(frame: ControlFrame) -> Result<Self, BusError> {
        match frame.event {
            MIGRATE_EVENT => Ok(ControlSignal::Migrate {
                worker_id: frame.worker_id,
                jobs: frame
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|payload| JobRequest {
                        payload,
                        sink: ResultSink::detached(),
                    })
                    .collect(),
            }),
            REPLACE_EVENT => Ok(ControlSignal::Replace {
                worker_id: frame.worker_id,
            }),
            event => Err(BusError::UnknownEvent {
                event,
                worker_id: frame.worker_id.to_string(),
            }),
        }
    }
}

/// Wire representation of a control signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub event: u8,
    #[serde(rename = "workerId")]
    pub worker_id: WorkerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<JobPayload>>,
}

impl ControlFrame {
    pub fn from_json(value: serde_json::Value) -> Result<Self, BusError> {
        serde_json::from_value(value).map_err(|e| BusError::Malformed(e.to_string()))
    }
}

/// Fan-out channel for [`ControlSignal`]s.
#[derive(Clone)]
pub struct ControlBus {
    topic: Arc<str>,
    subscribers: Arc<Mutex<Vec<flume::Sender<ControlSignal>>>>,
}

impl fmt::Debug for ControlBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBus")
            .field("topic", &self.topic)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlBus {
    pub fn new() -> Self {
        Self::with_topic(CONTROL_TOPIC)
    }

    pub fn with_topic(topic: &str) -> Self {
        Self {
            topic: Arc::from(topic),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Delivers `signal` to every live subscriber; returns how many got it.
    pub fn publish(&self, signal: ControlSignal) -> usize {
        let event = signal.event();
        let worker_id = signal.worker_id().clone();

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| sender.send(signal.clone()).is_ok());
        let receivers = subscribers.len();
        drop(subscribers);

        if receivers == 0 {
            warn!(topic = %self.topic, event, worker = %worker_id, "Control signal published with no subscribers");
        } else {
            debug!(topic = %self.topic, event, worker = %worker_id, receivers, "Control signal published");
        }
        receivers
    }

    /// Publishes a wire frame. Frames with unknown events are logged and
    /// dropped.
    pub fn publish_frame(&self, frame: ControlFrame) -> usize {
        match ControlSignal::from_frame(frame) {
            Ok(signal) => self.publish(signal),
            Err(e) => {
                warn!(topic = %self.topic, "Ignoring control frame: {}", e);
                0
            }
        }
    }

    /// Opens a subscription that sees every signal published from now on.
    pub fn subscribe(&self) -> ControlSubscription {
        let (sender, receiver) = flume::unbounded();
        self.subscribers.lock().push(sender);
        ControlSubscription {
            topic: self.topic.clone(),
            receiver,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|sender| !sender.is_disconnected())
            .count()
    }
}

/// Receiving end of a [`ControlBus`].
pub struct ControlSubscription {
    topic: Arc<str>,
    receiver: flume::Receiver<ControlSignal>,
}

impl fmt::Debug for ControlSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSubscription")
            .field("topic", &self.topic)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

impl ControlSubscription {
    /// Waits for the next signal. `None` once every clone of the bus is gone.
    pub async fn recv(&mut self) -> Option<ControlSignal> {
        self.receiver.recv_async().await.ok()
    }

    /// Returns a signal if one is already waiting.
    pub fn try_recv(&mut self) -> Option<ControlSignal> {
        self.receiver.try_recv().ok()
    }

    /// Signals published but not yet received.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}
