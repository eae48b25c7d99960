//! Structured events emitted by the dispatcher on every transition.
//!
//! Consumers subscribe to build progress views or audit what ran when.
//! Events are the dispatcher's voice; the work itself logs through tracing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Outcome, WorkId};

/// A structured event emitted by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    WorkQueued {
        id: WorkId,
        /// Queue length after this item was appended.
        depth: usize,
    },
    WorkStarted {
        id: WorkId,
        /// Active count including this item.
        active: usize,
        waited_ms: u64,
    },
    WorkSettled {
        id: WorkId,
        outcome: Outcome,
        duration_ms: u64,
    },
}

impl EventKind {
    pub fn work_id(&self) -> WorkId {
        match self {
            EventKind::WorkQueued { id, .. }
            | EventKind::WorkStarted { id, .. }
            | EventKind::WorkSettled { id, .. } => *id,
        }
    }
}
