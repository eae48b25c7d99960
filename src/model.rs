//! Core data model.
//!
//! A work item is an opaque asynchronous operation. The dispatcher only
//! tracks where it is in its lifecycle, never what it does.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Submission-order identifier, monotonic per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkId(pub u64);

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle phase of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Submitted, waiting for a free slot.
    Queued,
    /// Occupying a slot.
    Running,
    /// Produced its output (or aborted). Terminal.
    Settled,
}

impl Phase {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Phase) -> bool {
        use Phase::*;
        matches!((self, to), (Queued, Running) | (Running, Settled))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Queued => "queued",
            Phase::Running => "running",
            Phase::Settled => "settled",
        };
        f.write_str(s)
    }
}

/// How a dispatched work item settled.
///
/// A work item that returns `Err` still counts as `Completed`: it produced
/// a value, and that value is handed to the submitter untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// Panicked or torn down before producing a value.
    Aborted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Aborted => "aborted",
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of a dispatcher's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub max_concurrency: usize,
    pub active: usize,
    pub queued: usize,
    /// Total items ever submitted.
    pub submitted: u64,
    /// Total items that reached `Phase::Settled`.
    pub settled: u64,
}

impl DispatchStats {
    /// Slots that could accept work right now.
    pub fn idle_slots(&self) -> usize {
        self.max_concurrency.saturating_sub(self.active)
    }
}
