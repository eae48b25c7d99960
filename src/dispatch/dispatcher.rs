//! The dispatcher: runs at most N work items at once, queues the rest.
//!
//! Each dispatched item runs in its own spawned task, so it finishes
//! whether or not anyone still awaits its ticket. Queue and slot count are
//! the only shared state and are touched at two synchronous points: on
//! submit and on settle. The lock is never held across an `.await`.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, warn};

use super::ticket::Ticket;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::{DispatchStats, Outcome, Phase, WorkId};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_outcome, record_phase_transition, start_dispatch_span};

type BoxedWork = Pin<Box<dyn Future<Output = ()> + Send>>;
type Launch = Box<dyn FnOnce(SlotGuard) -> BoxedWork + Send>;

/// Configuration for a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Name reported in logs, spans and metrics.
    pub pool: String,
    /// Concurrency ceiling. Must be at least 1.
    pub max_concurrency: usize,
    /// Events buffered per subscriber before old ones are dropped.
    pub event_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool: "default".to_string(),
            max_concurrency: 4,
            event_capacity: 256,
        }
    }
}

/// Bounded-concurrency dispatcher. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    pool: String,
    max_concurrency: usize,
    runtime: Handle,
    slots: Mutex<Slots>,
    events: broadcast::Sender<Event>,
}

struct Slots {
    active: usize,
    queue: VecDeque<Job>,
    next_id: u64,
    next_seq: u64,
    submitted: u64,
    settled: u64,
}

struct Job {
    id: WorkId,
    queued_at: Instant,
    launch: Launch,
}

impl Dispatcher {
    /// Create a dispatcher with the given ceiling and default settings.
    ///
    /// # Errors
    ///
    /// Fails if `max_concurrency` is 0 or if called outside a Tokio runtime.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        Self::with_config(DispatchConfig {
            max_concurrency,
            ..DispatchConfig::default()
        })
    }

    /// Create a dispatcher from a full configuration.
    pub fn with_config(config: DispatchConfig) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(Error::InvalidConcurrency(config.max_concurrency));
        }
        let runtime = Handle::try_current()?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            inner: Arc::new(Inner {
                pool: config.pool,
                max_concurrency: config.max_concurrency,
                runtime,
                slots: Mutex::new(Slots {
                    active: 0,
                    queue: VecDeque::new(),
                    next_id: 0,
                    next_seq: 0,
                    submitted: 0,
                    settled: 0,
                }),
                events,
            }),
        })
    }

    /// Submit work for throttled execution.
    ///
    /// Never blocks. If a slot is free the work is dispatched right away,
    /// otherwise it waits behind everything submitted before it. The
    /// returned ticket resolves with the work's output exactly as produced;
    /// a work item returning `Err(e)` hands `Err(e)` back to this caller and
    /// nobody else. The slot is released before the output is delivered, so
    /// `stats()` read after the ticket resolves already counts it as settled.
    pub fn submit<F, Fut>(&self, work: F) -> Ticket<Fut::Output>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let launch: Launch = Box::new(move |guard: SlotGuard| -> BoxedWork {
            Box::pin(async move {
                let output = work().await;
                guard.complete();
                // The submitter may have dropped its ticket; that's fine.
                let _ = tx.send(output);
            })
        });

        let id = {
            let mut slots = self.inner.slots.lock();
            slots.next_id += 1;
            slots.submitted += 1;
            let id = WorkId(slots.next_id);
            slots.queue.push_back(Job {
                id,
                queued_at: Instant::now(),
                launch,
            });
            let depth = slots.queue.len();
            self.inner
                .emit(&mut slots, EventKind::WorkQueued { id, depth });
            id
        };

        debug!(pool = %self.inner.pool, id = %id, "work queued");
        metrics::work_submitted().add(1, &[KeyValue::new("pool", self.inner.pool.clone())]);

        self.inner.pump();
        Ticket::new(id, rx)
    }

    /// The fixed concurrency ceiling.
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Pool name this dispatcher reports under.
    pub fn pool(&self) -> &str {
        &self.inner.pool
    }

    /// Snapshot of the current bookkeeping.
    pub fn stats(&self) -> DispatchStats {
        let slots = self.inner.slots.lock();
        DispatchStats {
            max_concurrency: self.inner.max_concurrency,
            active: slots.active,
            queued: slots.queue.len(),
            submitted: slots.submitted,
            settled: slots.settled,
        }
    }

    /// Subscribe to queue/start/settle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.inner.pool)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Inner {
    /// Move queued jobs into free slots, in submission order.
    fn pump(self: &Arc<Self>) {
        let ready: Vec<(Job, u64)> = {
            let mut slots = self.slots.lock();
            let mut ready = Vec::new();
            while slots.active < self.max_concurrency {
                let Some(job) = slots.queue.pop_front() else {
                    break;
                };
                slots.active += 1;
                let active = slots.active;
                let waited_ms = job.queued_at.elapsed().as_millis() as u64;
                self.emit(
                    &mut slots,
                    EventKind::WorkStarted {
                        id: job.id,
                        active,
                        waited_ms,
                    },
                );
                ready.push((job, waited_ms));
            }
            ready
        };

        // Spawning happens outside the lock: a runtime that is shutting down
        // drops the future immediately, which settles it re-entrantly.
        for (job, waited_ms) in ready {
            self.launch(job, waited_ms);
        }
    }

    fn launch(self: &Arc<Self>, job: Job, waited_ms: u64) {
        let pool = KeyValue::new("pool", self.pool.clone());
        metrics::work_started().add(1, std::slice::from_ref(&pool));
        metrics::queue_wait_ms().record(waited_ms as f64, &[pool]);

        let span = start_dispatch_span(&self.pool, job.id);
        record_phase_transition(&span, Phase::Queued, Phase::Running);
        debug!(pool = %self.pool, id = %job.id, waited_ms, "work started");

        let guard = SlotGuard {
            inner: Arc::clone(self),
            id: job.id,
            started: Instant::now(),
            outcome: Outcome::Aborted,
            span: span.clone(),
        };

        // The guard lives inside the task; if the task is dropped unfinished
        // the slot is still released, as `Aborted`.
        self.runtime.spawn((job.launch)(guard).instrument(span));
    }

    /// Release a slot and let the next queued item in.
    fn settle(self: &Arc<Self>, id: WorkId, outcome: Outcome, duration_ms: u64) {
        {
            let mut slots = self.slots.lock();
            slots.active -= 1;
            slots.settled += 1;
            self.emit(
                &mut slots,
                EventKind::WorkSettled {
                    id,
                    outcome,
                    duration_ms,
                },
            );
        }

        let labels = [
            KeyValue::new("pool", self.pool.clone()),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        metrics::work_settled().add(1, &labels);
        metrics::run_duration_ms().record(duration_ms as f64, &labels);

        match outcome {
            Outcome::Completed => debug!(pool = %self.pool, id = %id, duration_ms, "work settled"),
            Outcome::Aborted => warn!(pool = %self.pool, id = %id, duration_ms, "work aborted"),
        }

        self.pump();
    }

    /// Caller must hold the slots lock so `seq` follows transition order.
    fn emit(&self, slots: &mut Slots, kind: EventKind) {
        slots.next_seq += 1;
        // No subscribers is not an error.
        let _ = self.events.send(Event {
            seq: slots.next_seq,
            timestamp: Utc::now(),
            kind,
        });
    }
}

/// Holds a slot for one running item; dropping it releases the slot.
///
/// Dropped on normal completion, on panic, and when the runtime discards the
/// task, so the active count can never leak.
struct SlotGuard {
    inner: Arc<Inner>,
    id: WorkId,
    started: Instant,
    outcome: Outcome,
    span: Span,
}

impl SlotGuard {
    /// Mark the work finished and release the slot now.
    fn complete(mut self) {
        self.outcome = Outcome::Completed;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        record_phase_transition(&self.span, Phase::Running, Phase::Settled);
        record_outcome(&self.span, self.outcome);
        let duration_ms = self.started.elapsed().as_millis() as u64;
        self.inner.settle(self.id, self.outcome, duration_ms);
    }
}
