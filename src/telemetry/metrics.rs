//! Metric instrument factories for dispatchq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"dispatchq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("dispatchq")
}

/// Counter: work items submitted.
/// Labels: `pool`.
pub fn work_submitted() -> Counter<u64> {
    meter()
        .u64_counter("dispatchq.work.submitted")
        .with_description("Number of work items submitted")
        .build()
}

/// Counter: work items that acquired a slot.
/// Labels: `pool`.
pub fn work_started() -> Counter<u64> {
    meter()
        .u64_counter("dispatchq.work.started")
        .with_description("Number of work items dispatched")
        .build()
}

/// Counter: work items that released their slot.
/// Labels: `pool`, `outcome` ("completed" | "aborted").
pub fn work_settled() -> Counter<u64> {
    meter()
        .u64_counter("dispatchq.work.settled")
        .with_description("Number of work items settled")
        .build()
}

/// Histogram: time spent queued before dispatch.
/// Labels: `pool`.
pub fn queue_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("dispatchq.queue.wait_ms")
        .with_description("Time spent waiting for a free slot")
        .with_unit("ms")
        .build()
}

/// Histogram: time a work item held its slot.
/// Labels: `pool`, `outcome`.
pub fn run_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("dispatchq.work.duration_ms")
        .with_description("Work item run duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: backend requests issued by the analytics client.
/// Labels: `endpoint`, `result` ("ok" | "error").
pub fn backend_requests() -> Counter<u64> {
    meter()
        .u64_counter("dispatchq.backend.requests")
        .with_description("Number of backend requests issued")
        .build()
}
