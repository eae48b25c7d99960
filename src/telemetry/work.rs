//! Dispatch span helpers.
//!
//! Provides span creation and phase-transition recording for work items
//! flowing through a dispatcher.

use tracing::Span;

use crate::model::{Outcome, Phase, WorkId};

/// Start a span for one dispatched work item.
///
/// The `dispatch.outcome` field is declared empty and filled in by
/// [`record_outcome`] once the item settles.
pub fn start_dispatch_span(pool: &str, id: WorkId) -> Span {
    tracing::info_span!(
        "dispatch.work",
        "dispatch.pool" = pool,
        "dispatch.id" = id.0,
        "dispatch.outcome" = tracing::field::Empty,
    )
}

/// Record a phase transition event on the given span.
pub fn record_phase_transition(span: &Span, from: Phase, to: Phase) {
    debug_assert!(from.can_transition_to(to), "bad transition {from} -> {to}");
    span.in_scope(|| {
        tracing::debug!(from = %from, to = %to, "phase_transition");
    });
}

/// Record how the work item settled.
pub fn record_outcome(span: &Span, outcome: Outcome) {
    span.record("dispatch.outcome", outcome.as_str());
}
