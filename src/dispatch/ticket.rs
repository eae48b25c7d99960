//! Result handle returned by [`Dispatcher::submit`](super::Dispatcher::submit).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::model::WorkId;

/// Resolves with the work item's output once it has run.
///
/// Dropping a ticket does not cancel the work: once submitted, the item is
/// dispatched and runs to completion, and its slot is released as usual.
#[derive(Debug)]
#[must_use = "dropping a ticket discards the work's output (the work still runs)"]
pub struct Ticket<T> {
    id: WorkId,
    rx: oneshot::Receiver<T>,
}

impl<T> Ticket<T> {
    pub(crate) fn new(id: WorkId, rx: oneshot::Receiver<T>) -> Self {
        Self { id, rx }
    }

    /// Submission-order id of the work behind this ticket.
    pub fn id(&self) -> WorkId {
        self.id
    }
}

impl<T> Future for Ticket<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        // The sender only disappears without a value if the work panicked
        // or the runtime dropped it.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map_err(|_| Error::Aborted { id })
    }
}
