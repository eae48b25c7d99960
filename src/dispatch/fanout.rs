//! Batch fan-out: submit one work item per key, collect in input order.

use std::future::Future;

use super::dispatcher::Dispatcher;
use crate::error::Result;

/// One key's settled output.
#[derive(Debug)]
pub struct Settled<K, T> {
    pub key: K,
    /// `Err` only if the work aborted; the work's own errors live inside `T`.
    pub result: Result<T>,
}

/// Submit `f(key)` for every key through `dispatcher` and wait for all.
///
/// Everything is submitted before anything is awaited, so the whole batch
/// shares the dispatcher's queue. Output order matches input order, not
/// completion order. One key's failure never affects the others.
pub async fn fan_out<K, T, F, Fut>(
    dispatcher: &Dispatcher,
    keys: impl IntoIterator<Item = K>,
    f: F,
) -> Vec<Settled<K, T>>
where
    F: Fn(&K) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let tickets: Vec<_> = keys
        .into_iter()
        .map(|key| {
            let work = f(&key);
            let ticket = dispatcher.submit(move || work);
            (key, ticket)
        })
        .collect();

    let mut settled = Vec::with_capacity(tickets.len());
    for (key, ticket) in tickets {
        settled.push(Settled {
            key,
            result: ticket.await,
        });
    }
    settled
}
