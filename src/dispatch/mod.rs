//! Bounded-concurrency dispatch: FIFO queue, slot accounting, fan-out.

pub mod dispatcher;
pub mod fanout;
pub mod ticket;

pub use dispatcher::{DispatchConfig, Dispatcher};
pub use fanout::{Settled, fan_out};
pub use ticket::Ticket;
