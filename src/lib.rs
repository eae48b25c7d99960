//! # dispatchq
//!
//! Bounded-concurrency dispatcher for fanning out per-symbol analytics
//! requests without overwhelming the backend.
//!
//! Provides the dispatcher itself (FIFO queue, fixed ceiling, panic-safe
//! slot accounting), batch fan-out, a dispatch event stream, named pools
//! loaded from TOML, a throttled HTTP client, and OpenTelemetry wiring.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod model;
pub mod telemetry;

pub use dispatch::{Dispatcher, Ticket};
pub use error::{Error, Result};
