//! Dispatch layer: the two ways processing gets started.
//!
//! - [`QueueConsumer`] reads artifact ids from the durable queue and runs the
//!   full pipeline for each.
//! - [`StageDispatcher`] runs a single stage on request, guarded against
//!   duplicate and concurrent triggers, and tracks the spawned work in an
//!   [`InFlightRegistry`].

pub mod consumer;
pub mod context;
pub mod dispatch;
pub mod inflight;

pub use consumer::QueueConsumer;
pub use context::PipelineHandler;
pub use dispatch::{DispatchError, StageDispatcher, TriggerOutcome};
pub use inflight::{InFlightRegistry, ShutdownReport};
